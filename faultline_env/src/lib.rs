//! Faultline Environment Abstraction Layer
//!
//! This crate provides the seam that lets the Faultline engine run in both
//! **Production** (tokio wall clock, OS entropy) and **Simulation** (paused
//! tokio clock, seeded generators) environments.
//!
//! # Core Concept
//!
//! The engine never touches the outside world directly. Everything that would
//! introduce non-determinism goes through [`FaultlineContext`]:
//! - Time (`now()`, `sleep()`)
//! - Background tasks (`spawn()`)
//! - Randomness (`derive_rng()`)
//!
//! In simulation all entropy derives from a single 64-bit seed, so a run that
//! surfaces a bug can be replayed from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use faultline_env::{FaultlineContext, TokioContext, with_deadline};
//!
//! async fn sample<Ctx: FaultlineContext>(ctx: &Ctx) {
//!     let value = with_deadline(ctx, Duration::from_secs(30), slow_call()).await;
//! }
//! ```

mod context;
mod deadline;
mod error;
mod tokio_impl;
mod types;

pub use context::FaultlineContext;
pub use deadline::with_deadline;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use types::TaskHandle;
