//! Faultline Deterministic Simulation Harness
//!
//! This crate runs the Faultline engine inside a controlled environment where
//! every run is reproducible from one seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a paused tokio clock that jumps to the next timer once every
//!   task is blocked, so a ten-minute incident window runs in milliseconds
//! - **Randomness**: every generator derives from the master seed
//! - **Scheduling**: a single-threaded runtime polls tasks in a fixed order
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ tokio current_thread runtime (paused clock)          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼───────────────────┐        ┌───────────────────┐    │
//! │  │    FaultlineEngine     │───────►│   RecordingSink   │    │
//! │  │ clock + db + txn facade│ events │ (timeline, stats) │    │
//! │  └────────────────────────┘        └───────────────────┘    │
//! │       ▲                                                     │
//! │  ┌────┴─────────────────────────────┐                       │
//! │  │  Traffic (burst / spread / txns)  │                       │
//! │  └──────────────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use faultline_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_requests(500).run(ScenarioId::TimeoutStorm);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod recorder;
mod runner;
pub mod scenarios;
mod world;

pub use context::SimContext;
pub use exporter::{ExportError, SimExport};
pub use recorder::{EpisodeRecord, LabelStats, RecordingSink};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
