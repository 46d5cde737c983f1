//! Core environment context trait for Faultline components.

use crate::types::TaskHandle;
use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The central interface for environment interaction.
///
/// The incident clock, the request simulator and the service facades are
/// generic over this trait so the same code runs against the real clock in
/// production and against a paused, seeded environment in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, entropy-seeded RNGs
/// - **Simulation**: `SimContext` (in `faultline_sim`) - paused `tokio::time`,
///   RNG streams derived from a master seed
#[async_trait]
pub trait FaultlineContext: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for response timestamps.
    fn system_time(&self) -> SystemTime;

    /// Wall-clock seconds since the Unix epoch.
    fn unix_secs(&self) -> i64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Suspends execution for the given duration.
    ///
    /// This is a real suspension of the calling task. Under a paused tokio
    /// clock the runtime advances virtual time instead of waiting.
    async fn sleep(&self, duration: Duration);

    /// Spawns a named background task and returns a handle that can abort it.
    fn spawn<F>(&self, name: &str, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns a fresh random generator owned by the caller.
    ///
    /// Every call yields an independent stream, so concurrent callers never
    /// share mutable generator state.
    fn derive_rng(&self) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
