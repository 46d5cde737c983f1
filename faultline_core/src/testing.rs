//! Shared fixtures for unit tests.

use crate::telemetry::{IncidentEvent, OutcomeReport, TelemetrySink};
use async_trait::async_trait;
use faultline_env::{FaultlineContext, TaskHandle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Seeded context on the tokio clock; each `derive_rng` call gets its own stream.
pub(crate) struct TestContext {
    seed: u64,
    streams: AtomicU64,
    start: Instant,
}

impl TestContext {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: AtomicU64::new(0),
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl FaultlineContext for TestContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000) + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> TaskHandle
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        TaskHandle::new(name, tokio::spawn(future))
    }

    fn derive_rng(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(self.streams.fetch_add(1, Ordering::Relaxed));
        rng
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

/// Sink that keeps incident events and counts outcomes.
#[derive(Default)]
pub(crate) struct EventLog {
    events: Mutex<Vec<IncidentEvent>>,
    outcomes: AtomicU64,
}

impl EventLog {
    pub(crate) fn events(&self) -> Vec<IncidentEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn outcomes(&self) -> u64 {
        self.outcomes.load(Ordering::Relaxed)
    }
}

impl TelemetrySink for EventLog {
    fn on_incident(&self, event: &IncidentEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_outcome(&self, _report: &OutcomeReport<'_>) {
        self.outcomes.fetch_add(1, Ordering::Relaxed);
    }
}
