//! Engine runtime - wires the clock and the facades to one context.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     FaultlineEngine                       │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │            Context: FaultlineContext                │  │
//! │  │  • now() / sleep() → tick loop, simulated latency   │  │
//! │  │  • derive_rng() → incident draws, outcome draws     │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! │                            │                              │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │   INCIDENT   │──▶│   DATABASE   │◀──│ TRANSACTION  │   │
//! │  │    CLOCK     │   │   SERVICE    │   │   SERVICE    │   │
//! │  └──────────────┘   └──────────────┘   └──────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use faultline_core::engine::{EngineConfig, FaultlineEngine};
//! use faultline_env::TokioContext;
//!
//! let mut engine = FaultlineEngine::new(TokioContext::shared(), EngineConfig::default())?;
//! engine.start();
//! let response = engine.transactions().process(None).await;
//! engine.shutdown();
//! ```

use crate::clock::{ClockHandle, IncidentClock};
use crate::config::{ClockConfig, ConfigError, ServiceConfig, TransactionConfig};
use crate::service::DatabaseService;
use crate::state::IncidentSnapshot;
use crate::telemetry::{NoopSink, TelemetrySink};
use crate::transaction::TransactionService;
use faultline_env::FaultlineContext;
use std::sync::Arc;
use tracing::info;

/// Configuration for a whole engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub clock: ClockConfig,
    pub database: ServiceConfig,
    pub transaction: TransactionConfig,
}

/// Incident clock plus the services that read it.
pub struct FaultlineEngine<Ctx: FaultlineContext> {
    clock: Arc<IncidentClock<Ctx>>,
    database: Arc<DatabaseService<Ctx>>,
    transactions: Arc<TransactionService<Ctx>>,

    /// Present while the tick loop runs
    running: Option<ClockHandle<Ctx>>,
}

impl<Ctx: FaultlineContext> FaultlineEngine<Ctx> {
    /// Creates an engine that reports nowhere.
    pub fn new(context: Arc<Ctx>, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_sink(context, config, Arc::new(NoopSink))
    }

    /// Creates an engine whose clock and database report to `sink`.
    pub fn with_sink(
        context: Arc<Ctx>,
        config: EngineConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, ConfigError> {
        let clock = Arc::new(IncidentClock::new(context, config.clock)?.with_sink(Arc::clone(&sink)));
        let database = Arc::new(DatabaseService::new(&clock, config.database).with_sink(sink));
        let transactions = Arc::new(TransactionService::new(Arc::clone(&database), config.transaction));

        Ok(Self {
            clock,
            database,
            transactions,
            running: None,
        })
    }

    pub fn clock(&self) -> &Arc<IncidentClock<Ctx>> {
        &self.clock
    }

    pub fn database(&self) -> &Arc<DatabaseService<Ctx>> {
        &self.database
    }

    pub fn transactions(&self) -> &Arc<TransactionService<Ctx>> {
        &self.transactions
    }

    /// Current incident.
    pub fn snapshot(&self) -> IncidentSnapshot {
        self.clock.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts the tick loop. Idempotent.
    pub fn start(&mut self) {
        if self.running.is_none() {
            info!(
                seed = self.clock.context().seed(),
                tick_period_ms = self.clock.config().tick_period.as_millis() as u64,
                "🚀 engine started"
            );
            self.running = Some(Arc::clone(&self.clock).start());
        }
    }

    /// Stops the tick loop and resolves any active incident.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.shutdown();
            info!(
                episodes = self.clock.state().episodes_started(),
                "engine stopped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IncidentKind;
    use crate::simulator::{OperationRequest, GET_BALANCE};
    use crate::telemetry::{IncidentEvent, ResolveReason};
    use crate::testing::{EventLog, TestContext};
    use std::time::Duration;

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            clock: ClockConfig::default().with_start_probability(-0.1),
            ..EngineConfig::default()
        };
        assert!(FaultlineEngine::new(Arc::new(TestContext::new(1)), config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_lifecycle() {
        let log = Arc::new(EventLog::default());
        let config = EngineConfig {
            clock: ClockConfig::default().with_start_probability(1.0),
            ..EngineConfig::default()
        };
        let mut engine = FaultlineEngine::with_sink(Arc::new(TestContext::new(9)), config, log.clone()).unwrap();
        assert!(!engine.is_running());

        engine.start();
        engine.start();
        assert!(engine.is_running());
        // First tick lands one period after start
        tokio::time::sleep(Duration::from_secs(46)).await;
        assert!(engine.snapshot().is_active());

        engine.database().query(OperationRequest::new("user_1", GET_BALANCE)).await;
        assert_eq!(log.outcomes(), 1);

        engine.shutdown();
        assert!(!engine.is_running());
        assert!(!engine.snapshot().is_active());

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            IncidentEvent::Resolved { reason: ResolveReason::Shutdown, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_share_clock_state() {
        let engine = FaultlineEngine::new(Arc::new(TestContext::new(2)), EngineConfig::default()).unwrap();
        engine.clock().force(IncidentKind::Deadlock, None);

        assert_eq!(engine.database().snapshot().kind(), Some(IncidentKind::Deadlock));
        assert_eq!(engine.database().status().incident_type, "deadlock");
    }
}
