//! SimWorld - the simulation harness container.

use crate::context::SimContext;
use crate::recorder::RecordingSink;

use faultline_core::simulator::{BALANCE_CHECK, GET_BALANCE};
use faultline_core::{
    ClockConfig, ConfigError, EngineConfig, FanoutSink, FaultlineEngine, OperationRequest, QueryResponse,
    TelemetrySink, TracingSink, TransactionRequest, TransactionResponse,
};
use faultline_env::FaultlineContext;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Operation names cycled through by generated traffic.
const OPERATIONS: [&str; 3] = [GET_BALANCE, BALANCE_CHECK, "transfer"];

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Requests issued per scenario
    pub requests: usize,

    /// Virtual time over which clock-driven scenarios spread their traffic
    pub window: Duration,

    /// Incident clock parameters
    pub clock: ClockConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            requests: 1000,
            window: Duration::from_secs(600),
            clock: ClockConfig::default(),
        }
    }
}

/// The SimWorld - one engine on a seeded context, recording everything it reports.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Engine under test
    pub engine: FaultlineEngine<SimContext>,

    /// Everything the engine reported
    pub recorder: Arc<RecordingSink>,
}

impl SimWorld {
    /// Creates a new SimWorld. Must be called inside a paused runtime.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let context = SimContext::shared(config.seed);
        let recorder = Arc::new(RecordingSink::new());
        let engine_config = EngineConfig {
            clock: config.clock.clone(),
            ..EngineConfig::default()
        };
        let sinks: Vec<Arc<dyn TelemetrySink>> = vec![recorder.clone(), Arc::new(TracingSink)];
        let engine = FaultlineEngine::with_sink(Arc::clone(&context), engine_config, Arc::new(FanoutSink::new(sinks)))?;

        Ok(Self {
            config,
            context,
            engine,
            recorder,
        })
    }

    /// Builds the `index`-th generated request.
    fn request(&self, index: usize) -> OperationRequest {
        let mut rng = self.context.derive_rng();
        let operation = OPERATIONS[index % OPERATIONS.len()];
        let request = OperationRequest::new(format!("user_{}", rng.gen_range(0..1000)), operation);
        if operation == "transfer" {
            request.with_amount(rng.gen_range(1.0..500.0))
        } else {
            request
        }
    }

    /// Fires `count` queries at once and waits for all of them.
    pub async fn burst(&self, count: usize) -> Vec<QueryResponse> {
        let mut tasks = JoinSet::new();
        for index in 0..count {
            let database = Arc::clone(self.engine.database());
            let request = self.request(index);
            tasks.spawn(async move { database.query(request).await });
        }
        collect(tasks).await
    }

    /// Issues `count` queries evenly over `window` and waits for all of them.
    pub async fn spread(&self, count: usize, window: Duration) -> Vec<QueryResponse> {
        let gap = gap(window, count);
        let mut tasks = JoinSet::new();
        for index in 0..count {
            self.context.sleep(gap).await;
            let database = Arc::clone(self.engine.database());
            let request = self.request(index);
            tasks.spawn(async move { database.query(request).await });
        }
        collect(tasks).await
    }

    /// Issues `count` transactions evenly over `window`.
    ///
    /// Every fourth slot sends no request, every fourth sends a
    /// non-positive amount, the rest send valid transfers or balance checks.
    /// Returns each response with whether its request was valid.
    pub async fn transactions(&self, count: usize, window: Duration) -> Vec<(bool, TransactionResponse)> {
        let gap = gap(window, count);
        let mut responses = Vec::with_capacity(count);
        let mut tasks = JoinSet::new();

        for index in 0..count {
            self.context.sleep(gap).await;
            let mut rng = self.context.derive_rng();
            let user = format!("user_{}", rng.gen_range(0..1000));
            let (valid, request) = match index % 4 {
                0 => (true, None),
                1 => (true, Some(TransactionRequest::new(user, rng.gen_range(1.0..500.0), "transfer"))),
                2 => (false, Some(TransactionRequest::new(user, -rng.gen_range(0.0..500.0), "transfer"))),
                _ => (true, Some(TransactionRequest::new(user, rng.gen_range(1.0..500.0), BALANCE_CHECK))),
            };

            let transactions = Arc::clone(self.engine.transactions());
            tasks.spawn(async move { (valid, transactions.process(request).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => responses.push(pair),
                Err(e) => warn!("transaction task failed: {}", e),
            }
        }
        debug!(count = responses.len(), "transactions complete");
        responses
    }
}

fn gap(window: Duration, count: usize) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        window / u32::try_from(count).unwrap_or(u32::MAX)
    }
}

async fn collect<T: 'static>(mut tasks: JoinSet<T>) -> Vec<T> {
    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(value) => results.push(value),
            Err(e) => warn!("request task failed: {}", e),
        }
    }
    debug!(count = results.len(), "requests complete");
    results
}
