//! Scenario runner - executes fault scenarios on a paused runtime.

use crate::exporter::SimExport;
use crate::recorder::LabelStats;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use faultline_core::catalog::{BASELINE_PROFILE, NO_INCIDENT_LABEL};
use faultline_core::transaction::TransactionStatus;
use faultline_core::{IncidentKind, IncidentProfile, ResolveReason};
use faultline_env::FaultlineContext;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Simulated database calls
    pub requests: u64,

    /// Calls that ended in a simulated failure
    pub failures: u64,

    /// Mean simulated latency (ms)
    pub mean_latency_ms: f64,

    /// Maximum simulated latency (ms)
    pub max_latency_ms: f64,

    /// Incidents started
    pub episodes: u64,

    /// Failures whose message did not match their incident
    pub mismatched: u64,

    /// Transactions answered with a payload
    pub transactions_ok: u64,

    /// Transactions failed by the database
    pub transactions_failed: u64,

    /// Transactions rejected before the database
    pub transactions_rejected: u64,
}

/// Runs fault scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Requests per scenario
    requests: usize,

    /// Window for clock-driven scenarios
    window: Duration,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        let defaults = SimConfig::default();
        Self {
            seed,
            requests: defaults.requests,
            window: defaults.window,
        }
    }

    /// Sets the number of requests per scenario.
    pub fn with_requests(mut self, requests: usize) -> Self {
        self.requests = requests;
        self
    }

    /// Sets the virtual window for clock-driven scenarios.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario).0
    }

    /// Runs a scenario and also returns everything the recorder saw.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let result = self.failed(scenario, format!("could not build runtime: {}", e));
                let export = SimExport::new(&result);
                return (result, export);
            }
        };

        runtime.block_on(self.execute(scenario))
    }

    async fn execute(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let config = SimConfig {
            seed: self.seed,
            requests: self.requests,
            window: self.window,
            ..SimConfig::default()
        };

        let mut world = match SimWorld::new(config) {
            Ok(world) => world,
            Err(e) => {
                let result = self.failed(scenario, e.to_string());
                let export = SimExport::new(&result);
                return (result, export);
            }
        };

        let mut metrics = ScenarioMetrics::default();
        if scenario.uses_clock() {
            world.engine.start();
        }
        let verdict = match scenario {
            ScenarioId::Baseline => self.run_baseline(&world).await,
            ScenarioId::TimeoutStorm
            | ScenarioId::RefusedFlood
            | ScenarioId::DeadlockContention
            | ScenarioId::DiskPressure
            | ScenarioId::LatencySpike => match scenario.forced_incident() {
                Some(kind) => self.run_forced(&world, kind).await,
                None => Err(format!("{} forces no incident", scenario)),
            },
            ScenarioId::IncidentCycle => self.run_incident_cycle(&mut world).await,
            ScenarioId::TransactionMix => self.run_transaction_mix(&mut world, &mut metrics).await,
        };
        world.engine.shutdown();

        let labels = world.recorder.by_label();
        metrics.requests = world.recorder.total_requests();
        metrics.failures = world.recorder.total_failures();
        metrics.episodes = world.recorder.episodes().len() as u64;
        metrics.mismatched = world.recorder.mismatched();
        metrics.max_latency_ms = labels.values().map(|s| s.max_latency_ms).fold(0.0, f64::max);
        if metrics.requests > 0 {
            let total: f64 = labels.values().map(|s| s.total_latency_ms).sum();
            metrics.mean_latency_ms = total / metrics.requests as f64;
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: verdict.is_ok(),
            final_time_secs: world.context.now().as_secs_f64(),
            failure_reason: verdict.err(),
            metrics,
        };

        match &result.failure_reason {
            None => info!(
                "✓ {} complete: {} requests, {} failures, {} episodes",
                scenario, result.metrics.requests, result.metrics.failures, result.metrics.episodes
            ),
            Some(reason) => warn!("✗ {} failed: {}", scenario, reason),
        }

        let export = SimExport::new(&result).with_recording(&world.recorder);
        (result, export)
    }

    /// FL-001: Baseline - no incidents.
    ///
    /// **Assertion**: failure rate near 2%, latency within the baseline profile.
    async fn run_baseline(&self, world: &SimWorld) -> Result<(), String> {
        info!("FL-001: Baseline - clock disabled");

        world.burst(self.requests).await;
        let stats = world.recorder.label(NO_INCIDENT_LABEL);
        check_profile("baseline", &stats, &BASELINE_PROFILE)?;
        check_no_mismatch(world)
    }

    /// FL-002..FL-006: one incident held for the whole burst.
    ///
    /// **Assertion**: failure rate near the profile's error rate, latency within
    /// the profile, and every failure carries the incident's own message.
    async fn run_forced(&self, world: &SimWorld, kind: IncidentKind) -> Result<(), String> {
        info!("Holding incident {} for {} concurrent requests", kind, self.requests);

        world.engine.clock().force(kind, None);
        world.burst(self.requests).await;
        world.engine.clock().resolve();

        let stats = world.recorder.label(kind.name());
        if stats.requests != self.requests as u64 {
            return Err(format!(
                "{} of {} requests ran under {}",
                stats.requests, self.requests, kind
            ));
        }
        check_profile(kind.name(), &stats, &kind.profile())?;
        check_no_mismatch(world)
    }

    /// FL-007: IncidentCycle - free-running clock.
    ///
    /// **Assertion**: episodes never overlap, every expired episode lasted its
    /// drawn duration inside the configured range, outcomes match their incident.
    async fn run_incident_cycle(&self, world: &mut SimWorld) -> Result<(), String> {
        info!("FL-007: IncidentCycle - {}s window", self.window.as_secs());

        world.spread(self.requests, self.window).await;
        world.engine.shutdown();

        if world.engine.snapshot().is_active() {
            return Err("incident still active after shutdown".to_string());
        }
        if world.recorder.overlaps() > 0 {
            return Err(format!("{} overlapping incidents", world.recorder.overlaps()));
        }

        let clock = world.engine.clock().config().clone();
        for episode in world.recorder.episodes() {
            debug!(
                "  episode {} {} at {:.1}s ({:?})",
                episode.episode, episode.kind, episode.started_at_secs, episode.reason
            );
            let Some(duration) = episode.duration() else {
                return Err(format!("episode {} never resolved", episode.episode));
            };
            if episode.reason != Some(ResolveReason::Expired) {
                continue;
            }
            // Virtual time is exact; allow float noise from the seconds round-trip
            let millis = (duration.as_secs_f64() * 1000.0).round() as u128;
            if millis < clock.min_duration.as_millis() || millis >= clock.max_duration.as_millis() {
                return Err(format!(
                    "episode {} lasted {}ms, outside [{:?}, {:?})",
                    episode.episode, millis, clock.min_duration, clock.max_duration
                ));
            }
        }
        check_no_mismatch(world)
    }

    /// FL-008: TransactionMix - transactions over a free-running clock.
    ///
    /// **Assertion**: invalid amounts are rejected without touching the
    /// database, database failures surface as failed transactions.
    async fn run_transaction_mix(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), String> {
        info!("FL-008: TransactionMix - {} transactions", self.requests);

        let responses = world.transactions(self.requests, self.window).await;
        world.engine.shutdown();

        let mut valid = 0u64;
        for (was_valid, response) in &responses {
            if !response.transaction_id.starts_with("txn_") {
                return Err(format!("malformed transaction id {}", response.transaction_id));
            }
            match (was_valid, response.status) {
                (false, TransactionStatus::Error) => metrics.transactions_rejected += 1,
                (false, status) => return Err(format!("invalid amount answered {:?}", status)),
                (true, TransactionStatus::Error) => {
                    return Err(format!("valid transaction rejected: {:?}", response.error))
                }
                (true, TransactionStatus::Success) => {
                    valid += 1;
                    metrics.transactions_ok += 1;
                    if response.data.is_none() {
                        return Err("successful transaction without payload".to_string());
                    }
                }
                (true, TransactionStatus::Failed) => {
                    valid += 1;
                    metrics.transactions_failed += 1;
                    let message = response.error.as_deref().unwrap_or_default();
                    if !message.starts_with("database service") {
                        return Err(format!("unexpected failure message: {}", message));
                    }
                }
            }
        }

        // Rejected requests never reach the database
        if world.recorder.total_requests() != valid {
            return Err(format!(
                "{} database calls for {} valid transactions",
                world.recorder.total_requests(),
                valid
            ));
        }
        check_no_mismatch(world)
    }

    fn failed(&self, scenario: ScenarioId, reason: String) -> ScenarioResult {
        warn!("✗ {} could not run: {}", scenario, reason);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            final_time_secs: 0.0,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Checks observed failures and latency against a profile.
///
/// The failure rate must sit within five standard deviations (plus one
/// request) of the profile's error rate.
fn check_profile(label: &str, stats: &LabelStats, profile: &IncidentProfile) -> Result<(), String> {
    if stats.requests == 0 {
        return Ok(());
    }

    let n = stats.requests as f64;
    let p = profile.error_rate;
    let tolerance = 5.0 * (p * (1.0 - p) / n).sqrt() + 1.0 / n;
    let observed = stats.failure_rate();
    if (observed - p).abs() > tolerance {
        return Err(format!(
            "{}: failure rate {:.3} outside {:.3} ± {:.3}",
            label, observed, p, tolerance
        ));
    }

    let (lo, hi) = profile.latency_bounds();
    let lo_ms = lo.as_secs_f64() * 1000.0;
    let hi_ms = hi.as_secs_f64() * 1000.0;
    let in_range = if profile.jitter_max.is_zero() {
        stats.min_latency_ms == lo_ms && stats.max_latency_ms == lo_ms
    } else {
        stats.min_latency_ms >= lo_ms && stats.max_latency_ms < hi_ms
    };
    if !in_range {
        return Err(format!(
            "{}: latency [{:.1}, {:.1}]ms outside [{:.0}, {:.0})ms",
            label, stats.min_latency_ms, stats.max_latency_ms, lo_ms, hi_ms
        ));
    }
    Ok(())
}

fn check_no_mismatch(world: &SimWorld) -> Result<(), String> {
    match world.recorder.mismatched() {
        0 => Ok(()),
        n => Err(format!("{} failures carried another incident's message", n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_scenario() {
        let result = ScenarioRunner::new(42).with_requests(500).run(ScenarioId::Baseline);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.requests, 500);
        assert_eq!(result.metrics.episodes, 0);
        assert!(result.metrics.max_latency_ms < 150.0);
    }

    #[test]
    fn test_timeout_storm_scenario() {
        let result = ScenarioRunner::new(7).with_requests(1000).run(ScenarioId::TimeoutStorm);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.failures >= 800);
        assert!(result.metrics.max_latency_ms < 8000.0);
        // Concurrent calls overlap in virtual time
        assert!(result.final_time_secs < 8.0);
    }

    #[test]
    fn test_forced_scenarios_pass() {
        for scenario in [
            ScenarioId::RefusedFlood,
            ScenarioId::DeadlockContention,
            ScenarioId::DiskPressure,
            ScenarioId::LatencySpike,
        ] {
            let result = ScenarioRunner::new(3).with_requests(400).run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert_eq!(result.metrics.mismatched, 0);
            // The clock stays idle, so only the held incident is recorded
            assert_eq!(result.metrics.episodes, 1, "{}", scenario);
        }
    }

    #[test]
    fn test_incident_cycle_scenario() {
        let result = ScenarioRunner::new(42)
            .with_requests(200)
            .with_window(Duration::from_secs(600))
            .run(ScenarioId::IncidentCycle);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.final_time_secs >= 600.0);
    }

    #[test]
    fn test_transaction_mix_scenario() {
        let result = ScenarioRunner::new(11)
            .with_requests(200)
            .with_window(Duration::from_secs(300))
            .run(ScenarioId::TransactionMix);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.transactions_rejected, 50);
        assert_eq!(result.metrics.transactions_ok + result.metrics.transactions_failed, 150);
    }

    #[test]
    fn test_same_seed_same_result() {
        let runner = ScenarioRunner::new(99).with_requests(300);

        let first = runner.run(ScenarioId::DeadlockContention);
        let second = runner.run(ScenarioId::DeadlockContention);

        assert_eq!(first.metrics.failures, second.metrics.failures);
        assert_eq!(first.metrics.mean_latency_ms, second.metrics.mean_latency_ms);
    }
}
