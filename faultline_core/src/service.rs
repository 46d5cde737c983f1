//! Database facade - one parameterized service over the engine.
//!
//! Wraps the incident state and the request simulator the way a surrounding
//! HTTP handler would use them: one snapshot per call, an in-flight
//! connection gauge, a telemetry report per outcome. Any number of services
//! can share one clock by constructing several facades over it.

use crate::clock::IncidentClock;
use crate::config::ServiceConfig;
use crate::simulator::{OperationRequest, Payload, RequestSimulator, SimulationOutcome};
use crate::state::{IncidentSnapshot, IncidentState};
use crate::telemetry::{NoopSink, OutcomeReport, TelemetrySink};
use faultline_env::FaultlineContext;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Status field of a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    Error,
}

/// Wire-shaped answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub status: QueryStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub query_time_ms: f64,

    /// Unix seconds
    pub timestamp: i64,
}

impl QueryResponse {
    fn from_outcome(outcome: &SimulationOutcome, timestamp: i64) -> Self {
        Self {
            status: if outcome.is_success() {
                QueryStatus::Success
            } else {
                QueryStatus::Error
            },
            data: outcome.payload().cloned(),
            error: outcome.error_message().map(str::to_string),
            query_time_ms: outcome.elapsed_ms(),
            timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// HTTP-style status a transport layer would answer with.
    pub fn status_code(&self) -> u16 {
        match self.status {
            QueryStatus::Success => 200,
            QueryStatus::Error => 500,
        }
    }
}

/// Health check answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthReport {
    Healthy {
        connections: i64,
        uptime_secs: u64,
    },
    Unhealthy {
        incident_type: &'static str,
        error: String,
    },
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthReport::Healthy { .. })
    }

    /// 200 when healthy, 503 otherwise.
    pub fn status_code(&self) -> u16 {
        if self.is_healthy() {
            200
        } else {
            503
        }
    }
}

/// Point-in-time service status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub incident_active: bool,
    pub incident_type: &'static str,
    pub active_connections: i64,
    pub timestamp: i64,
}

/// Holds one slot of the in-flight gauge for its lifetime.
struct ConnectionGuard<'a>(&'a AtomicI64);

impl<'a> ConnectionGuard<'a> {
    fn acquire(gauge: &'a AtomicI64) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Simulated database service.
pub struct DatabaseService<Ctx: FaultlineContext> {
    /// Name and health policy
    config: ServiceConfig,

    /// Environment context
    context: Arc<Ctx>,

    /// Read-only view of the incident state
    state: Arc<IncidentState>,

    /// Outcome generator
    simulator: RequestSimulator<Ctx>,

    /// Outcome reports go here
    sink: Arc<dyn TelemetrySink>,

    /// Calls currently suspended in the simulator
    active_connections: AtomicI64,
}

impl<Ctx: FaultlineContext> DatabaseService<Ctx> {
    /// Creates a service reading the incident state of `clock`.
    pub fn new(clock: &IncidentClock<Ctx>, config: ServiceConfig) -> Self {
        let context = Arc::clone(clock.context());
        Self {
            config,
            simulator: RequestSimulator::new(Arc::clone(&context)),
            context,
            state: clock.state(),
            sink: Arc::new(NoopSink),
            active_connections: AtomicI64::new(0),
        }
    }

    /// Routes outcome reports to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    /// Current incident as seen by this service.
    pub fn snapshot(&self) -> IncidentSnapshot {
        self.state.snapshot()
    }

    /// Number of calls currently in flight.
    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Runs one simulated query and reports it.
    pub async fn query(&self, request: OperationRequest) -> QueryResponse {
        let (_, outcome) = self.execute(&request).await;
        QueryResponse::from_outcome(&outcome, self.context.unix_secs())
    }

    /// Runs one simulated query, returning the snapshot it used and the raw outcome.
    pub async fn execute(&self, request: &OperationRequest) -> (IncidentSnapshot, SimulationOutcome) {
        let snapshot = self.state.snapshot();
        let outcome = {
            let _connection = ConnectionGuard::acquire(&self.active_connections);
            self.simulator.simulate(request, snapshot).await
        };

        self.sink.on_outcome(&OutcomeReport {
            service: &self.config.name,
            request,
            snapshot,
            outcome: &outcome,
        });

        (snapshot, outcome)
    }

    /// Health check.
    ///
    /// Always healthy while calm; during an incident healthy only with
    /// `degraded_health_probability`.
    pub fn health(&self) -> HealthReport {
        let snapshot = self.state.snapshot();
        let healthy = match snapshot {
            IncidentSnapshot::Calm => true,
            IncidentSnapshot::Active { .. } => {
                self.context.derive_rng().gen::<f64>() < self.config.degraded_health_probability
            }
        };

        if healthy {
            HealthReport::Healthy {
                connections: self.active_connections(),
                uptime_secs: self.context.now().as_secs(),
            }
        } else {
            warn!(service = %self.config.name, incident.type = snapshot.kind_label(), "database unhealthy");
            HealthReport::Unhealthy {
                incident_type: snapshot.kind_label(),
                error: "database service degraded".to_string(),
            }
        }
    }

    /// Status summary for dashboards.
    pub fn status(&self) -> ServiceStatus {
        let snapshot = self.state.snapshot();
        ServiceStatus {
            service: self.config.name.clone(),
            incident_active: snapshot.is_active(),
            incident_type: snapshot.kind_label(),
            active_connections: self.active_connections(),
            timestamp: self.context.unix_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IncidentKind;
    use crate::config::ClockConfig;
    use crate::simulator::GET_BALANCE;
    use crate::testing::{EventLog, TestContext};
    use std::time::Duration;

    fn service(seed: u64) -> (Arc<IncidentClock<TestContext>>, Arc<DatabaseService<TestContext>>, Arc<EventLog>) {
        let log = Arc::new(EventLog::default());
        let clock = Arc::new(IncidentClock::new(Arc::new(TestContext::new(seed)), ClockConfig::default()).unwrap());
        let service = DatabaseService::new(&clock, ServiceConfig::default()).with_sink(log.clone());
        (clock, Arc::new(service), log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_reports_outcome() {
        let (_clock, service, log) = service(1);
        let response = service.query(OperationRequest::new("user_1", GET_BALANCE)).await;

        assert!(response.query_time_ms >= 50.0 && response.query_time_ms < 150.0);
        assert_eq!(response.is_success(), response.data.is_some());
        assert_eq!(response.is_success(), response.error.is_none());
        assert_eq!(log.outcomes(), 1);
        assert_eq!(service.active_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_incident_changes_messages() {
        let (clock, service, _log) = service(2);
        clock.force(IncidentKind::ConnectionRefused, None);

        let mut failures = 0;
        for _ in 0..200 {
            let response = service.query(OperationRequest::new("user_1", "update")).await;
            assert_eq!(response.query_time_ms, 100.0);
            if !response.is_success() {
                failures += 1;
                assert_eq!(response.status_code(), 500);
                assert_eq!(response.error.as_deref(), Some("connection refused by database server"));
            }
        }
        assert!(failures > 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_gauge_tracks_in_flight_calls() {
        let (clock, service, _log) = service(3);
        clock.force(IncidentKind::DiskFull, None);

        let background = Arc::clone(&service);
        let call = tokio::spawn(async move { background.query(OperationRequest::new("user_1", GET_BALANCE)).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(service.active_connections(), 1);
        assert_eq!(service.status().active_connections, 1);

        call.await.unwrap();
        assert_eq!(service.active_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_follows_incident_state() {
        let (clock, service, _log) = service(4);
        assert!(service.health().is_healthy());

        clock.force(IncidentKind::Deadlock, None);
        let unhealthy = (0..1_000).filter(|_| !service.health().is_healthy()).count();
        // Healthy 30% of the time during an incident
        assert!((600..800).contains(&unhealthy), "unhealthy {}", unhealthy);

        let report = loop {
            let report = service.health();
            if !report.is_healthy() {
                break report;
            }
        };
        assert_eq!(report.status_code(), 503);
        assert_eq!(
            report,
            HealthReport::Unhealthy {
                incident_type: "deadlock",
                error: "database service degraded".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot() {
        let (clock, service, _log) = service(5);
        let status = service.status();
        assert!(!status.incident_active);
        assert_eq!(status.incident_type, "none");

        clock.force(IncidentKind::HighLatency, None);
        let status = service.status();
        assert!(status.incident_active);
        assert_eq!(status.incident_type, "high_latency");
        assert_eq!(status.service, "database-service");
    }

    #[test]
    fn test_health_json_shape() {
        let report = HealthReport::Healthy { connections: 2, uptime_secs: 10 };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["connections"], 2);
    }
}
