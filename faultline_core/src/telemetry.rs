//! Telemetry Emission Contract.
//!
//! The engine reports what happened; what to do with it (HTTP status codes,
//! counters, spans, log lines) belongs to whoever implements
//! [`TelemetrySink`]. Nothing in here knows about a telemetry backend or a
//! wire format.

use crate::catalog::IncidentKind;
use crate::simulator::{OperationRequest, SimulationOutcome};
use crate::state::IncidentSnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why an incident ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveReason {
    /// Scheduled expiry fired
    Expired,
    /// Replaced or cleared by an operator override
    Forced,
    /// Clock shut down while the incident was active
    Shutdown,
}

/// Incident state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum IncidentEvent {
    /// An incident began
    Started {
        kind: IncidentKind,
        episode: u64,
        /// Scheduled lifetime, `None` for incidents held until resolved
        duration: Option<Duration>,
        /// Context time of the transition
        at: Duration,
    },

    /// An incident ended
    Resolved {
        kind: IncidentKind,
        episode: u64,
        reason: ResolveReason,
        at: Duration,
    },
}

impl IncidentEvent {
    /// Fault kind involved in the transition.
    pub fn kind(&self) -> IncidentKind {
        match self {
            IncidentEvent::Started { kind, .. } | IncidentEvent::Resolved { kind, .. } => *kind,
        }
    }

    /// Episode number involved in the transition.
    pub fn episode(&self) -> u64 {
        match self {
            IncidentEvent::Started { episode, .. } | IncidentEvent::Resolved { episode, .. } => *episode,
        }
    }

    /// Context time of the transition.
    pub fn at(&self) -> Duration {
        match self {
            IncidentEvent::Started { at, .. } | IncidentEvent::Resolved { at, .. } => *at,
        }
    }
}

/// Attribute value attached to an outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Str(String),
    Bool(bool),
    F64(f64),
}

/// Key/value pair for the instrumentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub key: &'static str,
    pub value: AttributeValue,
}

impl Attribute {
    fn new(key: &'static str, value: AttributeValue) -> Self {
        Self { key, value }
    }
}

/// One simulated call together with the incident snapshot that shaped it.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeReport<'a> {
    /// Reporting service
    pub service: &'a str,

    /// The request as received
    pub request: &'a OperationRequest,

    /// Incident snapshot read for this call
    pub snapshot: IncidentSnapshot,

    /// Simulated result
    pub outcome: &'a SimulationOutcome,
}

impl<'a> OutcomeReport<'a> {
    /// `"success"` or `"error"`.
    pub fn status_label(&self) -> &'static str {
        if self.outcome.is_success() {
            "success"
        } else {
            "error"
        }
    }

    /// HTTP-style status a transport layer would answer with.
    pub fn status_code(&self) -> u16 {
        if self.outcome.is_success() {
            200
        } else {
            500
        }
    }

    /// Flattened attributes for metrics, spans and log records.
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut attrs = vec![
            Attribute::new("service", AttributeValue::Str(self.service.to_string())),
            Attribute::new("operation", AttributeValue::Str(self.request.operation.clone())),
            Attribute::new("user.id", AttributeValue::Str(self.request.user_id.clone())),
            Attribute::new("status", AttributeValue::Str(self.status_label().to_string())),
            Attribute::new("incident.active", AttributeValue::Bool(self.snapshot.is_active())),
            Attribute::new("incident.type", AttributeValue::Str(self.snapshot.kind_label().to_string())),
            Attribute::new("elapsed_ms", AttributeValue::F64(self.outcome.elapsed_ms())),
        ];
        if let Some(message) = self.outcome.error_message() {
            attrs.push(Attribute::new("error.type", AttributeValue::Str(self.snapshot.kind_label().to_string())));
            attrs.push(Attribute::new("error.message", AttributeValue::Str(message.to_string())));
        }
        attrs
    }
}

/// Receiver for everything the engine wants observed.
///
/// Incident events arrive while the clock holds its transition lock, so an
/// implementation must not call back into the clock.
pub trait TelemetrySink: Send + Sync {
    /// Called on every incident start and stop.
    fn on_incident(&self, event: &IncidentEvent);

    /// Called once per simulated call.
    fn on_outcome(&self, report: &OutcomeReport<'_>);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn on_incident(&self, _event: &IncidentEvent) {}

    fn on_outcome(&self, _report: &OutcomeReport<'_>) {}
}

/// Sink that turns events into structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn on_incident(&self, event: &IncidentEvent) {
        match event {
            IncidentEvent::Started { kind, episode, duration, .. } => {
                info!(
                    incident.type = %kind,
                    incident.episode = episode,
                    duration_secs = duration.map(|d| d.as_secs_f64()),
                    "🚨 database incident detected: {}", kind
                );
            }
            IncidentEvent::Resolved { kind, episode, reason, .. } => {
                info!(
                    incident.type = %kind,
                    incident.episode = episode,
                    reason = ?reason,
                    "✅ database incident resolved: {}", kind
                );
            }
        }
    }

    fn on_outcome(&self, report: &OutcomeReport<'_>) {
        let elapsed_ms = report.outcome.elapsed_ms();
        match report.outcome.error_message() {
            None => debug!(
                service = report.service,
                operation = %report.request.operation,
                user.id = %report.request.user_id,
                incident.type = report.snapshot.kind_label(),
                elapsed_ms,
                "database query successful"
            ),
            Some(message) => warn!(
                service = report.service,
                operation = %report.request.operation,
                user.id = %report.request.user_id,
                incident.type = report.snapshot.kind_label(),
                elapsed_ms,
                "❌ database query failed: {}", message
            ),
        }
    }
}

/// Sink that forwards every call to each inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn on_incident(&self, event: &IncidentEvent) {
        for sink in &self.sinks {
            sink.on_incident(event);
        }
    }

    fn on_outcome(&self, report: &OutcomeReport<'_>) {
        for sink in &self.sinks {
            sink.on_outcome(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{OutcomeKind, Payload};
    use crate::testing::EventLog;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        buf.contents()
    }

    fn failed_outcome() -> SimulationOutcome {
        SimulationOutcome {
            elapsed: Duration::from_millis(1500),
            result: OutcomeKind::SimulatedFailure {
                message: IncidentKind::Deadlock.failure_message().to_string(),
            },
        }
    }

    fn request() -> OperationRequest {
        OperationRequest::new("user_7", "get_balance")
    }

    fn find<'a>(attrs: &'a [Attribute], key: &str) -> Option<&'a AttributeValue> {
        attrs.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    #[test]
    fn test_failure_report_attributes() {
        let request = request();
        let outcome = SimulationOutcome {
            elapsed: Duration::from_millis(1500),
            result: OutcomeKind::SimulatedFailure {
                message: IncidentKind::Deadlock.failure_message().to_string(),
            },
        };
        let report = OutcomeReport {
            service: "database-service",
            request: &request,
            snapshot: IncidentSnapshot::Active { kind: IncidentKind::Deadlock, episode: 3 },
            outcome: &outcome,
        };

        assert_eq!(report.status_code(), 500);
        assert_eq!(report.status_label(), "error");

        let attrs = report.attributes();
        assert_eq!(find(&attrs, "incident.active"), Some(&AttributeValue::Bool(true)));
        assert_eq!(find(&attrs, "error.type"), Some(&AttributeValue::Str("deadlock".into())));
        assert_eq!(find(&attrs, "elapsed_ms"), Some(&AttributeValue::F64(1500.0)));
    }

    #[test]
    fn test_success_report_has_no_error_attributes() {
        let request = request();
        let outcome = SimulationOutcome {
            elapsed: Duration::from_millis(80),
            result: OutcomeKind::Success {
                payload: Payload::Balance {
                    user_id: "user_7".into(),
                    balance: 12.5,
                    currency: "USD".into(),
                },
            },
        };
        let report = OutcomeReport {
            service: "database-service",
            request: &request,
            snapshot: IncidentSnapshot::Calm,
            outcome: &outcome,
        };

        assert_eq!(report.status_code(), 200);
        let attrs = report.attributes();
        assert_eq!(find(&attrs, "incident.type"), Some(&AttributeValue::Str("none".into())));
        assert!(find(&attrs, "error.type").is_none());
    }

    #[test]
    fn test_event_accessors() {
        let event = IncidentEvent::Resolved {
            kind: IncidentKind::DiskFull,
            episode: 9,
            reason: ResolveReason::Expired,
            at: Duration::from_secs(120),
        };
        assert_eq!(event.kind(), IncidentKind::DiskFull);
        assert_eq!(event.episode(), 9);
        assert_eq!(event.at(), Duration::from_secs(120));
    }

    #[test]
    fn test_tracing_sink_logs_incidents_and_failures() {
        let request = request();
        let outcome = failed_outcome();
        let snapshot = IncidentSnapshot::Active { kind: IncidentKind::Deadlock, episode: 1 };

        let output = capture(|| {
            let sink = TracingSink;
            sink.on_incident(&IncidentEvent::Started {
                kind: IncidentKind::Deadlock,
                episode: 1,
                duration: Some(Duration::from_secs(30)),
                at: Duration::ZERO,
            });
            sink.on_outcome(&OutcomeReport {
                service: "database-service",
                request: &request,
                snapshot,
                outcome: &outcome,
            });
            sink.on_incident(&IncidentEvent::Resolved {
                kind: IncidentKind::Deadlock,
                episode: 1,
                reason: ResolveReason::Forced,
                at: Duration::from_secs(5),
            });
        });

        assert!(output.contains("database incident detected: deadlock"), "{output}");
        assert!(output.contains("database query failed"), "{output}");
        assert!(output.contains(IncidentKind::Deadlock.failure_message()), "{output}");
        assert!(output.contains("database incident resolved: deadlock"), "{output}");
        assert!(output.contains("incident.episode=1"), "{output}");
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(EventLog::default());
        let second = Arc::new(EventLog::default());
        let sinks: Vec<Arc<dyn TelemetrySink>> = vec![first.clone(), Arc::new(NoopSink), second.clone()];
        let fanout = FanoutSink::new(sinks);
        assert_eq!(fanout.len(), 3);

        let event = IncidentEvent::Started {
            kind: IncidentKind::DiskFull,
            episode: 4,
            duration: None,
            at: Duration::from_secs(2),
        };
        fanout.on_incident(&event);

        let request = request();
        let outcome = failed_outcome();
        fanout.on_outcome(&OutcomeReport {
            service: "database-service",
            request: &request,
            snapshot: IncidentSnapshot::Active { kind: IncidentKind::DiskFull, episode: 4 },
            outcome: &outcome,
        });

        for log in [&first, &second] {
            assert_eq!(log.events(), vec![event.clone()]);
            assert_eq!(log.outcomes(), 1);
        }
        assert!(FanoutSink::default().is_empty());
    }
}
