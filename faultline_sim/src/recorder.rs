//! Recording telemetry sink.
//!
//! Collects every incident transition and outcome report so scenarios can
//! assert on what the engine told the outside world.

use faultline_core::telemetry::{IncidentEvent, OutcomeReport, ResolveReason, TelemetrySink};
use faultline_core::IncidentKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One incident from start to end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeRecord {
    pub episode: u64,
    pub kind: IncidentKind,

    /// Virtual time of the start, in seconds
    pub started_at_secs: f64,

    /// Scheduled lifetime, if any
    pub scheduled_secs: Option<f64>,

    /// Virtual time of the end, `None` while still active
    pub ended_at_secs: Option<f64>,

    pub reason: Option<ResolveReason>,
}

impl EpisodeRecord {
    /// Observed lifetime of a finished episode.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at_secs
            .map(|end| Duration::from_secs_f64((end - self.started_at_secs).max(0.0)))
    }
}

/// Outcome statistics under one incident label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelStats {
    pub requests: u64,
    pub failures: u64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub total_latency_ms: f64,

    /// Failure messages and how often each appeared
    pub messages: BTreeMap<String, u64>,
}

impl LabelStats {
    fn record(&mut self, report: &OutcomeReport<'_>) {
        let elapsed_ms = report.outcome.elapsed_ms();
        if self.requests == 0 || elapsed_ms < self.min_latency_ms {
            self.min_latency_ms = elapsed_ms;
        }
        self.max_latency_ms = self.max_latency_ms.max(elapsed_ms);
        self.total_latency_ms += elapsed_ms;
        self.requests += 1;

        if let Some(message) = report.outcome.error_message() {
            self.failures += 1;
            *self.messages.entry(message.to_string()).or_default() += 1;
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64
        }
    }

    pub fn mean_latency_ms(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_latency_ms / self.requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Recording {
    episodes: Vec<EpisodeRecord>,
    by_label: BTreeMap<&'static str, LabelStats>,
    by_operation: BTreeMap<String, u64>,

    /// Failures whose message does not belong to the incident they were reported under
    mismatched: u64,

    /// Starts seen while another episode was still open
    overlaps: u64,
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recording>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every episode seen, in start order.
    pub fn episodes(&self) -> Vec<EpisodeRecord> {
        self.lock().episodes.clone()
    }

    /// Statistics keyed by incident label (`"none"` for calm).
    pub fn by_label(&self) -> BTreeMap<&'static str, LabelStats> {
        self.lock().by_label.clone()
    }

    /// Statistics for one label.
    pub fn label(&self, label: &str) -> LabelStats {
        self.lock().by_label.get(label).cloned().unwrap_or_default()
    }

    /// Request counts keyed by operation.
    pub fn by_operation(&self) -> BTreeMap<String, u64> {
        self.lock().by_operation.clone()
    }

    pub fn total_requests(&self) -> u64 {
        self.lock().by_label.values().map(|s| s.requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.lock().by_label.values().map(|s| s.failures).sum()
    }

    /// Failures reported with a message foreign to their incident.
    pub fn mismatched(&self) -> u64 {
        self.lock().mismatched
    }

    /// Starts that arrived while an episode was open.
    pub fn overlaps(&self) -> u64 {
        self.lock().overlaps
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TelemetrySink for RecordingSink {
    fn on_incident(&self, event: &IncidentEvent) {
        let mut rec = self.lock();
        match *event {
            IncidentEvent::Started { kind, episode, duration, at } => {
                if rec.episodes.iter().any(|e| e.ended_at_secs.is_none()) {
                    rec.overlaps += 1;
                }
                rec.episodes.push(EpisodeRecord {
                    episode,
                    kind,
                    started_at_secs: at.as_secs_f64(),
                    scheduled_secs: duration.map(|d| d.as_secs_f64()),
                    ended_at_secs: None,
                    reason: None,
                });
            }
            IncidentEvent::Resolved { episode, reason, at, .. } => {
                if let Some(record) = rec.episodes.iter_mut().rev().find(|e| e.episode == episode) {
                    record.ended_at_secs = Some(at.as_secs_f64());
                    record.reason = Some(reason);
                }
            }
        }
    }

    fn on_outcome(&self, report: &OutcomeReport<'_>) {
        let mut rec = self.lock();
        if let Some(message) = report.outcome.error_message() {
            if message != report.snapshot.failure_message() {
                rec.mismatched += 1;
            }
        }
        *rec.by_operation.entry(report.request.operation.clone()).or_default() += 1;
        rec.by_label
            .entry(report.snapshot.kind_label())
            .or_default()
            .record(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::simulator::{OperationRequest, OutcomeKind, SimulationOutcome};
    use faultline_core::IncidentSnapshot;
    use proptest::prelude::*;

    fn report_failure(sink: &RecordingSink, snapshot: IncidentSnapshot, message: &str, ms: u64) {
        let request = OperationRequest::new("user_1", "get_balance");
        let outcome = SimulationOutcome {
            elapsed: Duration::from_millis(ms),
            result: OutcomeKind::SimulatedFailure {
                message: message.to_string(),
            },
        };
        sink.on_outcome(&OutcomeReport {
            service: "db",
            request: &request,
            snapshot,
            outcome: &outcome,
        });
    }

    #[test]
    fn test_episode_timeline() {
        let sink = RecordingSink::new();
        sink.on_incident(&IncidentEvent::Started {
            kind: IncidentKind::Deadlock,
            episode: 1,
            duration: Some(Duration::from_secs(20)),
            at: Duration::from_secs(45),
        });
        sink.on_incident(&IncidentEvent::Resolved {
            kind: IncidentKind::Deadlock,
            episode: 1,
            reason: ResolveReason::Expired,
            at: Duration::from_secs(65),
        });

        let episodes = sink.episodes();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].duration(), Some(Duration::from_secs(20)));
        assert_eq!(episodes[0].reason, Some(ResolveReason::Expired));
        assert_eq!(sink.overlaps(), 0);
    }

    #[test]
    fn test_overlap_detected() {
        let sink = RecordingSink::new();
        for episode in 1..=2 {
            sink.on_incident(&IncidentEvent::Started {
                kind: IncidentKind::DiskFull,
                episode,
                duration: None,
                at: Duration::ZERO,
            });
        }
        assert_eq!(sink.overlaps(), 1);
    }

    #[test]
    fn test_label_stats_and_mismatch() {
        let sink = RecordingSink::new();
        let deadlock = IncidentSnapshot::Active {
            kind: IncidentKind::Deadlock,
            episode: 1,
        };

        report_failure(&sink, deadlock, "deadlock detected in database transaction", 1200);
        report_failure(&sink, deadlock, "connection refused by database server", 2800);
        report_failure(&sink, IncidentSnapshot::Calm, "database connection error", 60);

        let stats = sink.label("deadlock");
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.min_latency_ms, 1200.0);
        assert_eq!(stats.max_latency_ms, 2800.0);
        assert_eq!(stats.mean_latency_ms(), 2000.0);
        assert_eq!(sink.mismatched(), 1);
        assert_eq!(sink.total_requests(), 3);
        assert_eq!(sink.by_operation().get("get_balance"), Some(&3));
    }

    proptest! {
        #[test]
        fn prop_latency_stats_ordered(latencies in prop::collection::vec(0u64..10_000, 1..50)) {
            let sink = RecordingSink::new();
            for ms in &latencies {
                report_failure(&sink, IncidentSnapshot::Calm, "database connection error", *ms);
            }

            let stats = sink.label("none");
            prop_assert_eq!(stats.requests, latencies.len() as u64);
            prop_assert!(stats.min_latency_ms <= stats.mean_latency_ms() + 1e-9);
            prop_assert!(stats.mean_latency_ms() <= stats.max_latency_ms + 1e-9);
            let longest = Duration::from_millis(*latencies.iter().max().unwrap());
            prop_assert_eq!(stats.max_latency_ms, longest.as_secs_f64() * 1000.0);
        }
    }
}
