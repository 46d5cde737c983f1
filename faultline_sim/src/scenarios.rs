//! Fault scenarios for the simulation harness.

use faultline_core::IncidentKind;
use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// FL-001: No incidents, baseline error rate and latency
    Baseline,

    /// FL-002: Forced connection timeout under concurrent load
    TimeoutStorm,

    /// FL-003: Forced connection refusal
    RefusedFlood,

    /// FL-004: Forced deadlock
    DeadlockContention,

    /// FL-005: Forced disk full
    DiskPressure,

    /// FL-006: Forced high latency
    LatencySpike,

    /// FL-007: Free-running clock over a long window
    IncidentCycle,

    /// FL-008: Transaction facade traffic over a free-running clock
    TransactionMix,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::TimeoutStorm,
            ScenarioId::RefusedFlood,
            ScenarioId::DeadlockContention,
            ScenarioId::DiskPressure,
            ScenarioId::LatencySpike,
            ScenarioId::IncidentCycle,
            ScenarioId::TransactionMix,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::TimeoutStorm => "timeout_storm",
            ScenarioId::RefusedFlood => "refused_flood",
            ScenarioId::DeadlockContention => "deadlock_contention",
            ScenarioId::DiskPressure => "disk_pressure",
            ScenarioId::LatencySpike => "latency_spike",
            ScenarioId::IncidentCycle => "incident_cycle",
            ScenarioId::TransactionMix => "transaction_mix",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Clock disabled: ~2% failures, latency in [50ms, 150ms)",
            ScenarioId::TimeoutStorm => "connection_timeout held: ~85% failures, every call >= 5s",
            ScenarioId::RefusedFlood => "connection_refused held: ~95% failures, every call exactly 100ms",
            ScenarioId::DeadlockContention => "deadlock held: ~40% failures, all with the deadlock message",
            ScenarioId::DiskPressure => "disk_full held: ~70% failures, every call exactly 3s",
            ScenarioId::LatencySpike => "high_latency held: ~15% failures, latency in [2s, 3s)",
            ScenarioId::IncidentCycle => "Clock running: episodes never overlap, outcomes match their incident",
            ScenarioId::TransactionMix => "Transactions with default, valid and invalid requests over a running clock",
        }
    }

    /// Incident held for the whole run, if this scenario forces one.
    pub fn forced_incident(&self) -> Option<IncidentKind> {
        match self {
            ScenarioId::TimeoutStorm => Some(IncidentKind::ConnectionTimeout),
            ScenarioId::RefusedFlood => Some(IncidentKind::ConnectionRefused),
            ScenarioId::DeadlockContention => Some(IncidentKind::Deadlock),
            ScenarioId::DiskPressure => Some(IncidentKind::DiskFull),
            ScenarioId::LatencySpike => Some(IncidentKind::HighLatency),
            ScenarioId::Baseline | ScenarioId::IncidentCycle | ScenarioId::TransactionMix => None,
        }
    }

    /// Returns true if the incident clock runs freely during this scenario.
    pub fn uses_clock(&self) -> bool {
        matches!(self, ScenarioId::IncidentCycle | ScenarioId::TransactionMix)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "calm" | "fl-001" => Ok(ScenarioId::Baseline),
            "timeout_storm" | "timeoutstorm" | "fl-002" => Ok(ScenarioId::TimeoutStorm),
            "refused_flood" | "refusedflood" | "fl-003" => Ok(ScenarioId::RefusedFlood),
            "deadlock_contention" | "deadlock" | "fl-004" => Ok(ScenarioId::DeadlockContention),
            "disk_pressure" | "diskpressure" | "fl-005" => Ok(ScenarioId::DiskPressure),
            "latency_spike" | "latencyspike" | "fl-006" => Ok(ScenarioId::LatencySpike),
            "incident_cycle" | "incidentcycle" | "fl-007" => Ok(ScenarioId::IncidentCycle),
            "transaction_mix" | "transactionmix" | "fl-008" => Ok(ScenarioId::TransactionMix),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("FL-004".parse::<ScenarioId>(), Ok(ScenarioId::DeadlockContention));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_forced_and_clock_are_exclusive() {
        for scenario in ScenarioId::all() {
            assert!(!(scenario.forced_incident().is_some() && scenario.uses_clock()));
        }
        assert_eq!(ScenarioId::TimeoutStorm.forced_incident(), Some(IncidentKind::ConnectionTimeout));
    }
}
