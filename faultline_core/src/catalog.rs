//! Incident Catalog - the closed set of incident kinds and their effects.
//!
//! Every fault kind maps to a fixed [`IncidentProfile`]; the "no incident"
//! row lives in [`BASELINE_PROFILE`] so the lookup over fault kinds stays
//! total.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Label used wherever the calm state needs a string form.
pub const NO_INCIDENT_LABEL: &str = "none";

/// Failure message for the calm state and for kinds without a dedicated one.
pub const GENERIC_FAILURE_MESSAGE: &str = "database connection error";

/// A simulated fault kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// Connections hang for seconds and mostly fail
    ConnectionTimeout,

    /// Slow but mostly successful queries
    HighLatency,

    /// Fast, near-total rejection
    ConnectionRefused,

    /// Lock contention with moderate failure rate
    Deadlock,

    /// Writes fail after a long stall
    DiskFull,
}

/// Effect parameters for one incident kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidentProfile {
    /// Probability that a single request fails, in [0, 1]
    pub error_rate: f64,

    /// Fixed part of the simulated latency
    pub base_latency: Duration,

    /// Upper bound (exclusive) of the uniform jitter added to `base_latency`
    pub jitter_max: Duration,
}

impl IncidentProfile {
    const fn from_millis(error_rate: f64, base_ms: u64, jitter_ms: u64) -> Self {
        Self {
            error_rate,
            base_latency: Duration::from_millis(base_ms),
            jitter_max: Duration::from_millis(jitter_ms),
        }
    }

    /// Returns the latency range `[base, base + jitter_max)` covered by this profile.
    ///
    /// For zero jitter the range degenerates to exactly `base`.
    pub fn latency_bounds(&self) -> (Duration, Duration) {
        (self.base_latency, self.base_latency + self.jitter_max)
    }
}

/// Profile used while no incident is active.
pub const BASELINE_PROFILE: IncidentProfile = IncidentProfile::from_millis(0.02, 50, 100);

impl IncidentKind {
    /// Every fault kind, in catalog order.
    pub const ALL: [IncidentKind; 5] = [
        IncidentKind::ConnectionTimeout,
        IncidentKind::HighLatency,
        IncidentKind::ConnectionRefused,
        IncidentKind::Deadlock,
        IncidentKind::DiskFull,
    ];

    /// Returns the snake_case label.
    pub fn name(&self) -> &'static str {
        match self {
            IncidentKind::ConnectionTimeout => "connection_timeout",
            IncidentKind::HighLatency => "high_latency",
            IncidentKind::ConnectionRefused => "connection_refused",
            IncidentKind::Deadlock => "deadlock",
            IncidentKind::DiskFull => "disk_full",
        }
    }

    /// Returns the effect parameters for this kind.
    pub fn profile(&self) -> IncidentProfile {
        profile_for(*self)
    }

    /// Human-readable message attached to failures during this incident.
    pub fn failure_message(&self) -> &'static str {
        match self {
            IncidentKind::ConnectionTimeout => "connection timeout after 30 seconds",
            IncidentKind::ConnectionRefused => "connection refused by database server",
            IncidentKind::Deadlock => "deadlock detected in database transaction",
            IncidentKind::DiskFull => "insufficient disk space for database operation",
            IncidentKind::HighLatency => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// Stable numeric code, never zero (zero encodes the calm state).
    pub(crate) fn code(&self) -> u8 {
        match self {
            IncidentKind::ConnectionTimeout => 1,
            IncidentKind::HighLatency => 2,
            IncidentKind::ConnectionRefused => 3,
            IncidentKind::Deadlock => 4,
            IncidentKind::DiskFull => 5,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<IncidentKind> {
        match code {
            1 => Some(IncidentKind::ConnectionTimeout),
            2 => Some(IncidentKind::HighLatency),
            3 => Some(IncidentKind::ConnectionRefused),
            4 => Some(IncidentKind::Deadlock),
            5 => Some(IncidentKind::DiskFull),
            _ => None,
        }
    }
}

/// Looks up the profile of a fault kind.
pub fn profile_for(kind: IncidentKind) -> IncidentProfile {
    match kind {
        IncidentKind::ConnectionTimeout => IncidentProfile::from_millis(0.85, 5000, 3000),
        IncidentKind::HighLatency => IncidentProfile::from_millis(0.15, 2000, 1000),
        IncidentKind::ConnectionRefused => IncidentProfile::from_millis(0.95, 100, 0),
        IncidentKind::Deadlock => IncidentProfile::from_millis(0.40, 1000, 2000),
        IncidentKind::DiskFull => IncidentProfile::from_millis(0.70, 3000, 0),
    }
}

impl std::fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for IncidentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connection_timeout" | "timeout" => Ok(IncidentKind::ConnectionTimeout),
            "high_latency" | "latency" => Ok(IncidentKind::HighLatency),
            "connection_refused" | "refused" => Ok(IncidentKind::ConnectionRefused),
            "deadlock" => Ok(IncidentKind::Deadlock),
            "disk_full" | "diskfull" => Ok(IncidentKind::DiskFull),
            _ => Err(format!("Unknown incident kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_table() {
        let timeout = profile_for(IncidentKind::ConnectionTimeout);
        assert_eq!(timeout.error_rate, 0.85);
        assert_eq!(timeout.base_latency, Duration::from_millis(5000));
        assert_eq!(timeout.jitter_max, Duration::from_millis(3000));

        let latency = profile_for(IncidentKind::HighLatency);
        assert_eq!(latency.error_rate, 0.15);
        assert_eq!(latency.base_latency, Duration::from_secs(2));
        assert_eq!(latency.jitter_max, Duration::from_secs(1));

        let refused = profile_for(IncidentKind::ConnectionRefused);
        assert_eq!(refused.error_rate, 0.95);
        assert_eq!(refused.base_latency, Duration::from_millis(100));
        assert_eq!(refused.jitter_max, Duration::ZERO);

        let deadlock = profile_for(IncidentKind::Deadlock);
        assert_eq!(deadlock.error_rate, 0.40);
        assert_eq!(deadlock.base_latency, Duration::from_secs(1));
        assert_eq!(deadlock.jitter_max, Duration::from_secs(2));

        let disk = profile_for(IncidentKind::DiskFull);
        assert_eq!(disk.error_rate, 0.70);
        assert_eq!(disk.base_latency, Duration::from_secs(3));
        assert_eq!(disk.jitter_max, Duration::ZERO);
    }

    #[test]
    fn test_baseline_profile() {
        assert_eq!(BASELINE_PROFILE.error_rate, 0.02);
        assert_eq!(
            BASELINE_PROFILE.latency_bounds(),
            (Duration::from_millis(50), Duration::from_millis(150))
        );
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            IncidentKind::Deadlock.failure_message(),
            "deadlock detected in database transaction"
        );
        assert_eq!(
            IncidentKind::ConnectionTimeout.failure_message(),
            "connection timeout after 30 seconds"
        );
        assert_eq!(IncidentKind::HighLatency.failure_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_codes_round_trip() {
        for kind in IncidentKind::ALL {
            assert_ne!(kind.code(), 0);
            assert_eq!(IncidentKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(IncidentKind::from_code(0), None);
    }

    #[test]
    fn test_parse_labels() {
        for kind in IncidentKind::ALL {
            assert_eq!(kind.name().parse::<IncidentKind>(), Ok(kind));
        }
        assert!("none".parse::<IncidentKind>().is_err());
    }
}
