//! Configuration for the incident clock and the service facades.

use std::time::Duration;
use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Start probability outside [0, 1]
    #[error("start probability must be within [0, 1], got {0}")]
    StartProbability(f64),

    /// Empty or inverted incident duration range
    #[error("incident duration range is empty: [{min:?}, {max:?})")]
    DurationRange { min: Duration, max: Duration },

    /// Zero tick period
    #[error("tick period must be non-zero")]
    ZeroPeriod,
}

/// Configuration for the incident clock.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockConfig {
    /// Interval between start rolls
    pub tick_period: Duration,

    /// Probability that a tick starts an incident while calm
    pub start_probability: f64,

    /// Shortest incident (inclusive)
    pub min_duration: Duration,

    /// Longest incident (exclusive)
    pub max_duration: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(45),
            start_probability: 0.25,
            min_duration: Duration::from_secs(15),
            max_duration: Duration::from_secs(90),
        }
    }
}

impl ClockConfig {
    /// Sets the tick period.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Sets the per-tick start probability.
    pub fn with_start_probability(mut self, probability: f64) -> Self {
        self.start_probability = probability;
        self
    }

    /// Sets the incident duration range `[min, max)`.
    pub fn with_duration_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_duration = min;
        self.max_duration = max;
        self
    }

    /// Checks the configuration for values the clock cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        if !(0.0..=1.0).contains(&self.start_probability) {
            return Err(ConfigError::StartProbability(self.start_probability));
        }
        if self.min_duration >= self.max_duration {
            return Err(ConfigError::DurationRange {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        Ok(())
    }
}

/// Configuration for a database facade.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name (for logging and telemetry attributes)
    pub name: String,

    /// Probability that a health check reports healthy during an incident
    pub degraded_health_probability: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "database-service".to_string(),
            degraded_health_probability: 0.3,
        }
    }
}

/// Configuration for the transaction facade.
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Service name (for logging)
    pub name: String,

    /// Upper bound on a single database call
    pub database_timeout: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            name: "core-api-service".to_string(),
            database_timeout: Duration::from_secs(30),
        }
    }
}

impl TransactionConfig {
    /// Sets the database call timeout.
    pub fn with_database_timeout(mut self, timeout: Duration) -> Self {
        self.database_timeout = timeout;
        self
    }
}
