//! Faultline Core - Incident-Correlated Request Simulation Engine
//!
//! Simulates a service backed by an unreliable database so that telemetry
//! pipelines receive realistic, correlated failure signals:
//! 1. **Incident Clock**: a background process that periodically starts
//!    time-boxed incidents of one of five kinds
//! 2. **Request Simulator**: every request reads the current incident and
//!    draws latency, failure and payload from that incident's profile
//! 3. **Telemetry Contract**: every outcome carries the incident label it was
//!    simulated under, so failures correlate with incident windows
//!
//! All time, task and randomness access goes through
//! [`faultline_env::FaultlineContext`], so a seeded run is reproducible.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod service;
pub mod simulator;
pub mod state;
pub mod telemetry;
pub mod transaction;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use catalog::{IncidentKind, IncidentProfile, BASELINE_PROFILE};
pub use clock::{ClockHandle, ClockTick, IncidentClock};
pub use config::{ClockConfig, ConfigError, ServiceConfig, TransactionConfig};
pub use engine::{EngineConfig, FaultlineEngine};
pub use service::{DatabaseService, HealthReport, QueryResponse};
pub use simulator::{OperationRequest, Payload, RequestSimulator, SimulationOutcome};
pub use state::{IncidentSnapshot, IncidentState};
pub use telemetry::{FanoutSink, IncidentEvent, OutcomeReport, ResolveReason, TelemetrySink, TracingSink};
pub use transaction::{TransactionError, TransactionRequest, TransactionResponse, TransactionService};
