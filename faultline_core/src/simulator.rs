//! Request Outcome Simulator.
//!
//! Maps `(request, incident snapshot)` to a simulated latency, a weighted
//! success/failure decision and, on success, an operation-specific payload.
//! The draw is split from the wait: [`RequestSimulator::plan`] is pure and
//! synchronous, [`RequestSimulator::simulate`] plans and then suspends for the
//! planned latency on the context's clock.

use crate::state::IncidentSnapshot;
use faultline_env::FaultlineContext;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Operation answered with a balance payload.
pub const GET_BALANCE: &str = "get_balance";

/// Operation answered with a balance + available balance payload.
pub const BALANCE_CHECK: &str = "balance_check";

/// Currency reported in balance payloads.
pub const CURRENCY: &str = "USD";

/// Upper bound (exclusive) of synthesized balances.
pub const MAX_BALANCE: f64 = 10_000.0;

/// Upper bound (exclusive) of synthesized available balances.
pub const MAX_AVAILABLE_BALANCE: f64 = 8_000.0;

/// A request classification as handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub user_id: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl OperationRequest {
    /// Creates a request without an amount.
    pub fn new(user_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            operation: operation.into(),
            amount: None,
        }
    }

    /// Attaches an amount.
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Success payload, serialized as a flat map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Answer to `get_balance`
    Balance {
        user_id: String,
        balance: f64,
        currency: String,
    },

    /// Answer to `balance_check`
    BalanceCheck {
        user_id: String,
        balance: f64,
        available_balance: f64,
        currency: String,
    },

    /// Answer to any other operation
    Mutation {
        user_id: String,
        result: String,
        affected_rows: u32,
    },
}

impl Payload {
    /// User the payload was synthesized for.
    pub fn user_id(&self) -> &str {
        match self {
            Payload::Balance { user_id, .. }
            | Payload::BalanceCheck { user_id, .. }
            | Payload::Mutation { user_id, .. } => user_id,
        }
    }

    /// Balance field, if this payload carries one.
    pub fn balance(&self) -> Option<f64> {
        match self {
            Payload::Balance { balance, .. } | Payload::BalanceCheck { balance, .. } => Some(*balance),
            Payload::Mutation { .. } => None,
        }
    }

    /// Converts to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn synthesize<R: Rng + ?Sized>(request: &OperationRequest, rng: &mut R) -> Self {
        let user_id = request.user_id.clone();
        match request.operation.as_str() {
            GET_BALANCE => Payload::Balance {
                user_id,
                balance: rng.gen_range(0.0..MAX_BALANCE),
                currency: CURRENCY.to_string(),
            },
            BALANCE_CHECK => Payload::BalanceCheck {
                user_id,
                balance: rng.gen_range(0.0..MAX_BALANCE),
                available_balance: rng.gen_range(0.0..MAX_AVAILABLE_BALANCE),
                currency: CURRENCY.to_string(),
            },
            // Unknown operations still get an answer
            _ => Payload::Mutation {
                user_id,
                result: "success".to_string(),
                affected_rows: rng.gen_range(1..=5),
            },
        }
    }
}

/// The two outcome kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Call succeeded
    Success { payload: Payload },

    /// Call failed on purpose
    SimulatedFailure { message: String },
}

/// Result of one simulated call.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    /// Simulated (and actually waited) latency
    pub elapsed: Duration,

    /// Success payload or failure message
    pub result: OutcomeKind,
}

impl SimulationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, OutcomeKind::Success { .. })
    }

    /// Elapsed time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.result {
            OutcomeKind::SimulatedFailure { message } => Some(message),
            OutcomeKind::Success { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.result {
            OutcomeKind::Success { payload } => Some(payload),
            OutcomeKind::SimulatedFailure { .. } => None,
        }
    }
}

/// Every random decision for one call, drawn up front.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    /// Snapshot the plan was drawn under
    pub snapshot: IncidentSnapshot,

    /// Latency to wait before answering
    pub latency: Duration,

    /// Outcome to answer with
    pub result: OutcomeKind,
}

impl SimulationPlan {
    /// Turns the plan into the outcome reported after the wait.
    pub fn into_outcome(self) -> SimulationOutcome {
        SimulationOutcome {
            elapsed: self.latency,
            result: self.result,
        }
    }
}

/// Simulates database calls against the current incident.
pub struct RequestSimulator<Ctx: FaultlineContext> {
    /// Environment context (clock, generators)
    context: Arc<Ctx>,
}

impl<Ctx: FaultlineContext> RequestSimulator<Ctx> {
    /// Creates a simulator bound to a context.
    pub fn new(context: Arc<Ctx>) -> Self {
        Self { context }
    }

    /// Draws latency, success and payload for one call without waiting.
    ///
    /// Draw order: jitter, failure roll, payload fields.
    pub fn plan<R: Rng + ?Sized>(
        request: &OperationRequest,
        snapshot: IncidentSnapshot,
        rng: &mut R,
    ) -> SimulationPlan {
        let profile = snapshot.profile();

        let jitter_ms = profile.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 { 0 } else { rng.gen_range(0..jitter_ms) };
        let latency = profile.base_latency + Duration::from_millis(jitter);

        let result = if rng.gen::<f64>() < profile.error_rate {
            OutcomeKind::SimulatedFailure {
                message: snapshot.failure_message().to_string(),
            }
        } else {
            OutcomeKind::Success {
                payload: Payload::synthesize(request, rng),
            }
        };

        SimulationPlan {
            snapshot,
            latency,
            result,
        }
    }

    /// Simulates one call: plans it, waits the planned latency, returns the outcome.
    pub async fn simulate(&self, request: &OperationRequest, snapshot: IncidentSnapshot) -> SimulationOutcome {
        let plan = {
            let mut rng = self.context.derive_rng();
            Self::plan(request, snapshot, &mut rng)
        };

        self.context.sleep(plan.latency).await;
        plan.into_outcome()
    }
}

impl<Ctx: FaultlineContext> Clone for RequestSimulator<Ctx> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
        }
    }
}
