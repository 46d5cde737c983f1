//! Transaction facade - the upstream API in front of the simulated database.
//!
//! Validates and identifies transactions, then calls the database facade
//! in-process with a bounded wait. Simulated database failures surface as
//! failed transactions, never as panics.

use crate::config::TransactionConfig;
use crate::service::DatabaseService;
use crate::simulator::{OperationRequest, Payload, BALANCE_CHECK, GET_BALANCE};
use faultline_env::{with_deadline, EnvError, FaultlineContext};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// User id used when a balance lookup names nobody.
pub const DEFAULT_USER: &str = "user_default";

/// Errors that can end a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Amount is zero, negative or not a number
    #[error("amount must be positive")]
    InvalidAmount(f64),

    /// Simulated database failure
    #[error("database service error: {0}")]
    Database(String),

    /// Database call did not answer in time
    #[error("database service call failed: {0}")]
    Unavailable(#[from] EnvError),
}

impl TransactionError {
    /// True for errors caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TransactionError::InvalidAmount(_))
    }
}

/// Incoming transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub user_id: String,
    #[serde(default)]
    pub amount: f64,
    pub operation: String,
}

impl TransactionRequest {
    pub fn new(user_id: impl Into<String>, amount: f64, operation: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            operation: operation.into(),
        }
    }

    /// Request used when the caller supplies none.
    pub fn synthesize<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            user_id: format!("user_{}", rng.gen_range(0..1000)),
            amount: rng.gen_range(0.0..1000.0),
            operation: BALANCE_CHECK.to_string(),
        }
    }

    fn to_operation(&self) -> OperationRequest {
        OperationRequest::new(self.user_id.clone(), self.operation.clone()).with_amount(self.amount)
    }
}

/// Status field of a transaction response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Database answered with a payload
    Success,
    /// Database failed or timed out
    Failed,
    /// Request rejected before reaching the database
    Error,
}

/// Answer to one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub status: TransactionStatus,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionResponse {
    /// HTTP-style status a transport layer would answer with.
    pub fn status_code(&self) -> u16 {
        match self.status {
            TransactionStatus::Success => 200,
            TransactionStatus::Failed => 500,
            TransactionStatus::Error => 400,
        }
    }
}

/// Health of the transaction facade and its dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreHealth {
    pub status: &'static str,
    pub database_healthy: bool,
    pub timestamp: i64,
}

/// Transaction API over a [`DatabaseService`].
pub struct TransactionService<Ctx: FaultlineContext> {
    config: TransactionConfig,
    database: Arc<DatabaseService<Ctx>>,
}

impl<Ctx: FaultlineContext> TransactionService<Ctx> {
    pub fn new(database: Arc<DatabaseService<Ctx>>, config: TransactionConfig) -> Self {
        Self { config, database }
    }

    pub fn database(&self) -> &Arc<DatabaseService<Ctx>> {
        &self.database
    }

    fn context(&self) -> &Ctx {
        self.database.context()
    }

    /// Processes a transaction; `None` synthesizes a default balance check.
    pub async fn process(&self, request: Option<TransactionRequest>) -> TransactionResponse {
        let mut rng = self.context().derive_rng();
        let request = request.unwrap_or_else(|| TransactionRequest::synthesize(&mut rng));
        let transaction_id = format!("txn_{}_{}", self.context().unix_secs(), rng.gen_range(0..10_000));

        info!(
            service = %self.config.name,
            transaction.id = %transaction_id,
            user.id = %request.user_id,
            operation = %request.operation,
            "🔄 processing transaction"
        );

        let result = self.execute(&request).await;
        let timestamp = self.context().unix_secs();

        match result {
            Ok(payload) => {
                info!(transaction.id = %transaction_id, "✅ transaction successful");
                TransactionResponse {
                    transaction_id,
                    status: TransactionStatus::Success,
                    timestamp,
                    data: Some(payload),
                    error: None,
                }
            }
            Err(e) => {
                let status = if e.is_client_error() {
                    TransactionStatus::Error
                } else {
                    TransactionStatus::Failed
                };
                warn!(transaction.id = %transaction_id, error = %e, "❌ transaction failed");
                TransactionResponse {
                    transaction_id,
                    status,
                    timestamp,
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Validates and forwards a transaction to the database.
    pub async fn execute(&self, request: &TransactionRequest) -> Result<Payload, TransactionError> {
        if request.amount.is_nan() || request.amount <= 0.0 {
            return Err(TransactionError::InvalidAmount(request.amount));
        }
        self.call_database(request.to_operation()).await
    }

    /// Looks up a user's balance.
    pub async fn balance(&self, user_id: &str) -> Result<Payload, TransactionError> {
        let user_id = if user_id.is_empty() { DEFAULT_USER } else { user_id };
        self.call_database(OperationRequest::new(user_id, GET_BALANCE)).await
    }

    /// Reports healthy itself and relays the database's health.
    pub fn health(&self) -> CoreHealth {
        let database_healthy = self.database.health().is_healthy();
        if !database_healthy {
            warn!(service = %self.config.name, "database service unhealthy");
        }
        CoreHealth {
            status: "healthy",
            database_healthy,
            timestamp: self.context().unix_secs(),
        }
    }

    async fn call_database(&self, request: OperationRequest) -> Result<Payload, TransactionError> {
        let response = with_deadline(
            self.context(),
            self.config.database_timeout,
            self.database.query(request),
        )
        .await?;

        match response.data {
            Some(payload) => Ok(payload),
            None => Err(TransactionError::Database(response.error.unwrap_or_default())),
        }
    }
}
