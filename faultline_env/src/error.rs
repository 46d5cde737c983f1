//! Error types for the Faultline environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A caller-imposed deadline elapsed
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Background task was aborted before it finished
    #[error("Task cancelled: {0}")]
    TaskCancelled(String),

    /// Background task panicked
    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(EnvError::Timeout(250).to_string(), "Timeout after 250ms");
        assert_eq!(
            EnvError::TaskCancelled("incident-expiry".into()).to_string(),
            "Task cancelled: incident-expiry"
        );
        assert_eq!(EnvError::TaskPanicked("ticker".into()).to_string(), "Task panicked: ticker");
    }
}
