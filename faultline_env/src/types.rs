//! Common types for the Faultline environment abstraction.

use crate::error::EnvError;
use tokio::task::JoinHandle;

/// Handle to a background task spawned through a context.
///
/// Dropping the handle detaches the task; call [`TaskHandle::abort`] to
/// cancel it.
#[derive(Debug)]
pub struct TaskHandle {
    /// Task name (for logging)
    name: String,

    /// Underlying tokio handle
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Wraps a tokio join handle.
    pub fn new(name: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests cancellation. The task stops at its next suspension point.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Returns true once the task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the task to finish.
    pub async fn join(self) -> Result<(), EnvError> {
        match self.handle.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(EnvError::TaskCancelled(self.name)),
            Err(_) => Err(EnvError::TaskPanicked(self.name)),
        }
    }
}
