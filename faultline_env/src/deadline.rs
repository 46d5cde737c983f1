//! Caller-side bounded waits.

use crate::context::FaultlineContext;
use crate::error::EnvError;
use std::future::Future;
use std::time::Duration;

/// Runs `future` to completion unless `limit` elapses first on the context's clock.
///
/// The engine itself never times out a simulated call; callers that need a
/// bounded wait wrap the call in this helper.
pub async fn with_deadline<Ctx, F, T>(ctx: &Ctx, limit: Duration, future: F) -> Result<T, EnvError>
where
    Ctx: FaultlineContext,
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        value = future => Ok(value),
        _ = ctx.sleep(limit) => Err(EnvError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokioContext;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passes_fast_future() {
        let ctx = TokioContext::new();
        let result = with_deadline(&ctx, Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = TokioContext::new();
        let result = with_deadline(&ctx, Duration::from_secs(30), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;

        assert!(matches!(result, Err(EnvError::Timeout(30_000))));
    }
}
