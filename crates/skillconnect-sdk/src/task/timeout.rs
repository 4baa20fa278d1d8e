use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SdkError};

/// Run a gateway call with a deadline; expiry is [`SdkError::Timeout`]
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, "Remote call timed out");
            Err(SdkError::Timeout(limit.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result: Result<()> = with_timeout(Duration::from_secs(15), std::future::pending()).await;
        assert_eq!(result, Err(SdkError::Timeout(15)));
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok(3) }).await;
        assert_eq!(ok, Ok(3));

        let err: Result<()> = with_timeout(Duration::from_secs(1), async {
            Err(SdkError::Unauthorized)
        })
        .await;
        assert_eq!(err, Err(SdkError::Unauthorized));
    }
}
