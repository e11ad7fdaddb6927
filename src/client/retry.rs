//! Retry with exponential backoff for backend reads.
//!
//! Only transport failures (connection refused, timeout) are retried. Any
//! response, whatever its status, is handed back to the caller. Vote
//! mutations never go through here.

use std::time::Duration;

use crate::core::RETRY_BASE_DELAY;

/// Delay before retry number `attempt` (zero-based): 200ms, 400ms, 800ms...
pub(crate) fn backoff(attempt: u32) -> Duration {
    RETRY_BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt))
}

/// Send a request, retrying transport failures up to `max_retries` times.
pub(crate) async fn retry_send<F, Fut>(
    endpoint: &str,
    max_retries: u32,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = backoff(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries,
                    "backend request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    f().await
}
