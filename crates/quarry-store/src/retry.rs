//! Retry with exponential backoff for network-bound store operations.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Backoff parameters. Total attempts per operation are `1 + max_retries`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failed attempt `attempt` (0-based):
    /// `min(max_delay, base_delay * multiplier^attempt)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt.min(63) as i32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let capped = millis.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(capped.max(1))
    }
}

/// Run `f` until it succeeds or the policy is exhausted.
///
/// Every failed attempt short of the last is logged and followed by a
/// computed backoff delay; the final failure is returned to the caller.
pub(crate) async fn with_retry<T, F, Fut>(
    op: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut last_err: Option<StoreError> = None;
    for attempt in 0..=policy.max_retries {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < policy.max_retries {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        op,
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "store operation failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| StoreError::Connection(format!("{op}: no attempts made")));
    tracing::error!(op, error = %err, "store operation failed after all retries");
    Err(err)
}
