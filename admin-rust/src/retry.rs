use folio_sdk::FolioResult;
use std::{future::Future, time::Duration};
use tracing::warn;

/// Bounded exponential backoff shared by every list-fetching call site.
///
/// Attempt `n` (zero-based) that fails is followed by a sleep of
/// `base_delay * 2^n`. The last attempt's failure is returned without
/// sleeping. Auth failures are returned at once since another attempt with
/// the same token cannot succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A single attempt, no retry.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Backoff after the failed zero-based `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails with an auth failure, or runs
    /// out of attempts. The closure receives the zero-based attempt.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> FolioResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FolioResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt + 1 < max_attempts && error.is_retryable() => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt = attempt + 1, ?delay, %error, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
