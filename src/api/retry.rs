//! Exponential-backoff retry wrapper for fallible async operations.

use crate::error::{FetchError, Result};
use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy with exponential backoff.
///
/// `retries` is the number of re-attempts after the first try, so an
/// operation runs at most `retries + 1` times. Backoff carries no jitter;
/// the providers this layer talks to are few enough that synchronized
/// retries are not a concern.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            initial_delay,
            max_delay,
        }
    }

    /// Delay before re-attempting after the given 0-based failed attempt:
    /// `min(initial_delay * 2^attempt, max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_delay
            .as_millis()
            .saturating_mul(1u128 << attempt.min(20));
        Duration::from_millis(exp.min(self.max_delay.as_millis()) as u64)
    }

    /// Execute `operation`, retrying transient failures with backoff.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_observed(operation, |_, _| {}).await
    }

    /// Like [`execute`](Self::execute), invoking `observer` with the error and
    /// 0-based attempt number before each backoff wait.
    ///
    /// Only errors classified retryable are re-attempted; cancellation and
    /// fatal upstream statuses return immediately. After the final attempt
    /// the original last error is returned unwrapped.
    pub async fn execute_observed<T, F, Fut, O>(&self, mut operation: F, mut observer: O) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        O: FnMut(&FetchError, u32),
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !err.should_retry() {
                        return Err(err);
                    }
                    if attempt >= self.retries {
                        error!("All {} attempts failed: {}", self.retries + 1, err);
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "Attempt {} failed: {} (retrying in {:?})",
                        attempt + 1,
                        err,
                        delay
                    );
                    observer(&err, attempt);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
