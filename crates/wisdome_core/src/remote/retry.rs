//! Retry-with-backoff policy shared by every remote call.
//!
//! # Invariants
//! - At most `max_attempts` calls are made (at least one).
//! - A terminal error (per the predicate) returns after that single attempt,
//!   without sleeping.
//! - The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`.
//! - When attempts run out the last error is returned unchanged.

use crate::logging::sanitize_message;
use crate::remote::error::{RemoteError, RemoteResult};
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

const MAX_LOGGED_ERROR_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay slept after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Runs `call` with the default predicate [`RemoteError::is_retryable`].
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        self.run_with(operation, RemoteError::is_retryable, call)
            .await
    }

    /// Runs `call` until it succeeds, fails terminally, or attempts run out.
    pub async fn run_with<T, F, Fut, P>(
        &self,
        operation: &str,
        should_retry: P,
        mut call: F,
    ) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
        P: Fn(&RemoteError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            "event=remote_retry module=retry status=ok op={operation} attempt={attempt}"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if !should_retry(&err) || attempt >= max_attempts => {
                    warn!(
                        "event=remote_retry module=retry status=error op={operation} attempt={attempt} retryable={} error={}",
                        should_retry(&err),
                        sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    debug!(
                        "event=remote_retry module=retry status=retry op={operation} attempt={attempt} delay_ms={} error={}",
                        delay.as_millis(),
                        sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
