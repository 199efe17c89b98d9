//! Exponential backoff helper
//!
//! A standalone retry utility for callers that want one. Nothing in the
//! core paths retries: adapter and driver errors always propagate to the
//! immediate caller unchanged.

use std::future::Future;
use std::time::Duration;

use crate::error::{OrmError, OrmResult};

/// Doubling backoff schedule with a bounded attempt count
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_attempts: 5,
        }
    }
}

impl Backoff {
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay before the given 0-based retry attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `op` until it succeeds or attempts are exhausted. Caller errors
    /// (registration and precondition failures) are never retried.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> OrmResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        let mut last_err: Option<OrmError> = None;
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_caller_error() => return Err(err),
                Err(err) => {
                    last_err = Some(err);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(self.delay_for(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| OrmError::Database("retry exhausted".to_string())))
    }
}
