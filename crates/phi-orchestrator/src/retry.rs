//! Bounded retry with exponential backoff for network and LLM calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Retry policy: `max_retries` additional attempts after the first one, waiting
/// `delay` before the first retry and multiplying it by `backoff` each time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            max_retries,
            delay,
            backoff,
        }
    }

    /// Same policy with a different initial delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `operation`, retrying every failure.
    pub async fn run<F, Fut, T, E>(&self, label: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(label, |_| true, operation).await
    }

    /// Run `operation`, retrying only failures for which `is_retryable` holds.
    ///
    /// Non-retryable failures and the failure of the last attempt are returned
    /// unchanged.
    pub async fn run_if<F, Fut, T, E, P>(
        &self,
        label: &str,
        is_retryable: P,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut delay = self.delay;
        let mut attempt = 0u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) {
                return Err(err);
            }

            if attempt >= self.max_retries {
                error!(
                    operation = label,
                    max_retries = self.max_retries,
                    error = %err,
                    "Max retries exceeded"
                );
                return Err(err);
            }

            attempt += 1;
            warn!(
                operation = label,
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after failure"
            );
            tokio::time::sleep(delay).await;
            delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff).unwrap_or(delay);
        }
    }
}
