//! Per-call timeout plus capped exponential backoff with jitter.
//!
//! Every engine call runs under [`RetryPolicy::call`]. A call that exceeds the
//! timeout becomes [`EngineError::Timeout`], which is retryable. Retryable
//! failures sleep `min(max_delay, base_delay · 2^(n-1))`, jittered into
//! `[d/2, d]`, before attempt `n + 1`. After the last attempt the last error
//! is returned unchanged. Permanent failures return immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::EngineError;

/// Retry and timeout settings for engine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Budget for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            timeout: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            timeout,
        }
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Jittered delay in `[backoff/2, backoff]`.
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let full = self.backoff(attempt);
        let half = full / 2;
        let spread = (full - half).as_millis() as u64;
        half + Duration::from_millis(fastrand::u64(0..=spread))
    }

    /// Run `call` under this policy.
    ///
    /// `call` is invoked once per attempt and must build a fresh future each
    /// time.
    pub async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => EngineError::Timeout {
                    operation,
                    after: self.timeout,
                },
            };

            if !error.is_retryable() || attempt >= attempts {
                return Err(error);
            }

            let delay = self.jittered_backoff(attempt);
            tracing::warn!(
                operation,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying engine call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
