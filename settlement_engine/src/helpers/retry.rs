//! Bounded retry with exponential backoff.
//!
//! One helper serves the payment adapter, the notification dispatcher and the settlement coordinator's conflict
//! retries. Callers decide which failures are worth another attempt by passing an `is_retryable` predicate; anything
//! else is returned straight away without sleeping.
use std::{fmt::Display, future::Future, time::Duration};

use log::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Always at least one attempt is made.
    pub max_attempts: u32,
    /// The delay before the second attempt. Doubles for each attempt after that.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(200), max_delay: Duration::from_secs(5) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay, ..Default::default() }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// No waiting between attempts. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    /// The delay to wait after `attempt` (1-based) has failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails with an error that `is_retryable` rejects, or `policy.max_attempts` is used up.
///
/// `op` receives the 1-based attempt number. The last error is returned on failure.
pub async fn retry_with_backoff<T, E, F, Fut, P>(policy: &RetryPolicy, label: &str, is_retryable: P, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => {
                if attempt > 1 {
                    debug!("🔁️ {label} succeeded on attempt {attempt}");
                }
                return Ok(v);
            },
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = policy.delay_after(attempt);
                warn!("🔁️ {label} failed on attempt {attempt}/{max_attempts}: {e}. Retrying in {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) => {
                if is_retryable(&e) {
                    warn!("🔁️ {label} failed after {attempt} attempts. Giving up. {e}");
                } else {
                    debug!("🔁️ {label} failed with a permanent error on attempt {attempt}: {e}");
                }
                return Err(e);
            },
        }
    }
}
