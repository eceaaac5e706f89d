//! Centralized retry policy for remote platform calls.
//!
//! This is the only place in the crate that sleeps and re-attempts a
//! failed call. Higher layers (correlator, reconciler) treat gateway
//! errors as final — stacking retry loops multiplies the worst-case
//! latency and hammers the platform's rate limits.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::errors::GatewayError;

/// Bounded exponential-ish backoff schedule: a burst of fast attempts
/// for the common "index lags by a second or two" case, then slower
/// attempts up to a hard attempt and wall-clock budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of fast retries after the initial attempt.
    pub fast_attempts: u32,
    pub fast_delay: Duration,
    /// Number of slow retries after the fast ones are exhausted.
    pub slow_attempts: u32,
    pub slow_delay: Duration,
    /// Total wall-clock budget for one logical call, sleeps included.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fast_attempts: 5,
            fast_delay: Duration::from_secs(1),
            slow_attempts: 10,
            slow_delay: Duration::from_secs(2),
            budget: Duration::from_secs(25),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Useful for tests and for callers
    /// that want a single attempt with the same error classification.
    pub fn no_retries() -> Self {
        Self {
            fast_attempts: 0,
            slow_attempts: 0,
            ..Self::default()
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_fast(mut self, attempts: u32, delay: Duration) -> Self {
        self.fast_attempts = attempts;
        self.fast_delay = delay;
        self
    }

    pub fn with_slow(mut self, attempts: u32, delay: Duration) -> Self {
        self.slow_attempts = attempts;
        self.slow_delay = delay;
        self
    }

    /// Delay before retry number `retry` (1-based), or `None` once the
    /// attempt budget is exhausted.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry == 0 {
            return None;
        }
        if retry <= self.fast_attempts {
            Some(self.fast_delay)
        } else if retry <= self.fast_attempts + self.slow_attempts {
            Some(self.slow_delay)
        } else {
            None
        }
    }

    /// Maximum total attempts (initial call plus retries).
    pub fn max_attempts(&self) -> u32 {
        1 + self.fast_attempts + self.slow_attempts
    }
}

/// Run `op` under the policy, retrying transient failures only.
///
/// Permanent errors propagate immediately. Every backoff sleep observes
/// `cancel`; cancellation surfaces as `GatewayError::Cancelled`, distinct
/// from exhausting the budget (which surfaces the last transient error).
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op_name: &str,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let started = tokio::time::Instant::now();
    let mut retry = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => err,
        };

        retry += 1;
        let Some(delay) = policy.delay_for(retry) else {
            tracing::warn!(op = op_name, retries = retry - 1, error = %err, "retry attempts exhausted");
            return Err(err);
        };
        if started.elapsed() + delay > policy.budget {
            tracing::warn!(op = op_name, retries = retry - 1, error = %err, "retry budget exhausted");
            return Err(err);
        }

        tracing::debug!(op = op_name, retry, delay_ms = delay.as_millis() as u64, error = %err, "transient failure, backing off");

        tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
