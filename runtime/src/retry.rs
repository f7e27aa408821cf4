//! Retry budget for optimistic commits.
//!
//! A commit that loses a version race is not an error the caller can act on; the
//! executor re-runs the transaction after a short, growing pause. [`RetryPolicy`]
//! bounds how many re-runs happen and how long each pause is. [`retry_while`]
//! applies a policy to any fallible async operation.
//!
//! ```rust
//! use conference_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(20))
//!     .max_delay(Duration::from_millis(50))
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(20));
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(40));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(50));
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded exponential backoff.
///
/// Attempt `n` (zero-based) waits `initial_delay * multiplier^n`, never more
/// than `max_delay`. The first try is free; `max_retries` counts re-runs only.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Re-runs allowed after the first try
    pub max_retries: usize,
    /// Pause before the first re-run
    pub initial_delay: Duration,
    /// Upper bound on any single pause
    pub max_delay: Duration,
    /// Growth factor between pauses
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Default re-run budget.
    pub const DEFAULT_MAX_RETRIES: usize = 5;
    /// Default first pause.
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(10);
    /// Default pause cap.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);
    /// Default growth factor.
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;

    /// Start from the defaults.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self {
                max_retries: Self::DEFAULT_MAX_RETRIES,
                initial_delay: Self::DEFAULT_INITIAL_DELAY,
                max_delay: Self::DEFAULT_MAX_DELAY,
                multiplier: Self::DEFAULT_MULTIPLIER,
            },
        }
    }

    /// Fail on the first conflict.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::builder().max_retries(0).build()
    }

    /// Pause before re-run number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        // Overflow, NaN and negative factors all land on the cap.
        Duration::try_from_secs_f64(seconds).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`RetryPolicy`]; unset fields keep their defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Re-runs allowed after the first try.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Pause before the first re-run.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Upper bound on any single pause.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor between pauses.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Finish.
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the policy's budget is spent.
///
/// The error of the final attempt is returned unchanged.
///
/// # Errors
///
/// Whatever `operation` last returned.
pub async fn retry_while<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt == policy.max_retries || !should_retry(&error) {
            return Err(error);
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::debug!(attempt, delay_ms = delay.as_millis(), "Backing off before retry");
        sleep(delay).await;
        attempt += 1;
    }
}
