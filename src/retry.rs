//! Retry policy: exponential backoff with jitter and bounded attempts

use crate::config::InvokerConfig;
use crate::errors::BoxError;

use rand::Rng;
use std::time::Duration;

/// Classifies upstream errors as retryable or not.
///
/// Classification is caller-supplied: a validation error from the remote
/// side is permanent, a connection reset is worth retrying, and only the
/// caller can tell the two apart.
pub trait ErrorClassifier: Send + Sync {
    fn retryable(&self, error: &BoxError) -> bool;
}

/// Default classifier: every upstream error is considered transient.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl ErrorClassifier for AlwaysRetry {
    fn retryable(&self, _error: &BoxError) -> bool {
        true
    }
}

impl<F> ErrorClassifier for F
where
    F: Fn(&BoxError) -> bool + Send + Sync,
{
    fn retryable(&self, error: &BoxError) -> bool {
        self(error)
    }
}

/// Pure retry policy: a function of attempt number, with no shared state.
///
/// The delay before retrying attempt `n` (1-based) is
/// `min(base_delay * multiplier^(n-1), max_delay)` plus uniform jitter in
/// `[0, delay * jitter_factor)`.
///
/// # Examples
///
/// ```
/// use callguard::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0, Duration::from_secs(1), 0.0);
/// assert_eq!(policy.next_delay(1), Duration::from_millis(100));
/// assert_eq!(policy.next_delay(2), Duration::from_millis(200));
/// assert_eq!(policy.next_delay(5), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Build the policy from the invoker configuration.
    pub fn from_config(config: &InvokerConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            config.retry_base_delay,
            config.retry_multiplier,
            config.retry_max_delay,
            config.retry_jitter_factor,
        )
    }

    /// Backoff delay before retrying after failed attempt `attempt` (1-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if !capped.is_finite() || capped < 0.0 {
            return self.max_delay;
        }
        let base = Duration::from_secs_f64(capped);
        base + self.jitter(base)
    }

    /// Whether failed attempt `attempt` (1-based) should be retried.
    ///
    /// `retryable` is the classifier's verdict on the error; a permanent
    /// error is never retried regardless of remaining attempts.
    pub fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt < self.max_attempts
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return Duration::ZERO;
        }
        let bound = delay.as_secs_f64() * self.jitter_factor;
        let jitter = rand::rng().random_range(0.0..bound);
        Duration::from_secs_f64(jitter)
    }
}
