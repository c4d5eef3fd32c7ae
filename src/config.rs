//! Invoker configuration options

use std::time::Duration;

/// Configuration for the resilient invoker and its components.
///
/// All values are fixed at construction; there is no ambient or global
/// registry. Failure rate threshold is a ratio in `0.0..=1.0`.
///
/// # Examples
///
/// ```
/// use callguard::InvokerConfig;
/// use std::time::Duration;
///
/// let config = InvokerConfig::new()
///     .with_failure_rate_threshold(0.5)
///     .with_min_sample_count(4)
///     .with_open_wait(Duration::from_secs(30))
///     .with_retry_max_attempts(5);
///
/// assert_eq!(config.min_sample_count, 4);
/// assert_eq!(config.retry_max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InvokerConfig {
    /// Failure rate (failures / populated window size) at which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Minimum populated window size before the failure rate is acted on.
    pub min_sample_count: usize,

    /// Capacity of the sliding outcome window.
    pub window_size: usize,

    /// How long the circuit stays open before permitting trial calls.
    pub open_wait: Duration,

    /// Number of trial calls permitted in the half-open state.
    pub half_open_trial_calls: u32,

    /// Maximum call attempts per `execute`, including the first.
    pub retry_max_attempts: u32,

    /// Backoff delay before the second attempt.
    pub retry_base_delay: Duration,

    /// Multiplier applied to the delay for each further attempt.
    pub retry_multiplier: f64,

    /// Upper bound on the computed backoff delay, before jitter.
    pub retry_max_delay: Duration,

    /// Jitter added to each delay, as a fraction of the delay (`0.0` disables).
    pub retry_jitter_factor: f64,

    /// Token bucket capacity.
    pub rate_capacity: u32,

    /// Tokens refilled per second.
    pub rate_refill_per_sec: f64,

    /// Maximum number of cached results before LRU eviction.
    pub cache_max_entries: usize,

    /// Time-to-live applied to cached results.
    pub cache_default_ttl: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            min_sample_count: 10,
            window_size: 32,
            open_wait: Duration::from_secs(30),
            half_open_trial_calls: 3,
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            retry_multiplier: 2.0,
            retry_max_delay: Duration::from_secs(10),
            retry_jitter_factor: 0.25,
            rate_capacity: 100,
            rate_refill_per_sec: 50.0,
            cache_max_entries: 1024,
            cache_default_ttl: Duration::from_secs(60),
        }
    }
}

impl InvokerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure rate threshold, clamped to `0.0..=1.0`.
    pub fn with_failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the minimum sample count before the breaker may open.
    pub fn with_min_sample_count(mut self, count: usize) -> Self {
        self.min_sample_count = count;
        self
    }

    /// Set the sliding window capacity.
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Set the open-state wait duration.
    pub fn with_open_wait(mut self, wait: Duration) -> Self {
        self.open_wait = wait;
        self
    }

    /// Set the half-open trial call quota.
    pub fn with_half_open_trial_calls(mut self, calls: u32) -> Self {
        self.half_open_trial_calls = calls;
        self
    }

    /// Set the maximum attempts per call (including the first).
    pub fn with_retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = attempts;
        self
    }

    /// Set the base backoff delay.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_retry_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_multiplier = multiplier;
        self
    }

    /// Set the maximum backoff delay.
    pub fn with_retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = delay;
        self
    }

    /// Set the jitter factor, clamped to `0.0..=1.0`.
    pub fn with_retry_jitter_factor(mut self, factor: f64) -> Self {
        self.retry_jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Set the token bucket capacity.
    pub fn with_rate_capacity(mut self, capacity: u32) -> Self {
        self.rate_capacity = capacity;
        self
    }

    /// Set the token refill rate (tokens per second).
    pub fn with_rate_refill_per_sec(mut self, rate: f64) -> Self {
        self.rate_refill_per_sec = rate;
        self
    }

    /// Set the maximum cached entry count.
    pub fn with_cache_max_entries(mut self, entries: usize) -> Self {
        self.cache_max_entries = entries;
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_default_ttl(mut self, ttl: Duration) -> Self {
        self.cache_default_ttl = ttl;
        self
    }
}
