//! Orchestration of cache, rate limiter, circuit breaker, and retry

use crate::cache::ResultCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::clock::{MonotonicClock, TimeSource};
use crate::config::InvokerConfig;
use crate::errors::{BoxError, CallError, CallResult};
use crate::events::{CallEvent, EventSink, RejectReason};
use crate::limiter::RateLimiter;
use crate::retry::{AlwaysRetry, ErrorClassifier, RetryPolicy};

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Resilient wrapper around a remote call.
///
/// `execute` composes the components in a fixed order: result cache, rate
/// limiter, circuit breaker, then the retry loop around the operation
/// itself. Component checks are fast in-memory operations; only the
/// inter-retry backoff and the operation future suspend. Abandoning a call
/// mid-backoff drops the future without recording a spurious outcome, since
/// every outcome is recorded before the backoff sleep begins.
///
/// # Examples
///
/// ```no_run
/// use callguard::{InvokerConfig, ResilientInvoker};
///
/// # async fn demo() -> Result<(), callguard::CallError> {
/// let invoker: ResilientInvoker<String, u64> = ResilientInvoker::new(InvokerConfig::default());
///
/// let balance = invoker
///     .execute("account:42".to_string(), || async {
///         // ... remote call goes here ...
///         Ok::<u64, callguard::BoxError>(1337)
///     })
///     .await?;
/// assert_eq!(balance, 1337);
/// # Ok(())
/// # }
/// ```
pub struct ResilientInvoker<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: ResultCache<K, V>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    classifier: Arc<dyn ErrorClassifier>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Arc<dyn TimeSource>,
}

impl<K, V> ResilientInvoker<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an invoker with the production clock.
    pub fn new(config: InvokerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    /// Create an invoker reading time from `clock`.
    pub fn with_clock(config: InvokerConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            cache: ResultCache::new(
                config.cache_max_entries,
                config.cache_default_ttl,
                clock.clone(),
            ),
            limiter: RateLimiter::new(
                config.rate_capacity,
                config.rate_refill_per_sec,
                clock.clone(),
            ),
            breaker: CircuitBreaker::new(&config, clock.clone()),
            retry: RetryPolicy::from_config(&config),
            classifier: Arc::new(AlwaysRetry),
            sink: None,
            clock,
        }
    }

    /// Install the caller-supplied error classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Install an event sink, invoked on every call outcome and state
    /// transition.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.breaker.set_sink(sink.clone());
        self.sink = Some(sink);
        self
    }

    /// Execute `operation` under the full resilience stack.
    ///
    /// Rejections by the cache, rate limiter, or circuit breaker
    /// short-circuit without invoking the operation and are surfaced
    /// directly. Operation failures are retried per policy; only the final
    /// failure is returned.
    pub async fn execute<F, Fut>(&self, key: K, operation: F) -> CallResult<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, BoxError>>,
    {
        if let Some(value) = self.cache.get(&key) {
            self.emit(CallEvent::CacheHit);
            return Ok(value);
        }
        self.emit(CallEvent::CacheMiss);

        if !self.limiter.try_acquire() {
            self.emit(CallEvent::Rejected {
                reason: RejectReason::RateLimited,
            });
            return Err(CallError::RateLimited);
        }

        // Breaker admission is consumed once per call, not per attempt.
        if !self.breaker.allow() {
            self.emit(CallEvent::Rejected {
                reason: RejectReason::CircuitOpen,
            });
            return Err(CallError::CircuitOpen);
        }

        let mut attempt: u32 = 1;
        loop {
            let started = self.clock.now();
            let result = operation().await;
            let latency = self.clock.now().saturating_duration_since(started);

            match result {
                Ok(value) => {
                    self.breaker.on_result(true, latency);
                    self.emit(CallEvent::Outcome {
                        success: true,
                        latency,
                        attempt,
                    });
                    self.cache.put(key, value.clone());
                    return Ok(value);
                }
                Err(error) => {
                    self.breaker.on_result(false, latency);
                    self.emit(CallEvent::Outcome {
                        success: false,
                        latency,
                        attempt,
                    });

                    let retryable = self.classifier.retryable(&error);
                    if self.retry.should_retry(attempt, retryable) {
                        tokio::time::sleep(self.retry.next_delay(attempt)).await;
                        attempt += 1;
                    } else if attempt >= self.retry.max_attempts {
                        return Err(CallError::RetryExhausted {
                            attempts: attempt,
                            source: error,
                        });
                    } else {
                        return Err(CallError::Upstream(error));
                    }
                }
            }
        }
    }

    /// Drop any cached result for `key`.
    pub fn invalidate(&self, key: &K) {
        self.cache.invalidate(key);
    }

    /// The circuit breaker, for state inspection.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The result cache.
    pub fn cache(&self) -> &ResultCache<K, V> {
        &self.cache
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn emit(&self, event: CallEvent) {
        if let Some(ref sink) = self.sink {
            sink.on_event(&event);
        }
    }
}
