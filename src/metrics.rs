//! Metrics collection and export for resilient calls

use crate::circuit_breaker::CircuitState;
use crate::events::{CallEvent, EventSink, RejectReason};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot for an invoker.
///
/// # Examples
///
/// ```
/// use callguard::{CallEvent, EventSink, MetricsSink};
/// use std::time::Duration;
///
/// let sink = MetricsSink::new();
/// sink.on_event(&CallEvent::Outcome {
///     success: true,
///     latency: Duration::from_millis(12),
///     attempt: 1,
/// });
///
/// let metrics = sink.snapshot();
/// assert_eq!(metrics.attempts_total, 1);
/// assert_eq!(metrics.successes_total, 1);
/// ```
#[derive(Debug, Clone)]
pub struct InvokerMetrics {
    /// Completed call attempts, including retries.
    pub attempts_total: u64,

    /// Attempts that succeeded.
    pub successes_total: u64,

    /// Attempts that failed.
    pub failures_total: u64,

    /// Attempts beyond the first for a given call.
    pub retries_total: u64,

    /// Calls answered from the result cache.
    pub cache_hits_total: u64,

    /// Calls that missed the cache.
    pub cache_misses_total: u64,

    /// Calls rejected by the rate limiter.
    pub rate_limited_total: u64,

    /// Calls rejected by the circuit breaker.
    pub circuit_rejections_total: u64,

    /// Times the circuit transitioned to open.
    pub circuit_opened_total: u64,
}

impl InvokerMetrics {
    /// Export metrics as a flat string map.
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("attempts_total".to_string(), self.attempts_total.to_string());
        metrics.insert("successes_total".to_string(), self.successes_total.to_string());
        metrics.insert("failures_total".to_string(), self.failures_total.to_string());
        metrics.insert("retries_total".to_string(), self.retries_total.to_string());
        metrics.insert("cache_hits_total".to_string(), self.cache_hits_total.to_string());
        metrics.insert(
            "cache_misses_total".to_string(),
            self.cache_misses_total.to_string(),
        );
        metrics.insert(
            "rate_limited_total".to_string(),
            self.rate_limited_total.to_string(),
        );
        metrics.insert(
            "circuit_rejections_total".to_string(),
            self.circuit_rejections_total.to_string(),
        );
        metrics.insert(
            "circuit_opened_total".to_string(),
            self.circuit_opened_total.to_string(),
        );
        metrics
    }
}

/// Metrics exporter for Prometheus exposition format.
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format.
    pub fn export_prometheus(
        metrics: &InvokerMetrics,
        target_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(target_name, tags);
        let mut output = String::new();
        let mut counter = |name: &str, help: &str, value: u64| {
            output.push_str(&format!("# HELP callguard_{name} {help}\n"));
            output.push_str(&format!("# TYPE callguard_{name} counter\n"));
            output.push_str(&format!("callguard_{name}{{{labels}}} {value}\n"));
        };

        counter("attempts_total", "Completed call attempts", metrics.attempts_total);
        counter("successes_total", "Successful attempts", metrics.successes_total);
        counter("failures_total", "Failed attempts", metrics.failures_total);
        counter("retries_total", "Retry attempts", metrics.retries_total);
        counter("cache_hits_total", "Calls served from cache", metrics.cache_hits_total);
        counter("cache_misses_total", "Cache misses", metrics.cache_misses_total);
        counter(
            "rate_limited_total",
            "Calls rejected by the rate limiter",
            metrics.rate_limited_total,
        );
        counter(
            "circuit_rejections_total",
            "Calls rejected by the circuit breaker",
            metrics.circuit_rejections_total,
        );
        counter(
            "circuit_opened_total",
            "Circuit breaker open transitions",
            metrics.circuit_opened_total,
        );

        output
    }

    fn format_labels(target_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("target=\"{}\"", target_name)];
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }
        labels.join(",")
    }
}

/// Event sink that aggregates call events into atomic counters.
#[derive(Debug, Default)]
pub struct MetricsSink {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rate_limited: AtomicU64,
    circuit_rejections: AtomicU64,
    circuit_opened: AtomicU64,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a consistent-enough snapshot of the counters.
    pub fn snapshot(&self) -> InvokerMetrics {
        InvokerMetrics {
            attempts_total: self.attempts.load(Ordering::Relaxed),
            successes_total: self.successes.load(Ordering::Relaxed),
            failures_total: self.failures.load(Ordering::Relaxed),
            retries_total: self.retries.load(Ordering::Relaxed),
            cache_hits_total: self.cache_hits.load(Ordering::Relaxed),
            cache_misses_total: self.cache_misses.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited.load(Ordering::Relaxed),
            circuit_rejections_total: self.circuit_rejections.load(Ordering::Relaxed),
            circuit_opened_total: self.circuit_opened.load(Ordering::Relaxed),
        }
    }
}

impl EventSink for MetricsSink {
    fn on_event(&self, event: &CallEvent) {
        match event {
            CallEvent::Outcome {
                success, attempt, ..
            } => {
                self.attempts.fetch_add(1, Ordering::Relaxed);
                if *success {
                    self.successes.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                }
                if *attempt > 1 {
                    self.retries.fetch_add(1, Ordering::Relaxed);
                }
            }
            CallEvent::Rejected { reason } => match reason {
                RejectReason::RateLimited => {
                    self.rate_limited.fetch_add(1, Ordering::Relaxed);
                }
                RejectReason::CircuitOpen => {
                    self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
                }
            },
            CallEvent::CacheHit => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            CallEvent::CacheMiss => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
            }
            CallEvent::StateChanged { to, .. } => {
                if *to == CircuitState::Open {
                    self.circuit_opened.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
