//! Fixed-capacity sliding window of call outcomes

use std::time::{Duration, Instant};

/// Outcome of a single completed call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    /// When the attempt completed.
    pub at: Instant,

    /// Whether the attempt succeeded.
    pub success: bool,

    /// How long the attempt took.
    pub latency: Duration,
}

impl CallOutcome {
    pub fn new(at: Instant, success: bool, latency: Duration) -> Self {
        Self {
            at,
            success,
            latency,
        }
    }
}

/// Ring buffer of the most recent call outcomes, used to compute failure rate.
///
/// Holds at most `capacity` entries; recording at capacity overwrites the
/// oldest entry. The failure rate is computed over populated entries only.
///
/// # Examples
///
/// ```
/// use callguard::SlidingWindowStats;
/// use std::time::Duration;
///
/// let mut window = SlidingWindowStats::new(4);
/// assert_eq!(window.failure_rate(), 0.0);
///
/// window.record_now(false, Duration::ZERO);
/// window.record_now(true, Duration::ZERO);
/// assert_eq!(window.failure_rate(), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindowStats {
    entries: Vec<CallOutcome>,
    capacity: usize,
    head: usize,
    failures: usize,
}

impl SlidingWindowStats {
    /// Create an empty window holding at most `capacity` outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be at least 1");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            failures: 0,
        }
    }

    /// Append an outcome, overwriting the oldest entry when at capacity. O(1).
    pub fn record(&mut self, outcome: CallOutcome) {
        if self.entries.len() < self.capacity {
            if !outcome.success {
                self.failures += 1;
            }
            self.entries.push(outcome);
        } else {
            let evicted = self.entries[self.head];
            if !evicted.success {
                self.failures -= 1;
            }
            if !outcome.success {
                self.failures += 1;
            }
            self.entries[self.head] = outcome;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Convenience for recording an outcome stamped with [`Instant::now`].
    pub fn record_now(&mut self, success: bool, latency: Duration) {
        self.record(CallOutcome::new(Instant::now(), success, latency));
    }

    /// Failures divided by populated size; `0.0` for an empty window
    /// (an empty window cannot indicate failure).
    pub fn failure_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.failures as f64 / self.entries.len() as f64
        }
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all entries.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.head = 0;
        self.failures = 0;
    }
}
