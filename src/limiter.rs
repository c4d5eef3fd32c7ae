//! Token bucket rate limiter

use crate::clock::TimeSource;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket admission control.
///
/// Tokens refill continuously at `refill_per_sec`, never exceeding
/// `capacity`. Each admitted call consumes one token; when no token is
/// available the call is denied immediately, with no queuing. The
/// refill-then-decrement step is a single critical section, so the
/// invariant `0 <= tokens <= capacity` holds under concurrent callers.
///
/// # Examples
///
/// ```
/// use callguard::{MonotonicClock, RateLimiter};
/// use std::sync::Arc;
///
/// let limiter = RateLimiter::new(5, 1.0, Arc::new(MonotonicClock));
/// assert!(limiter.try_acquire());
/// ```
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
    clock: Arc<dyn TimeSource>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    pub fn new(capacity: u32, refill_per_sec: f64, clock: Arc<dyn TimeSource>) -> Self {
        let now = clock.now();
        Self {
            capacity: f64::from(capacity),
            refill_per_sec: refill_per_sec.max(0.0),
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: now,
            }),
            clock,
        }
    }

    /// Take one token if available. Non-blocking; denial is immediate.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refill. Diagnostic snapshot only.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}
