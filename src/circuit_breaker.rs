//! Circuit breaker state machine gating calls on recent failure rate

use crate::clock::TimeSource;
use crate::config::InvokerConfig;
use crate::events::{CallEvent, EventSink};
use crate::window::{CallOutcome, SlidingWindowStats};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation: calls pass through, outcomes are recorded.
    Closed,

    /// Tripped: all calls fail fast without invoking the operation.
    Open,

    /// Probing recovery: a bounded quota of trial calls passes through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Snapshot of breaker internals for diagnostics.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub sample_count: usize,
    pub failure_rate: f64,
    /// How long the circuit has been open, if it is open.
    pub open_for: Option<Duration>,
    /// Trial permits still available in the half-open state.
    pub trial_permits_left: u32,
}

struct BreakerInner {
    state: CircuitState,
    window: SlidingWindowStats,
    opened_at: Option<Instant>,
    trial_permits: u32,
    trial_successes: u32,
}

/// Circuit breaker gating calls based on the failure rate over a sliding
/// outcome window.
///
/// All state lives behind a single mutex so the open-to-half-open
/// transition and the half-open quota decrement are atomic with respect
/// to concurrent callers: no two callers can claim the same trial slot.
///
/// The breaker itself never logs; transitions are reported through the
/// optional [`EventSink`].
///
/// # Examples
///
/// ```
/// use callguard::{CircuitBreaker, CircuitState, InvokerConfig, MonotonicClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = InvokerConfig::new()
///     .with_failure_rate_threshold(0.5)
///     .with_min_sample_count(4);
/// let breaker = CircuitBreaker::new(&config, Arc::new(MonotonicClock));
///
/// assert_eq!(breaker.state(), CircuitState::Closed);
/// assert!(breaker.allow());
/// breaker.on_result(true, Duration::from_millis(10));
/// ```
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_rate_threshold: f64,
    min_sample_count: usize,
    open_wait: Duration,
    half_open_trial_calls: u32,
    clock: Arc<dyn TimeSource>,
    sink: Option<Arc<dyn EventSink>>,
}

impl CircuitBreaker {
    /// Create a breaker from the invoker configuration.
    pub fn new(config: &InvokerConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: SlidingWindowStats::new(config.window_size),
                opened_at: None,
                trial_permits: 0,
                trial_successes: 0,
            }),
            failure_rate_threshold: config.failure_rate_threshold,
            min_sample_count: config.min_sample_count,
            open_wait: config.open_wait,
            half_open_trial_calls: config.half_open_trial_calls,
            clock,
            sink: None,
        }
    }

    /// Install an event sink for state transitions.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.set_sink(sink);
        self
    }

    pub(crate) fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = Some(sink);
    }

    /// Get the current state.
    ///
    /// Reports the stored state; the time-based open-to-half-open
    /// transition happens in [`allow`](Self::allow), where it can be
    /// evaluated atomically with the trial quota.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Decide whether a call may pass through.
    ///
    /// In the half-open state this atomically consumes one trial permit;
    /// callers beyond the quota are rejected as if the circuit were open.
    pub fn allow(&self) -> bool {
        let mut transition = None;
        let allowed = {
            let mut inner = self.inner.lock();
            match inner.state {
                CircuitState::Closed => true,
                CircuitState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map(|at| self.clock.now().saturating_duration_since(at))
                        .unwrap_or(Duration::ZERO);
                    if elapsed >= self.open_wait {
                        inner.state = CircuitState::HalfOpen;
                        inner.window.reset();
                        inner.trial_permits = self.half_open_trial_calls;
                        inner.trial_successes = 0;
                        transition = Some((CircuitState::Open, CircuitState::HalfOpen));
                        Self::take_trial_permit(&mut inner)
                    } else {
                        false
                    }
                }
                CircuitState::HalfOpen => Self::take_trial_permit(&mut inner),
            }
        };
        if let Some((from, to)) = transition {
            self.emit_transition(from, to);
        }
        allowed
    }

    /// Record the outcome of a completed call attempt.
    pub fn on_result(&self, success: bool, latency: Duration) {
        let mut transition = None;
        {
            let mut inner = self.inner.lock();
            let outcome = CallOutcome::new(self.clock.now(), success, latency);
            match inner.state {
                CircuitState::Closed => {
                    inner.window.record(outcome);
                    if inner.window.len() >= self.min_sample_count
                        && inner.window.failure_rate() >= self.failure_rate_threshold
                    {
                        self.open_locked(&mut inner);
                        transition = Some((CircuitState::Closed, CircuitState::Open));
                    }
                }
                CircuitState::HalfOpen => {
                    inner.window.record(outcome);
                    if success {
                        inner.trial_successes += 1;
                        if inner.trial_successes >= self.half_open_trial_calls {
                            self.close_locked(&mut inner);
                            transition = Some((CircuitState::HalfOpen, CircuitState::Closed));
                        }
                    } else {
                        // One failed trial is enough to re-open.
                        self.open_locked(&mut inner);
                        transition = Some((CircuitState::HalfOpen, CircuitState::Open));
                    }
                }
                // Late result from a trial that lost the race; the window
                // was already judged, so the outcome is discarded.
                CircuitState::Open => {}
            }
        }
        if let Some((from, to)) = transition {
            self.emit_transition(from, to);
        }
    }

    /// Manually force the circuit open, rejecting all calls.
    pub fn force_open(&self) {
        let from = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            self.open_locked(&mut inner);
            from
        };
        if from != CircuitState::Open {
            self.emit_transition(from, CircuitState::Open);
        }
    }

    /// Manually force the circuit closed, allowing all calls.
    pub fn force_close(&self) {
        let from = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            self.close_locked(&mut inner);
            from
        };
        if from != CircuitState::Closed {
            self.emit_transition(from, CircuitState::Closed);
        }
    }

    /// Reset to the initial closed state, clearing all recorded outcomes.
    pub fn reset(&self) {
        self.force_close();
    }

    /// Snapshot of the breaker internals.
    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        BreakerStats {
            state: inner.state,
            sample_count: inner.window.len(),
            failure_rate: inner.window.failure_rate(),
            open_for: inner
                .opened_at
                .filter(|_| inner.state == CircuitState::Open)
                .map(|at| self.clock.now().saturating_duration_since(at)),
            trial_permits_left: inner.trial_permits,
        }
    }

    fn take_trial_permit(inner: &mut BreakerInner) -> bool {
        if inner.trial_permits > 0 {
            inner.trial_permits -= 1;
            true
        } else {
            false
        }
    }

    fn open_locked(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(self.clock.now());
        inner.trial_permits = 0;
        inner.trial_successes = 0;
    }

    fn close_locked(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.trial_permits = 0;
        inner.trial_successes = 0;
        inner.window.reset();
    }

    fn emit_transition(&self, from: CircuitState, to: CircuitState) {
        if let Some(ref sink) = self.sink {
            sink.on_event(&CallEvent::StateChanged { from, to });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(clock: Arc<ManualClock>) -> CircuitBreaker {
        let config = InvokerConfig::new()
            .with_failure_rate_threshold(0.5)
            .with_min_sample_count(4)
            .with_window_size(10)
            .with_open_wait(Duration::from_secs(30))
            .with_half_open_trial_calls(3);
        CircuitBreaker::new(&config, clock)
    }

    fn latency() -> Duration {
        Duration::from_millis(5)
    }

    #[test]
    fn starts_closed_and_allows_calls() {
        let breaker = breaker(Arc::new(ManualClock::new()));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn opens_when_failure_rate_meets_threshold_with_enough_samples() {
        let breaker = breaker(Arc::new(ManualClock::new()));

        // F, F, F, S: rate 0.75 >= 0.5 with 4 >= min_sample_count samples.
        breaker.on_result(false, latency());
        breaker.on_result(false, latency());
        breaker.on_result(false, latency());
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.on_result(true, latency());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn stays_closed_below_min_sample_count() {
        let breaker = breaker(Arc::new(ManualClock::new()));

        breaker.on_result(false, latency());
        breaker.on_result(false, latency());
        breaker.on_result(false, latency());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn open_rejects_until_wait_elapses_then_permits_trial_quota() {
        let clock = Arc::new(ManualClock::new());
        let breaker = breaker(clock.clone());
        for _ in 0..4 {
            breaker.on_result(false, latency());
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(29));
        assert!(!breaker.allow());

        clock.advance(Duration::from_secs(1));
        // Exactly three trial calls pass, further ones fail fast.
        assert!(breaker.allow());
        assert!(breaker.allow());
        assert!(breaker.allow());
        assert!(!breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn single_failed_trial_reopens_and_resets_opened_at() {
        let clock = Arc::new(ManualClock::new());
        let breaker = breaker(clock.clone());
        for _ in 0..4 {
            breaker.on_result(false, latency());
        }

        clock.advance(Duration::from_secs(30));
        assert!(breaker.allow());
        breaker.on_result(false, latency());
        assert_eq!(breaker.state(), CircuitState::Open);

        // opened_at was reset: the original wait does not count.
        clock.advance(Duration::from_secs(29));
        assert!(!breaker.allow());
        clock.advance(Duration::from_secs(1));
        assert!(breaker.allow());
    }

    #[test]
    fn all_trials_succeeding_closes_and_resets_stats() {
        let clock = Arc::new(ManualClock::new());
        let breaker = breaker(clock.clone());
        for _ in 0..4 {
            breaker.on_result(false, latency());
        }

        clock.advance(Duration::from_secs(30));
        for _ in 0..3 {
            assert!(breaker.allow());
            breaker.on_result(true, latency());
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        let stats = breaker.stats();
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.failure_rate, 0.0);
        assert!(breaker.allow());
    }

    #[test]
    fn late_results_while_open_are_discarded() {
        let breaker = breaker(Arc::new(ManualClock::new()));
        for _ in 0..4 {
            breaker.on_result(false, latency());
        }
        let samples_when_opened = breaker.stats().sample_count;

        breaker.on_result(true, latency());
        breaker.on_result(false, latency());
        assert_eq!(breaker.stats().sample_count, samples_when_opened);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn trial_quota_is_not_overrun_by_concurrent_callers() {
        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(breaker(clock.clone()));
        for _ in 0..4 {
            breaker.on_result(false, latency());
        }
        clock.advance(Duration::from_secs(30));

        let admitted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let breaker = breaker.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    if breaker.allow() {
                        admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn force_open_and_force_close() {
        let breaker = breaker(Arc::new(ManualClock::new()));

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());

        breaker.force_close();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn transitions_reach_the_sink() {
        use parking_lot::Mutex as PlMutex;

        struct Recorder(PlMutex<Vec<CallEvent>>);
        impl EventSink for Recorder {
            fn on_event(&self, event: &CallEvent) {
                self.0.lock().push(*event);
            }
        }

        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(Recorder(PlMutex::new(Vec::new())));
        let config = InvokerConfig::new()
            .with_failure_rate_threshold(0.5)
            .with_min_sample_count(2)
            .with_window_size(10)
            .with_open_wait(Duration::from_secs(1))
            .with_half_open_trial_calls(1);
        let breaker = CircuitBreaker::new(&config, clock.clone()).with_sink(sink.clone());

        breaker.on_result(false, latency());
        breaker.on_result(false, latency());
        clock.advance(Duration::from_secs(1));
        assert!(breaker.allow());
        breaker.on_result(true, latency());

        let events = sink.0.lock();
        assert_eq!(
            *events,
            vec![
                CallEvent::StateChanged {
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                },
                CallEvent::StateChanged {
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                },
                CallEvent::StateChanged {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                },
            ]
        );
    }
}
