//! Observability hook: call and state-transition events

use crate::circuit_breaker::CircuitState;
use std::time::Duration;

/// Why a call was rejected before the operation was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The circuit breaker refused admission.
    CircuitOpen,

    /// The rate limiter had no token available.
    RateLimited,
}

/// Event emitted on every call outcome and state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// The circuit breaker changed state.
    StateChanged {
        from: CircuitState,
        to: CircuitState,
    },

    /// A call attempt completed.
    Outcome {
        success: bool,
        latency: Duration,
        attempt: u32,
    },

    /// A call was rejected without invoking the operation.
    Rejected { reason: RejectReason },

    /// The result cache answered the call.
    CacheHit,

    /// The key was absent or expired.
    CacheMiss,
}

/// Sink for [`CallEvent`]s, installed at construction.
///
/// Implementations must be cheap and non-blocking; events are dispatched
/// inline on the calling task.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &CallEvent);
}

/// Sink that forwards events to the `tracing` ecosystem.
///
/// State transitions are logged at `warn` (opening) or `info` (recovery),
/// everything else at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &CallEvent) {
        match event {
            CallEvent::StateChanged { from, to } => match to {
                CircuitState::Open => {
                    tracing::warn!(%from, %to, "circuit breaker opened");
                }
                _ => {
                    tracing::info!(%from, %to, "circuit breaker state changed");
                }
            },
            CallEvent::Outcome {
                success,
                latency,
                attempt,
            } => {
                tracing::debug!(success, ?latency, attempt, "call attempt completed");
            }
            CallEvent::Rejected { reason } => {
                tracing::debug!(?reason, "call rejected");
            }
            CallEvent::CacheHit => tracing::debug!("result served from cache"),
            CallEvent::CacheMiss => tracing::debug!("cache miss"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Sink that records every event it sees, for assertions.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<CallEvent>>,
    }

    impl EventSink for RecordingSink {
        fn on_event(&self, event: &CallEvent) {
            self.events.lock().push(*event);
        }
    }

    #[test]
    fn events_reach_the_sink_in_order() {
        let sink = Arc::new(RecordingSink::default());

        sink.on_event(&CallEvent::CacheMiss);
        sink.on_event(&CallEvent::StateChanged {
            from: CircuitState::Closed,
            to: CircuitState::Open,
        });
        sink.on_event(&CallEvent::Rejected {
            reason: RejectReason::CircuitOpen,
        });

        let events = sink.events.lock();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], CallEvent::CacheMiss);
        assert!(matches!(events[2], CallEvent::Rejected { .. }));
    }
}
