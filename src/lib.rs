//! # callguard
//!
//! Resilient remote-call client for Rust: bounded result caching, retry
//! with exponential backoff and jitter, token-bucket rate limiting, and
//! circuit breaking, composed explicitly around a caller-supplied async
//! operation.
//!
//! ## Features
//!
//! - Circuit breaker with a sliding outcome window and half-open trial quota
//! - Retry policy with exponential backoff, jitter, and caller-supplied
//!   error classification
//! - Token-bucket rate limiting with immediate denial (no queuing)
//! - Bounded TTL result cache with LRU eviction
//! - Event hook for state transitions and call outcomes, with provided
//!   tracing and metrics sinks
//! - Injectable time source for deterministic tests
//!
//! All components are safe for use from many concurrent tasks; the only
//! suspension points are the operation itself and the inter-retry backoff.
//!
//! ## Quick Start
//!
//! ```no_run
//! use callguard::{InvokerConfig, ResilientInvoker};
//!
//! # async fn demo() -> Result<(), callguard::CallError> {
//! let invoker: ResilientInvoker<String, String> =
//!     ResilientInvoker::new(InvokerConfig::default());
//!
//! let quote = invoker
//!     .execute("quote:EUR".to_string(), || async {
//!         Ok::<String, callguard::BoxError>("1.0842".to_string())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod circuit_breaker;
mod clock;
mod config;
mod errors;
mod events;
mod invoker;
mod limiter;
mod metrics;
mod retry;
mod window;

pub use cache::ResultCache;
pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitState};
pub use clock::{ManualClock, MonotonicClock, TimeSource};
pub use config::InvokerConfig;
pub use errors::{BoxError, CallError, CallResult};
pub use events::{CallEvent, EventSink, RejectReason, TracingSink};
pub use invoker::ResilientInvoker;
pub use limiter::RateLimiter;
pub use metrics::{InvokerMetrics, MetricsExporter, MetricsSink};
pub use retry::{AlwaysRetry, ErrorClassifier, RetryPolicy};
pub use window::{CallOutcome, SlidingWindowStats};
