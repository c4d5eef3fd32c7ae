//! Error types for resilient calls

use thiserror::Error;

/// Boxed error type used as the currency for upstream operation failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CallError {
    #[error("upstream call failed")]
    Upstream(#[source] BoxError),

    #[error("circuit breaker is open - failing fast")]
    CircuitOpen,

    #[error("rate limit exceeded - no token available")]
    RateLimited,

    #[error("retries exhausted after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("result cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl CallError {
    /// Returns `true` if the call was rejected without invoking the operation.
    pub fn is_rejection(&self) -> bool {
        matches!(self, CallError::CircuitOpen | CallError::RateLimited)
    }

    /// Returns the underlying upstream error, if this error carries one.
    pub fn upstream(&self) -> Option<&BoxError> {
        match self {
            CallError::Upstream(e) => Some(e),
            CallError::RetryExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type CallResult<T> = Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_classified() {
        assert!(CallError::CircuitOpen.is_rejection());
        assert!(CallError::RateLimited.is_rejection());
        assert!(!CallError::Upstream("boom".into()).is_rejection());
    }

    #[test]
    fn exhaustion_exposes_last_upstream_error() {
        let err = CallError::RetryExhausted {
            attempts: 3,
            source: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "retries exhausted after 3 attempts");
        assert_eq!(err.upstream().unwrap().to_string(), "connection reset");
    }
}
