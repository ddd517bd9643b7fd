//! Error types for the remote lookup client.
//!
//! The taxonomy is `Clone` so one in-flight call's outcome can be fanned
//! out to every de-duplicated waiter, which rules out carrying source
//! errors like `reqwest::Error` directly; they are rendered to strings at
//! the boundary instead.

use thiserror::Error;

/// Errors surfaced by lookups against the remote service.
///
/// Rate limiting is its own variant rather than a flavor of
/// [`Unavailable`](LookupError::Unavailable): a throttled service is
/// healthy, and the pipeline pauses the queue instead of tripping the
/// circuit breaker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The service answered 429; the queue should pause
    #[error(
        "rate limited by remote service{}",
        .code.as_deref().map(|code| format!(" ({code})")).unwrap_or_default()
    )]
    RateLimited {
        /// Machine-readable reason code from the response body, when present
        code: Option<String>,
    },

    /// Network failure or a non-429 error status
    #[error("remote service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something other than the expected JSON
    #[error("unexpected response from remote service: {0}")]
    Protocol(String),

    /// Token issuance or authorization failure
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The circuit breaker short-circuited the call
    #[error("circuit breaker is open")]
    BreakerOpen,
}

/// Convenience alias for lookup operations.
pub type Result<T> = std::result::Result<T, LookupError>;
