//! Error taxonomy for the fetch gateway.
//!
//! Errors are cloneable so a single in-flight request can fan its
//! outcome out to every coalesced caller.

use thiserror::Error;

/// Errors surfaced by the gateway and its fetch client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Upstream rejected the request with HTTP 429.
    ///
    /// Recovered locally by a single delayed retry; a second 429 is
    /// surfaced to the caller as this terminal error.
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// Upstream returned a non-success status other than 429.
    #[error("upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Network failure or malformed response body.
    #[error("transport error: {0}")]
    Transport(String),

    /// Gateway-internal failure (e.g. a queued request was dropped
    /// before it could complete).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status associated with this error, if any.
    ///
    /// Callers use this to distinguish a rate-limit rejection from a
    /// generic upstream failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited => Some(429),
            ApiError::Upstream { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Internal(_) => None,
        }
    }

    /// Whether this error is a rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited)
    }
}
