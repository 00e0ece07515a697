//! Unified error types for the engine core.

use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while decoding an inbound payload into an event.
///
/// Decode failures are logged and dropped before dispatch; they never
/// propagate as dispatch errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or has the wrong shape.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The `post_type` tag is missing or unrecognized.
    #[error("unknown post_type: {0:?}")]
    UnknownPostType(String),
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors surfaced by an [`ApiCaller`](crate::integration::caller::ApiCaller).
///
/// The engine never retries a failed call; reconnect and retry policy belong
/// to the transport collaborator.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The transport connection is closed.
    #[error("transport not connected")]
    NotConnected,

    /// The call did not receive a response within the caller's timeout.
    #[error("API call timed out")]
    Timeout,

    /// An echo/correlation token was unknown or reused by the transport.
    #[error("unknown or reused correlation token: {echo}")]
    EchoConflict {
        /// The offending token value.
        echo: u64,
    },

    /// Request serialization failed.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Any other transport-reported failure.
    #[error("API call failed: {0}")]
    Other(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

// =============================================================================
// State Errors
// =============================================================================

/// Error returned by [`State::parse`](super::state::State::parse) when the
/// stored values do not fit the requested target shape.
#[derive(Debug, Error)]
#[error("state extraction failed: {0}")]
pub struct StateError(#[from] serde_json::Error);

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for payload decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;
