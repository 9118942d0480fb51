//! Generation error types.

use thiserror::Error;

/// Errors from the narrative generation boundary.
///
/// `Transport` and `Timeout` cover failing to reach the provider;
/// `Parse` and `Schema` cover a reachable provider returning content that
/// does not satisfy the response contract. The session treats both classes
/// the same way (abort the turn, leave state untouched), but callers and
/// logs want to know which side misbehaved.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Network/HTTP failure reaching the provider (includes non-2xx).
    #[error("provider transport failure{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
        /// Short failure description or response body excerpt.
        message: String,
    },

    /// The request timed out.
    #[error("provider request timed out after {0}ms")]
    Timeout(u64),

    /// The provider returned content that is not valid JSON, or JSON
    /// missing a required field.
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// The response parsed but violates the node contract (wrong choice
    /// count, blank display text).
    #[error("provider response violates the story schema: {0}")]
    Schema(String),

    /// Provider configuration error.
    #[error("provider configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout(0)
        } else {
            GenerationError::Transport {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}
