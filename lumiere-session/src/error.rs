//! Session error types.

use thiserror::Error;

use lumiere_core::CoreError;
use lumiere_llm::GenerationError;

/// Errors from driving a narrative session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A generation turn is already in flight. The session accepts one
    /// generation at a time, so overlapping `initialize`/`advance` calls
    /// are rejected instead of queued. Non-generating operations (time
    /// travel, god-mode edits, settings changes) stay available.
    #[error("a generation turn is already in progress")]
    AlreadyInProgress,

    /// The session has no story yet; call `initialize` first.
    #[error("session is not initialized")]
    NotInitialized,

    /// `initialize` was called on a session that already has a story.
    #[error("session is already initialized")]
    AlreadyInitialized,

    /// The provider call failed or returned an unusable node.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Story-state or persistence failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience alias used throughout the session crate.
pub type Result<T> = std::result::Result<T, SessionError>;
