//! # lumiere-session — Session Engine for Lumière
//!
//! Ties the pure state machine in [`lumiere_core`] to the provider adapter
//! in [`lumiere_llm`] and exposes the operations a front-end drives:
//! initialize, advance, time travel, god-mode edits, memory override,
//! settings updates, and save import/export.
//!
//! One session owns one playthrough. All story-side state lives behind a
//! single lock inside [`NarrativeSession`]; generation calls snapshot what
//! they need, run without holding the lock, and apply their effects only
//! after the provider answers. A turn that fails anywhere leaves the
//! session exactly as it was.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod session;

pub use error::SessionError;
pub use session::NarrativeSession;
