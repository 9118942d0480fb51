//! # Lumière Core Library
//!
//! Engine-side state model for an LLM-driven branching visual novel.
//!
//! The core owns everything that must stay consistent between generation
//! calls, and nothing that touches the network:
//!
//! - **Story tree** — every generated [`StoryNode`], parent/child links,
//!   and a movable cursor ([`StoryTree`]). Time travel relocates the
//!   cursor; it never deletes history.
//! - **Memory state** — the provider-authored summary of the story so far
//!   ([`MemoryState`]), replaced wholesale each turn and owned by the
//!   [`MemoryManager`]. The engine is a transparent conduit: no merging,
//!   no trimming.
//! - **Settings** — world premise, narrative mode selectors, and the
//!   provider configurations ([`GameSettings`]), threaded explicitly into
//!   every call rather than held as ambient global state.
//! - **Saves** — whole-snapshot [`SaveFile`] JSON interchange plus an
//!   SQLite slot store ([`SaveStore`]).

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod memory;
pub mod persistence;
pub mod save;
pub mod settings;
pub mod tree;
pub mod types;

pub use error::CoreError;
pub use memory::MemoryManager;
pub use persistence::SaveStore;
pub use save::SaveFile;
pub use settings::{GameSettings, ImageConfig, LlmConfig};
pub use tree::StoryTree;
pub use types::*;
