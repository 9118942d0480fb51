//! # lumiere-llm — Provider Adapter for Lumière
//!
//! The only crate that touches the network. It turns an abstract
//! "generate the next story node" request into a concrete call against one
//! of the interchangeable text backends, and forces the response into the
//! strict [`StoryNode`](lumiere_core::StoryNode) shape:
//!
//! - **Gemini native** — structured output, the JSON schema is enforced
//!   server-side.
//! - **OpenAI-compatible** — generic chat completion (GPT-4o, DeepSeek,
//!   proxies); the schema is carried in the prompt and the raw text is
//!   parsed and validated client-side.
//!
//! Narrative errors propagate (transport vs. parse/schema are distinct
//! classes, no retries, no silent recovery). Image resolution is the
//! opposite: it never fails observably — the generative modes fall back to
//! the deterministic zero-config URL on any trouble.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod image;
pub mod prompt;
pub mod schema;
pub mod validate;

pub use client::{GenerationClient, StoryBackend};
pub use error::GenerationError;
pub use image::ImageClient;
