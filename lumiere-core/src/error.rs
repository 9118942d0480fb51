//! Error types for the Lumière core library.

use thiserror::Error;

use crate::types::NodeId;

/// Top-level error type for core state operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A node was inserted whose `parent_id` is not present in the tree.
    #[error("Orphan node {node}: parent {parent} is not in the tree")]
    OrphanNode {
        /// The id of the rejected node.
        node: NodeId,
        /// The missing parent id it referenced.
        parent: NodeId,
    },

    /// A node with this id is already stored; nodes are never overwritten
    /// by `insert` (god-mode edits go through `direct_edit`).
    #[error("Node already exists: {0}")]
    DuplicateNode(NodeId),

    /// No node with the given id exists in the tree.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// An externally supplied settings document was not recognized.
    #[error("Unrecognized settings document: {0}")]
    ImportFormat(String),

    /// Configuration (TOML) parse failure.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite save-slot store error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored save slot failed its checksum on load.
    #[error("Save slot corrupt: {slot}")]
    Corrupt {
        /// Name of the corrupt slot.
        slot: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CoreError>;
