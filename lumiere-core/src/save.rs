//! Whole-snapshot save format.
//!
//! A save is always the entire tree plus the settings — no incremental or
//! append-only variant. Loading a previously exported save and
//! re-serializing it reproduces an equivalent document: `version` and
//! `date` are fixed at creation and survive round trips.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::settings::GameSettings;
use crate::tree::StoryTree;

/// Current save format revision.
pub const SAVE_VERSION: &str = "1.0";

/// The unit of persistence: one full game snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    /// Format revision, fixed at creation.
    pub version: String,
    /// Creation time, fixed at creation (ISO-8601 on the wire).
    pub date: DateTime<Utc>,
    /// The entire story tree.
    pub tree: StoryTree,
    /// The settings active when the save was taken.
    pub settings: GameSettings,
}

impl SaveFile {
    /// Snapshot the given tree and settings, stamped with the current time.
    #[must_use]
    pub fn new(tree: StoryTree, settings: GameSettings) -> Self {
        Self {
            version: SAVE_VERSION.to_string(),
            date: Utc::now(),
            tree,
            settings,
        }
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error (should not happen for well-formed
    /// in-memory state).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a save from JSON. An unknown `version` is accepted with a
    /// warning — the format has a single published revision and the
    /// original loader was equally lenient.
    ///
    /// # Errors
    /// Returns a serialization error for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let save: Self = serde_json::from_str(json)?;
        if save.version != SAVE_VERSION {
            warn!(version = %save.version, "loading save with unknown format version");
        }
        Ok(save)
    }

    /// Write the save to a file.
    ///
    /// # Errors
    /// Returns an I/O or serialization error.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), nodes = self.tree.len(), "save written");
        Ok(())
    }

    /// Read a save from a file.
    ///
    /// # Errors
    /// Returns an I/O or serialization error.
    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
