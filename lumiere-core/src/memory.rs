//! Memory manager: the single current [`MemoryState`] carried between
//! turns, plus the single-use manual override.
//!
//! Deliberately no merge or diff logic. The model is the authority on
//! derived memory content; every update is whole-state replacement and the
//! engine is a transparent conduit. Growth control (summarizing the context
//! window into `episodeSummary`/`longTermMemory`) is likewise the model's
//! job — no size cap is enforced here.

use tracing::debug;

use crate::settings::GameSettings;
use crate::types::MemoryState;

/// Owns the memory baseline for one narrative session.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    /// Memory seeded from the settings, used until the first turn commits.
    seed: MemoryState,
    /// Memory from the most recent successful generation (or resync).
    committed: Option<MemoryState>,
    /// Manual override for the next turn. Single-use: cleared by a
    /// successful commit, kept across failures so the caller can retry.
    pending_override: Option<MemoryState>,
}

impl MemoryManager {
    /// Build a manager whose seed memory is derived from the settings'
    /// world, character, and plot fields. All other fields start empty or
    /// with their fixed opening values.
    #[must_use]
    pub fn from_settings(settings: &GameSettings) -> Self {
        let seed = MemoryState {
            context_window: "Start of story.".to_string(),
            relationships: "None established.".to_string(),
            core_memory: format!(
                "Background: {}\nCharacters: {}\nKey Points: {}",
                settings.story_background, settings.character_info, settings.key_plot_points
            ),
            ..MemoryState::default()
        };
        Self {
            seed,
            committed: None,
            pending_override: None,
        }
    }

    /// The memory to build the next prompt from: the pending override if
    /// one is set, else the last committed state, else the seed.
    #[must_use]
    pub fn effective(&self) -> &MemoryState {
        self.pending_override
            .as_ref()
            .or(self.committed.as_ref())
            .unwrap_or(&self.seed)
    }

    /// Whether a manual override is pending for the next turn.
    #[must_use]
    pub fn has_override(&self) -> bool {
        self.pending_override.is_some()
    }

    /// Supply a manual override for the next turn only.
    pub fn set_override(&mut self, state: MemoryState) {
        debug!("manual memory override set");
        self.pending_override = Some(state);
    }

    /// Commit the memory produced by a successful generation. Replaces the
    /// baseline wholesale and consumes any pending override. Must not be
    /// called on failure paths — a failed turn leaves the override pending.
    pub fn commit(&mut self, state: MemoryState) {
        self.committed = Some(state);
        self.pending_override = None;
    }

    /// Resync the baseline to a historical node's memory after time travel.
    ///
    /// Sets the same state as both the committed baseline and the pending
    /// override, so the very next advance continues from that point in
    /// history rather than from the most recently generated node.
    pub fn resync(&mut self, state: MemoryState) {
        debug!("memory baseline resynced to historical node");
        self.committed = Some(state.clone());
        self.pending_override = Some(state);
    }
}
