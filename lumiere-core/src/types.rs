//! Core type definitions for the Lumière narrative engine.
//!
//! Field names and enum spellings follow the provider wire contract: the
//! structured-output schema asks the model for exactly these keys, and the
//! save format reuses them unchanged.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Unique identifier for a story node.
///
/// Ids normally arrive from the model (the schema requests a UUID string),
/// but the engine fills in a locally generated one when the model leaves it
/// blank, so this is a string newtype rather than a parsed [`Uuid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generate a fresh locally unique id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Whether the id is blank (model failed to supply one).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Memory State
// ---------------------------------------------------------------------------

/// The provider-authored summary of the story so far.
///
/// Replaces a full conversation transcript: every turn carries exactly this
/// blob (plus the fixed settings), which bounds prompt size regardless of
/// tree depth. Fields are ordered from most volatile to most persistent.
///
/// Every field is required on the wire — downstream consumers index all of
/// them unconditionally — so [`Default`] supplies empties rather than any
/// field ever being absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Immediate scene context (short term).
    pub context_window: String,
    /// Summary of the current plot arc.
    pub episode_summary: String,
    /// Archived important past events.
    pub long_term_memory: String,
    /// Immutable facts about the world and characters.
    pub core_memory: String,
    /// Items held. Order is display order, duplicates allowed.
    pub inventory: Vec<String>,
    /// Free-text relationship status.
    pub relationships: String,
    /// Director-authored future plot beats. The model is asked to weave
    /// each one in and then retire it from this list — a cooperative,
    /// best-effort contract the engine does not enforce.
    pub scheduled_events: Vec<String>,
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

/// Per-scene snapshot of a major character's state.
///
/// Node rosters are not cumulative: each node carries only the characters
/// present in that scene, and a consumer wanting a full cast must merge
/// across history. Identity is by `id` when present, else by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    /// Stable identifier across scenes.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Jungian archetype (e.g. The Shadow, The Mentor).
    pub archetype: String,
    /// Affection/trust score, 0–100. Clamped during response validation.
    pub affection: f32,
    /// Visual description used for portrait generation.
    pub description: String,
    /// Stable seed so the character's portrait stays consistent.
    pub avatar_seed: String,
}

// ---------------------------------------------------------------------------
// Choices
// ---------------------------------------------------------------------------

/// One branch offered from a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryChoice {
    /// Choice identifier.
    pub id: String,
    /// Player-facing label (Simplified Chinese).
    pub text_cn: String,
    /// Hidden continuity hint consumed only by the next prompt.
    pub logic_hint: String,
}

// ---------------------------------------------------------------------------
// Cinematic directive enums
// ---------------------------------------------------------------------------

/// Camera direction for the scene, chosen by the model per emotional beat.
///
/// Unknown spellings from a sloppy provider fall back to `Static`: camera
/// work is presentation, never worth failing a whole node over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraMovement {
    /// Slow push-in (tension).
    ZoomIn,
    /// Pull back (reveal).
    ZoomOut,
    /// Lateral pan right.
    PanRight,
    /// Lateral pan left.
    PanLeft,
    /// Tilted horizon (unease).
    DutchAngle,
    /// Camera shake (shock).
    Shake,
    /// No movement. Kept last: the unknown-value fallback must sit on the
    /// final variant.
    #[default]
    #[serde(other)]
    Static,
}

/// Environmental / emotional overlay effect.
///
/// Same fallback rule as [`CameraMovement`]: unknown values become `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualEffect {
    /// Rain particles.
    Rain,
    /// Snowfall.
    Snow,
    /// Rolling fog.
    Fog,
    /// Digital glitch.
    Glitch,
    /// White flash.
    Flash,
    /// Vignette darkness.
    Darkness,
    /// Soft green glow.
    Healing,
    /// Lightning strikes.
    Thunder,
    /// Drifting embers.
    Embers,
    /// No overlay. Kept last: the unknown-value fallback must sit on the
    /// final variant.
    #[default]
    #[serde(other)]
    None,
}

/// Source language of the raw script layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptLanguage {
    /// Western flavor settings script in French.
    French,
    /// Eastern flavor settings script in Japanese.
    Japanese,
}

// ---------------------------------------------------------------------------
// Story Node
// ---------------------------------------------------------------------------

/// One generated narrative turn: text, cinematic directives, the resulting
/// memory state, and the branches offered next.
///
/// Created exactly once by a successful generation call and never deleted.
/// The single deliberate breach of immutability is the god-mode
/// [`StoryTree::direct_edit`](crate::tree::StoryTree::direct_edit), which
/// rewrites a node in place rather than branching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryNode {
    /// Unique id, model-supplied or locally generated.
    pub id: NodeId,
    /// Creation time in Unix milliseconds; stamped by the engine, not the
    /// model, so it is absent from provider responses.
    #[serde(default)]
    pub timestamp: i64,
    /// Link to the previous node. `None` only for the root.
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    /// Free-text English prompt for the backdrop image generator.
    pub background_keyword: String,
    /// Cinematic camera direction.
    pub camera_movement: CameraMovement,
    /// Particle / overlay effect.
    pub visual_effect: VisualEffect,
    /// Emoji or short phrase describing the speaking character's emotion.
    pub character_emotion: String,

    /// Private model reasoning (French). Never shown to the player.
    pub reasoning_fr: String,
    /// Chinese translation of the reasoning, for human debugging only.
    pub reasoning_cn_translation: String,
    /// Raw dialogue/narration in `script_language`.
    pub original_script: String,
    /// Which of the two script languages the raw layer uses.
    pub script_language: ScriptLanguage,
    /// The only text the player sees (Simplified Chinese).
    pub display_text_cn: String,
    /// Speaker name (Chinese).
    pub speaker_name: String,

    /// The full memory state resulting from this node. A replacement,
    /// not a diff.
    pub memory_updates: MemoryState,
    /// Character states as of this scene (not cumulative).
    pub characters: Vec<Character>,
    /// Branches offered from this node. Exactly three on non-ending nodes.
    pub choices: Vec<StoryChoice>,
    /// Terminal marker.
    pub is_ending: bool,
}

impl StoryNode {
    /// Stamp engine-owned fields on a freshly generated node: creation
    /// timestamp and parent linkage.
    pub fn stamp(&mut self, parent_id: Option<NodeId>) {
        self.timestamp = Utc::now().timestamp_millis();
        self.parent_id = parent_id;
    }
}

// ---------------------------------------------------------------------------
// Turn input
// ---------------------------------------------------------------------------

/// How the player's turn input arose. Forwarded to the model, never
/// interpreted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// The player picked one of the listed branches.
    Choice,
    /// Free-text director input, tagged as an out-of-band directive.
    Custom,
}
