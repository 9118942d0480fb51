//! The structured-output response schema.
//!
//! One schema drives both provider modes: the Gemini-native path sends it
//! as `responseSchema` for server-side enforcement, the chat path embeds
//! it in the system message and relies on [`crate::validate`] afterwards.
//! Field names here must match the serde names on
//! [`StoryNode`](lumiere_core::StoryNode) exactly — the schema *is* the
//! wire contract.

use serde_json::{json, Value};

/// Schema for the [`MemoryState`](lumiere_core::MemoryState) object.
#[must_use]
pub fn memory_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "contextWindow": { "type": "STRING", "description": "Current scene immediate context." },
            "episodeSummary": { "type": "STRING", "description": "Summary of the current plot arc." },
            "longTermMemory": { "type": "STRING", "description": "Archived important past events." },
            "coreMemory": { "type": "STRING", "description": "Immutable facts about world and characters." },
            "inventory": { "type": "ARRAY", "items": { "type": "STRING" }, "description": "List of items." },
            "relationships": { "type": "STRING", "description": "General relationship status text." },
            "scheduledEvents": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Director Mode: list of future events waiting to be triggered."
            }
        },
        "required": [
            "contextWindow", "episodeSummary", "longTermMemory", "coreMemory",
            "inventory", "relationships", "scheduledEvents"
        ]
    })
}

/// Schema for one [`Character`](lumiere_core::Character) entry.
#[must_use]
pub fn character_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "id": { "type": "STRING" },
            "name": { "type": "STRING" },
            "archetype": {
                "type": "STRING",
                "description": "Jungian archetype (e.g. The Hero, The Shadow, The Anima, The Trickster)."
            },
            "affection": {
                "type": "NUMBER",
                "description": "Affection/trust score from 0 to 100 based on recent interactions."
            },
            "description": {
                "type": "STRING",
                "description": "Visual description for AI image generation (appearance, clothing, mood)."
            },
            "avatarSeed": {
                "type": "STRING",
                "description": "A consistent string seed for generating the character's portrait."
            }
        },
        "required": ["id", "name", "archetype", "affection", "description", "avatarSeed"]
    })
}

/// Schema for one offered branch.
#[must_use]
pub fn choice_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "id": { "type": "STRING" },
            "text_cn": { "type": "STRING", "description": "Choice text in Simplified Chinese." },
            "logic_hint": { "type": "STRING", "description": "Hidden plot direction tag." }
        },
        "required": ["id", "text_cn", "logic_hint"]
    })
}

/// The full story-node response schema.
#[must_use]
pub fn story_node_schema() -> Value {
    let mut memory = memory_schema();
    memory["description"] = json!(
        "Updated state of the game memory. CRITICAL: you MUST remove entries \
         from 'scheduledEvents' once they have naturally occurred in the story."
    );

    json!({
        "type": "OBJECT",
        "properties": {
            "id": { "type": "STRING", "description": "Unique UUID for this narrative node." },
            "reasoning_fr": {
                "type": "STRING",
                "description": "LOGIQUE INTERNE : analysez l'intrigue, la psychologie et les ramifications. DOIT ÊTRE EN FRANÇAIS."
            },
            "reasoning_cn_translation": {
                "type": "STRING",
                "description": "Internal annotation: Chinese translation of reasoning_fr."
            },
            "script_language": {
                "type": "STRING",
                "enum": ["French", "Japanese"],
                "description": "Select language based on setting context."
            },
            "original_script": {
                "type": "STRING",
                "description": "Raw dialogue/narration in script_language (FR/JP)."
            },
            "display_text_cn": {
                "type": "STRING",
                "description": "FINAL OUTPUT: literary SIMPLIFIED CHINESE translation for the visual novel interface. MUST BE CHINESE."
            },
            "speaker_name": { "type": "STRING", "description": "Character name (in Chinese)." },
            "background_keyword": {
                "type": "STRING",
                "description": "High-detail English prompt for the backdrop generator (e.g. 'cinematic shot of ruined castle, volumetric fog, 8k')."
            },
            "camera_movement": {
                "type": "STRING",
                "enum": ["STATIC", "ZOOM_IN", "ZOOM_OUT", "PAN_RIGHT", "PAN_LEFT", "DUTCH_ANGLE", "SHAKE"],
                "description": "Cinematic camera direction based on emotional intensity."
            },
            "visual_effect": {
                "type": "STRING",
                "enum": ["NONE", "RAIN", "SNOW", "FOG", "GLITCH", "FLASH", "DARKNESS", "HEALING", "THUNDER", "EMBERS"],
                "description": "Environmental or emotional particle effect overlay."
            },
            "character_emotion": {
                "type": "STRING",
                "description": "Emoji or short phrase describing character emotion."
            },
            "characters": {
                "type": "ARRAY",
                "items": character_schema(),
                "description": "Update state for MAJOR characters present in the scene."
            },
            "memory_updates": memory,
            "choices": {
                "type": "ARRAY",
                "description": "Provide exactly 3 distinct branches.",
                "items": choice_schema()
            },
            "is_ending": { "type": "BOOLEAN" }
        },
        "required": [
            "id", "reasoning_fr", "reasoning_cn_translation", "script_language",
            "original_script", "display_text_cn", "speaker_name", "background_keyword",
            "camera_movement", "visual_effect", "character_emotion", "characters",
            "memory_updates", "choices", "is_ending"
        ]
    })
}
