//! Post-generation validation.
//!
//! Runs after a node parses, regardless of provider. Native structured
//! output narrows the failure space but does not eliminate it (a model can
//! still emit two choices inside a valid schema), so the checks run on both
//! paths. Repairable defects are repaired; structural ones are rejected.

use tracing::debug;

use lumiere_core::types::{NodeId, StoryNode};

use crate::error::GenerationError;

/// Validate and repair a freshly generated node.
///
/// # Errors
///
/// Returns [`GenerationError::Schema`] when the node is structurally
/// unusable: blank display text, or a non-ending with a choice count
/// other than three.
pub fn validate_node(mut node: StoryNode) -> Result<StoryNode, GenerationError> {
    if node.id.is_blank() {
        node.id = NodeId::generate();
        debug!(id = %node.id.0, "generated node arrived without an id, assigned one");
    }

    if node.display_text_cn.trim().is_empty() {
        return Err(GenerationError::Schema(
            "node has no display text".to_string(),
        ));
    }

    if !node.is_ending && node.choices.len() != 3 {
        return Err(GenerationError::Schema(format!(
            "non-ending node has {} choices, expected 3",
            node.choices.len()
        )));
    }

    for (i, choice) in node.choices.iter_mut().enumerate() {
        if choice.id.trim().is_empty() {
            choice.id = format!("choice-{}", i + 1);
        }
    }

    for character in &mut node.characters {
        character.affection = character.affection.clamp(0.0, 100.0);
    }

    Ok(node)
}
