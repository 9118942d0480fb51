//! Persistent story tree: every generated node, parent/child edges, and a
//! movable cursor.
//!
//! Three rules hold for the whole life of a tree:
//!
//! 1. The root is fixed by the first insertion and never changes.
//! 2. Nodes are never deleted. Time travel relocates the cursor only.
//! 3. Structure is append-only; the one in-place mutation is the god-mode
//!    [`StoryTree::direct_edit`], which replaces a node's value without
//!    touching edges or the cursor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::types::{NodeId, StoryNode};

/// The tree of all generated story nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryTree {
    /// All nodes ever generated, keyed by id.
    nodes: HashMap<NodeId, StoryNode>,
    /// The active cursor. Freely relocatable to any existing node.
    #[serde(rename = "currentId")]
    current_id: Option<NodeId>,
    /// Fixed on first insertion, never changed after.
    #[serde(rename = "rootId")]
    root_id: Option<NodeId>,
}

impl StoryTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The fixed root id, if any node has been inserted.
    #[must_use]
    pub fn root_id(&self) -> Option<&NodeId> {
        self.root_id.as_ref()
    }

    /// The cursor id.
    #[must_use]
    pub fn current_id(&self) -> Option<&NodeId> {
        self.current_id.as_ref()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<&StoryNode> {
        self.nodes.get(id)
    }

    /// The node under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&StoryNode> {
        self.current_id.as_ref().and_then(|id| self.nodes.get(id))
    }

    /// Iterate over all nodes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &StoryNode> {
        self.nodes.values()
    }

    /// Insert a freshly generated node and move the cursor to it.
    ///
    /// The first insertion fixes the root. A non-root node's parent must
    /// already be present — a dangling `parent_id` is silent corruption
    /// waiting to happen, so it is rejected up front rather than stored.
    ///
    /// # Errors
    /// - [`CoreError::DuplicateNode`] if a node with this id is stored.
    /// - [`CoreError::OrphanNode`] if `parent_id` names an unknown node.
    pub fn insert(&mut self, node: StoryNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode(node.id));
        }
        if let Some(parent) = &node.parent_id {
            if !self.nodes.contains_key(parent) {
                return Err(CoreError::OrphanNode {
                    node: node.id,
                    parent: parent.clone(),
                });
            }
        }

        let id = node.id.clone();
        if self.root_id.is_none() {
            self.root_id = Some(id.clone());
        }
        debug!(node = %id, parent = ?node.parent_id, "inserting story node");
        self.nodes.insert(id.clone(), node);
        self.current_id = Some(id);
        Ok(())
    }

    /// Relocate the cursor to an existing node ("time travel").
    ///
    /// Pure cursor movement: no edge changes, no deletion. Advancing again
    /// from here creates a sibling subtree, since the new node's parent
    /// becomes this node. The caller is expected to resync the active
    /// memory baseline to the target node's `memory_updates`.
    ///
    /// # Errors
    /// [`CoreError::NodeNotFound`] if the id is not in the tree.
    pub fn time_travel(&mut self, id: &NodeId) -> Result<&StoryNode> {
        if !self.nodes.contains_key(id) {
            return Err(CoreError::NodeNotFound(id.clone()));
        }
        debug!(node = %id, "time travel");
        self.current_id = Some(id.clone());
        Ok(&self.nodes[id])
    }

    /// God mode: replace a stored node's value in place, keyed by its own
    /// id. Rewrites history instead of branching it — edges, the cursor,
    /// and the root are untouched.
    ///
    /// # Errors
    /// [`CoreError::NodeNotFound`] if no node with this id exists.
    pub fn direct_edit(&mut self, node: StoryNode) -> Result<()> {
        let Some(stored) = self.nodes.get_mut(&node.id) else {
            return Err(CoreError::NodeNotFound(node.id));
        };
        debug!(node = %node.id, "direct edit");
        *stored = node;
        Ok(())
    }

    /// Children of a node, ordered by creation timestamp.
    #[must_use]
    pub fn children_of(&self, id: &NodeId) -> Vec<&StoryNode> {
        let mut children: Vec<&StoryNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.as_ref() == Some(id))
            .collect();
        children.sort_by_key(|n| n.timestamp);
        children
    }

    /// Depth of a node below the root (root is depth 0), via parent-chain
    /// traversal. `None` if the id is unknown.
    #[must_use]
    pub fn depth_of(&self, id: &NodeId) -> Option<usize> {
        let mut node = self.nodes.get(id)?;
        let mut depth = 0;
        while let Some(parent) = &node.parent_id {
            // A hand-edited save could contain a parent cycle; bail instead
            // of spinning.
            if depth > self.nodes.len() {
                return None;
            }
            node = self.nodes.get(parent)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Node ids grouped by depth from the root, for timeline display.
    /// Siblings within a level are ordered by creation timestamp.
    #[must_use]
    pub fn layout_by_depth(&self) -> Vec<Vec<NodeId>> {
        let Some(root) = &self.root_id else {
            return Vec::new();
        };
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        let mut frontier = vec![root.clone()];
        while !frontier.is_empty() {
            // Same cycle guard as `depth_of`.
            if levels.len() > self.nodes.len() {
                break;
            }
            frontier.sort_by_key(|id| self.nodes.get(id).map_or(0, |n| n.timestamp));
            let next = frontier
                .iter()
                .flat_map(|id| self.children_of(id))
                .map(|n| n.id.clone())
                .collect();
            levels.push(frontier);
            frontier = next;
        }
        levels
    }

    /// Structural consistency check, used when restoring an untrusted save:
    /// the root and cursor must exist, every parent edge must resolve, and
    /// only the root may lack a parent.
    ///
    /// # Errors
    /// [`CoreError::NodeNotFound`] naming the first unresolved id.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        for id in [&self.root_id, &self.current_id].into_iter().flatten() {
            if !self.nodes.contains_key(id) {
                return Err(CoreError::NodeNotFound(id.clone()));
            }
        }
        for node in self.nodes.values() {
            match &node.parent_id {
                Some(parent) if !self.nodes.contains_key(parent) => {
                    return Err(CoreError::NodeNotFound(parent.clone()));
                }
                None if Some(&node.id) != self.root_id.as_ref() => {
                    return Err(CoreError::OrphanNode {
                        node: node.id.clone(),
                        parent: NodeId::from("<missing parent>"),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
