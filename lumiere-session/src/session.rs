//! The narrative session: one playthrough, one lock, one turn at a time.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use lumiere_core::memory::MemoryManager;
use lumiere_core::settings::GameSettings;
use lumiere_core::types::{Character, InputMode, MemoryState, NodeId, StoryNode};
use lumiere_core::{SaveFile, StoryTree};
use lumiere_llm::image::{pollinations_url, portrait_prompt, ImageClient};
use lumiere_llm::prompt;
use lumiere_llm::StoryBackend;

use crate::error::{Result, SessionError};

/// Story-side state. Everything a turn reads or writes lives here, so one
/// lock covers the whole invariant.
struct SessionState {
    settings: GameSettings,
    tree: StoryTree,
    memory: MemoryManager,
}

/// One playthrough of one story.
///
/// Generic over the backend so tests can script responses; production code
/// uses [`GenerationClient`](lumiere_llm::GenerationClient).
///
/// Generation turns are serialized by a busy flag rather than by holding
/// the lock across the provider call: the state lock is only taken briefly
/// before (to snapshot the prompt inputs) and after (to apply the result).
/// A failed or abandoned turn therefore leaves no trace. The flag gates
/// generation only; time travel, god-mode edits, overrides, and settings
/// changes go straight through the lock and stay available while a turn
/// is in flight.
pub struct NarrativeSession<B> {
    backend: B,
    images: ImageClient,
    state: RwLock<SessionState>,
    busy: AtomicBool,
}

/// Releases the busy flag when the turn ends, including when the turn's
/// future is dropped mid-flight.
struct TurnGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl<B: StoryBackend> NarrativeSession<B> {
    /// Create a fresh, uninitialized session.
    pub fn new(backend: B, settings: GameSettings) -> Self {
        let memory = MemoryManager::from_settings(&settings);
        Self {
            backend,
            images: ImageClient::new(),
            state: RwLock::new(SessionState {
                settings,
                tree: StoryTree::new(),
                memory,
            }),
            busy: AtomicBool::new(false),
        }
    }

    fn begin_turn(&self) -> Result<TurnGuard<'_>> {
        if self.busy.swap(true, Ordering::Acquire) {
            return Err(SessionError::AlreadyInProgress);
        }
        Ok(TurnGuard { busy: &self.busy })
    }

    /// Generate the opening scene and fix it as the root.
    ///
    /// # Errors
    ///
    /// Fails if a turn is in flight, the session already has a story, the
    /// provider fails, or the returned node is unusable. No state changes
    /// on failure.
    pub async fn initialize(&self) -> Result<StoryNode> {
        let guard = self.begin_turn()?;

        let (llm, tunables, system, payload) = {
            let st = self.state.read();
            if !st.tree.is_empty() {
                return Err(SessionError::AlreadyInitialized);
            }
            (
                st.settings.llm.clone(),
                st.settings.generation.clone(),
                prompt::build_system_instruction(&st.settings),
                prompt::build_init_payload(st.memory.effective()),
            )
        };

        let mut node = self
            .backend
            .generate_story_node(&llm, &system, payload, &tunables)
            .await?;
        node.stamp(None);

        {
            let mut st = self.state.write();
            st.tree.insert(node.clone())?;
            st.memory.commit(node.memory_updates.clone());
        }
        info!(root = %node.id, "story initialized");
        drop(guard);
        Ok(node)
    }

    /// Run one turn: send the player's input plus the effective memory,
    /// insert the resulting node as a child of the cursor, move the
    /// cursor to it, and commit its memory state.
    ///
    /// Advancing right after [`time_travel`](Self::time_travel) creates a
    /// sibling branch; nothing is overwritten.
    ///
    /// # Errors
    ///
    /// Fails if uninitialized, a turn is in flight, or generation fails.
    /// On failure the tree, cursor, memory, and any pending override all
    /// stay exactly as they were.
    pub async fn advance(&self, input: &str, mode: InputMode) -> Result<StoryNode> {
        let guard = self.begin_turn()?;

        let (llm, tunables, system, payload, previous) = {
            let st = self.state.read();
            let previous = st
                .tree
                .current_id()
                .cloned()
                .ok_or(SessionError::NotInitialized)?;
            (
                st.settings.llm.clone(),
                st.settings.generation.clone(),
                prompt::build_system_instruction(&st.settings),
                prompt::build_advance_payload(
                    input,
                    mode,
                    st.memory.effective(),
                    &previous,
                    &st.settings,
                ),
                previous,
            )
        };

        let mut node = self
            .backend
            .generate_story_node(&llm, &system, payload, &tunables)
            .await?;
        node.stamp(Some(previous.clone()));

        {
            let mut st = self.state.write();
            // Models occasionally echo an id they were shown in context.
            if st.tree.get(&node.id).is_some() {
                let fresh = NodeId::generate();
                warn!(echoed = %node.id, assigned = %fresh, "provider reused a node id");
                node.id = fresh;
            }
            st.tree.insert(node.clone())?;
            st.memory.commit(node.memory_updates.clone());
        }
        debug!(node = %node.id, parent = %previous, "turn committed");
        drop(guard);
        Ok(node)
    }

    /// Move the cursor to any existing node and resynchronize memory to
    /// that node's state. Touches nothing else; the abandoned branch stays
    /// intact and can be returned to the same way. Available even while a
    /// generation turn is in flight.
    ///
    /// # Errors
    ///
    /// Fails if the node does not exist.
    pub fn time_travel(&self, id: &NodeId) -> Result<StoryNode> {
        let mut st = self.state.write();
        let node = st.tree.time_travel(id)?.clone();
        // The model is re-anchored to the destination scene on the next
        // turn regardless of any pending override.
        st.memory.resync(node.memory_updates.clone());
        info!(node = %node.id, "time traveled");
        Ok(node)
    }

    /// God mode: rewrite an existing node in place. Identity and lineage
    /// are pinned; everything else in the replacement wins. If the edited
    /// node is the cursor, memory resynchronizes to the rewritten state.
    ///
    /// # Errors
    ///
    /// Fails if no node has the replacement's id.
    pub fn direct_edit(&self, node: StoryNode) -> Result<()> {
        let mut st = self.state.write();
        let id = node.id.clone();
        let memory = node.memory_updates.clone();
        st.tree.direct_edit(node)?;
        if st.tree.current_id() == Some(&id) {
            st.memory.resync(memory);
        }
        info!(node = %id, "node rewritten in place");
        Ok(())
    }

    /// Stage a manual memory override. It becomes the effective state the
    /// model sees on the next successful turn and is consumed by that
    /// turn; a failed turn leaves it staged.
    pub fn override_memory(&self, state: MemoryState) {
        self.state.write().memory.set_override(state);
    }

    /// Replace the settings. The next prompt is rendered from the new
    /// values; the story-so-far is untouched. Before the first turn this
    /// also rebuilds the seed memory so the opening reflects the latest
    /// premise.
    pub fn update_settings(&self, settings: GameSettings) {
        let mut st = self.state.write();
        if st.tree.is_empty() {
            st.memory = MemoryManager::from_settings(&settings);
        }
        st.settings = settings;
    }

    /// Merge a settings document (a full save export or a bare settings
    /// object) into the current settings.
    ///
    /// # Errors
    ///
    /// Fails on an unrecognized document shape.
    pub fn import_settings_document(&self, doc: &Value) -> Result<()> {
        let mut st = self.state.write();
        let merged = st.settings.merge_import(doc)?;
        if st.tree.is_empty() {
            st.memory = MemoryManager::from_settings(&merged);
        }
        st.settings = merged;
        Ok(())
    }

    /// Snapshot the full session as a portable save.
    pub fn export_save(&self) -> SaveFile {
        let st = self.state.read();
        SaveFile::new(st.tree.clone(), st.settings.clone())
    }

    /// Replace the whole session state from a save.
    ///
    /// The tree is validated before anything is touched, so a corrupt
    /// save cannot half-apply. Memory resynchronizes to the save's
    /// cursor node.
    ///
    /// # Errors
    ///
    /// Fails on a structurally invalid tree.
    pub fn restore(&self, save: SaveFile) -> Result<()> {
        save.tree.validate()?;

        let mut memory = MemoryManager::from_settings(&save.settings);
        if let Some(current) = save.tree.current() {
            memory.resync(current.memory_updates.clone());
        }

        let mut st = self.state.write();
        info!(nodes = save.tree.len(), "session restored from save");
        st.tree = save.tree;
        st.settings = save.settings;
        st.memory = memory;
        Ok(())
    }

    /// The node under the cursor, if any.
    pub fn current_node(&self) -> Option<StoryNode> {
        self.state.read().tree.current().cloned()
    }

    /// The memory state the next turn would send.
    pub fn effective_memory(&self) -> MemoryState {
        self.state.read().memory.effective().clone()
    }

    /// Whether a manual override is staged.
    pub fn has_memory_override(&self) -> bool {
        self.state.read().memory.has_override()
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> GameSettings {
        self.state.read().settings.clone()
    }

    /// Tree snapshot for rendering the timeline.
    pub fn tree_snapshot(&self) -> StoryTree {
        self.state.read().tree.clone()
    }

    /// Resolve the backdrop URL for a node. Deterministic mode needs no
    /// network; generative modes fall back to the deterministic URL on
    /// failure, so this always yields something displayable.
    pub async fn backdrop_url(&self, node: &StoryNode) -> String {
        let (image, tunables) = {
            let st = self.state.read();
            (st.settings.image.clone(), st.settings.generation.clone())
        };
        self.images
            .resolve_image_url(
                &image,
                &node.background_keyword,
                tunables.backdrop_width,
                tunables.backdrop_height,
                &node.id.0,
            )
            .await
    }

    /// Deterministic portrait URL for a character, seeded by their stable
    /// avatar seed.
    pub fn portrait_url(&self, character: &Character) -> String {
        let size = self.state.read().settings.generation.portrait_size;
        pollinations_url(&portrait_prompt(character), size, size, &character.avatar_seed)
    }
}
