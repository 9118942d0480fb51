//! Session behavior against a scripted backend.
//!
//! The backend here replays canned nodes (or failures) and records every
//! call it receives, so the turn loop, branching, memory precedence, and
//! failure atomicity are all exercised without a provider. Sessions are
//! built over an `Arc` of the backend so tests keep a handle for
//! inspecting captured calls.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Semaphore;

use lumiere_core::settings::{GameSettings, GenerationTunables, LlmConfig};
use lumiere_core::{SaveFile, StoryTree};
use lumiere_core::types::{
    CameraMovement, InputMode, MemoryState, NodeId, ScriptLanguage, StoryChoice, StoryNode,
    VisualEffect,
};
use lumiere_llm::{GenerationError, StoryBackend};
use lumiere_session::{NarrativeSession, SessionError};

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

struct CapturedCall {
    system_instruction: String,
    payload: Value,
}

#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<StoryNode, GenerationError>>>,
    calls: Mutex<Vec<CapturedCall>>,
}

impl ScriptedBackend {
    fn replying(responses: Vec<Result<StoryNode, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<CapturedCall> {
        std::mem::take(&mut self.calls.lock().expect("lock"))
    }
}

impl StoryBackend for ScriptedBackend {
    fn generate_story_node(
        &self,
        _llm: &LlmConfig,
        system_instruction: &str,
        payload: Value,
        _tunables: &GenerationTunables,
    ) -> impl Future<Output = Result<StoryNode, GenerationError>> + Send {
        self.calls.lock().expect("lock").push(CapturedCall {
            system_instruction: system_instruction.to_string(),
            payload,
        });
        let next = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Config("script exhausted".to_string())));
        async move { next }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn choice(id: &str) -> StoryChoice {
    StoryChoice {
        id: id.to_string(),
        text_cn: format!("选项 {id}"),
        logic_hint: String::new(),
    }
}

fn memory(context: &str) -> MemoryState {
    MemoryState {
        context_window: context.to_string(),
        core_memory: "core".to_string(),
        ..MemoryState::default()
    }
}

fn node(id: &str, context: &str) -> StoryNode {
    StoryNode {
        id: NodeId::from(id),
        timestamp: 0,
        parent_id: None,
        background_keyword: "neon alley at dusk".to_string(),
        camera_movement: CameraMovement::Static,
        visual_effect: VisualEffect::None,
        character_emotion: "🙂".to_string(),
        reasoning_fr: String::new(),
        reasoning_cn_translation: String::new(),
        original_script: String::new(),
        script_language: ScriptLanguage::French,
        display_text_cn: format!("场景 {id}"),
        speaker_name: "旁白".to_string(),
        memory_updates: memory(context),
        characters: Vec::new(),
        choices: vec![choice("a"), choice("b"), choice("c")],
        is_ending: false,
    }
}

fn session_over(
    backend: &Arc<ScriptedBackend>,
) -> NarrativeSession<Arc<ScriptedBackend>> {
    NarrativeSession::new(Arc::clone(backend), GameSettings::default())
}

// ---------------------------------------------------------------------------
// Turn loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_fixes_root_and_commits_memory() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "opening scene"))]);
    let session = session_over(&backend);

    let root = session.initialize().await.expect("initialize");
    assert_eq!(root.id, NodeId::from("root"));
    assert!(root.parent_id.is_none());
    assert!(root.timestamp > 0);

    let current = session.current_node().expect("current");
    assert_eq!(current.id, root.id);
    assert_eq!(session.effective_memory().context_window, "opening scene");
}

#[tokio::test]
async fn initialize_twice_is_rejected() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a")), Ok(node("again", "b"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("first");
    assert!(matches!(
        session.initialize().await,
        Err(SessionError::AlreadyInitialized)
    ));
    assert_eq!(session.tree_snapshot().len(), 1);
}

#[tokio::test]
async fn advance_appends_child_and_moves_cursor() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a")), Ok(node("n2", "b"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");

    let next = session
        .advance("选项 a", InputMode::Choice)
        .await
        .expect("advance");
    assert_eq!(next.parent_id, Some(NodeId::from("root")));
    assert_eq!(session.current_node().expect("current").id, next.id);
    assert_eq!(session.effective_memory().context_window, "b");
}

#[tokio::test]
async fn advance_before_initialize_is_not_initialized() {
    let backend = ScriptedBackend::replying(vec![]);
    let session = session_over(&backend);
    match session.advance("x", InputMode::Choice).await {
        Err(SessionError::NotInitialized) => {}
        other => panic!("expected NotInitialized, got {other:?}"),
    }
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn advance_after_travel_creates_a_sibling() {
    let backend = ScriptedBackend::replying(vec![
        Ok(node("root", "a")),
        Ok(node("n2", "b")),
        Ok(node("n3", "c")),
    ]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    session.advance("first", InputMode::Choice).await.expect("n2");

    session.time_travel(&NodeId::from("root")).expect("travel");
    let branch = session
        .advance("second", InputMode::Choice)
        .await
        .expect("n3");

    assert_eq!(branch.parent_id, Some(NodeId::from("root")));
    let tree = session.tree_snapshot();
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.children_of(&NodeId::from("root")).len(), 2);
    // The first branch survives intact.
    assert!(tree.get(&NodeId::from("n2")).is_some());
}

#[tokio::test]
async fn echoed_node_id_gets_a_fresh_one() {
    // The second response reuses the root's id.
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a")), Ok(node("root", "b"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    let next = session.advance("go", InputMode::Choice).await.expect("advance");
    assert_ne!(next.id, NodeId::from("root"));
    assert_eq!(session.tree_snapshot().len(), 2);
}

// ---------------------------------------------------------------------------
// Prompt contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settings_edit_lands_in_next_system_instruction() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a")), Ok(node("n2", "b"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");

    let mut settings = session.settings();
    settings.story_background = "the clockwork archipelago".to_string();
    session.update_settings(settings);
    session.advance("sail on", InputMode::Custom).await.expect("advance");

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].system_instruction.contains("clockwork archipelago"));
    assert!(calls[1].system_instruction.contains("clockwork archipelago"));
    assert!(calls[1].payload["contextUpdate"]
        .as_str()
        .expect("string")
        .contains("clockwork archipelago"));
}

#[tokio::test]
async fn input_modes_are_tagged_on_the_wire() {
    let backend = ScriptedBackend::replying(vec![
        Ok(node("root", "a")),
        Ok(node("n2", "b")),
        Ok(node("n3", "c")),
    ]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    session.advance("向北走", InputMode::Choice).await.expect("n2");
    session.advance("下一场雪", InputMode::Custom).await.expect("n3");

    let calls = backend.calls();
    assert_eq!(calls[1].payload["userAction"], "Le joueur a choisi : \"向北走\".");
    assert!(calls[2].payload["userAction"]
        .as_str()
        .expect("string")
        .starts_with("COMMANDE DIRECTEUR"));
    assert_eq!(calls[2].payload["previousNodeId"], "n2");
}

// ---------------------------------------------------------------------------
// Memory precedence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn override_wins_once_then_clears() {
    let backend = ScriptedBackend::replying(vec![
        Ok(node("root", "a")),
        Ok(node("n2", "b")),
        Ok(node("n3", "c")),
    ]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");

    session.override_memory(memory("the city is already burning"));
    assert!(session.has_memory_override());

    session.advance("run", InputMode::Choice).await.expect("n2");
    let calls = backend.calls();
    assert_eq!(
        calls[1].payload["currentMemory"]["contextWindow"],
        "the city is already burning"
    );

    // Consumed by the successful turn; the next call sends the committed
    // state from n2.
    assert!(!session.has_memory_override());
    session.advance("keep running", InputMode::Choice).await.expect("n3");
    let calls = backend.calls();
    assert_eq!(calls[0].payload["currentMemory"]["contextWindow"], "b");
}

#[tokio::test]
async fn failed_turn_keeps_override_and_state() {
    let backend = ScriptedBackend::replying(vec![
        Ok(node("root", "a")),
        Err(GenerationError::Transport {
            status: Some(500),
            message: "upstream exploded".to_string(),
        }),
        Ok(node("n2", "b")),
    ]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    session.override_memory(memory("staged"));

    let err = session.advance("go", InputMode::Choice).await;
    assert!(matches!(err, Err(SessionError::Generation(_))));

    // Nothing moved, the override is still staged, and the session is
    // not stuck busy.
    assert_eq!(session.tree_snapshot().len(), 1);
    assert_eq!(session.current_node().expect("current").id, NodeId::from("root"));
    assert!(session.has_memory_override());

    session.advance("go", InputMode::Choice).await.expect("retry");
    assert_eq!(session.tree_snapshot().len(), 2);
    assert!(!session.has_memory_override());
}

#[tokio::test]
async fn time_travel_resyncs_memory_to_destination() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a")), Ok(node("n2", "b"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    session.advance("on", InputMode::Choice).await.expect("n2");

    session.override_memory(memory("stale override"));
    session.time_travel(&NodeId::from("root")).expect("travel");

    // Travel re-anchors memory to the destination node, replacing any
    // staged override.
    assert_eq!(session.effective_memory().context_window, "a");
}

// ---------------------------------------------------------------------------
// God mode, saves, settings import
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_edit_of_cursor_resyncs_memory() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");

    let mut rewrite = session.current_node().expect("current");
    rewrite.display_text_cn = "改写的场景".to_string();
    rewrite.memory_updates = memory("rewritten history");
    session.direct_edit(rewrite).expect("edit");

    assert_eq!(
        session.current_node().expect("current").display_text_cn,
        "改写的场景"
    );
    assert_eq!(session.effective_memory().context_window, "rewritten history");
    assert_eq!(session.tree_snapshot().len(), 1);
}

#[tokio::test]
async fn direct_edit_of_unknown_node_fails() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    assert!(session.direct_edit(node("ghost", "x")).is_err());
}

#[tokio::test]
async fn export_restore_round_trip() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a")), Ok(node("n2", "b"))]);
    let session = session_over(&backend);
    session.initialize().await.expect("init");
    session.advance("on", InputMode::Choice).await.expect("n2");

    let save = session.export_save();

    let other = session_over(&ScriptedBackend::replying(vec![]));
    other.restore(save).expect("restore");
    assert_eq!(other.tree_snapshot().len(), 2);
    assert_eq!(other.current_node().expect("current").id, NodeId::from("n2"));
    assert_eq!(other.effective_memory().context_window, "b");
}

#[tokio::test]
async fn import_settings_reshapes_next_opening() {
    let backend = ScriptedBackend::replying(vec![Ok(node("root", "a"))]);
    let session = session_over(&backend);

    let doc = serde_json::json!({
        "settings": {
            "storyBackground": "a monastery carved into a glacier",
            "characterInfo": "the silent archivist",
        }
    });
    session.import_settings_document(&doc).expect("import");
    assert_eq!(
        session.settings().story_background,
        "a monastery carved into a glacier"
    );

    session.initialize().await.expect("init");
    let calls = backend.calls();
    assert!(calls[0].system_instruction.contains("glacier"));
    assert!(calls[0].payload["currentMemory"]["coreMemory"]
        .as_str()
        .expect("string")
        .contains("glacier"));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// Backend that blocks inside the provider call until the test opens the
/// gate, so a turn can be held in flight deliberately.
struct ParkedBackend {
    entered: Semaphore,
    gate: Semaphore,
    node: Mutex<Option<StoryNode>>,
}

impl ParkedBackend {
    fn holding(node: StoryNode) -> Arc<Self> {
        Arc::new(Self {
            entered: Semaphore::new(0),
            gate: Semaphore::new(0),
            node: Mutex::new(Some(node)),
        })
    }
}

impl StoryBackend for ParkedBackend {
    fn generate_story_node(
        &self,
        _llm: &LlmConfig,
        _system_instruction: &str,
        _payload: Value,
        _tunables: &GenerationTunables,
    ) -> impl Future<Output = Result<StoryNode, GenerationError>> + Send {
        async move {
            self.entered.add_permits(1);
            let _open = self.gate.acquire().await.expect("gate");
            self.node
                .lock()
                .expect("lock")
                .take()
                .ok_or_else(|| GenerationError::Config("no node staged".to_string()))
        }
    }
}

/// Session seeded with a one-node story without going through the backend.
fn restored_session(
    backend: &Arc<ParkedBackend>,
) -> Arc<NarrativeSession<Arc<ParkedBackend>>> {
    let mut tree = StoryTree::new();
    tree.insert(node("root", "a")).expect("insert root");
    let session = Arc::new(NarrativeSession::new(
        Arc::clone(backend),
        GameSettings::default(),
    ));
    session
        .restore(SaveFile::new(tree, GameSettings::default()))
        .expect("restore");
    session
}

#[tokio::test]
async fn state_edits_stay_available_while_a_turn_is_in_flight() {
    let backend = ParkedBackend::holding(node("n2", "b"));
    let session = restored_session(&backend);

    let turn = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.advance("go", InputMode::Choice).await }
    });
    backend.entered.acquire().await.expect("entered").forget();

    // Generation is exclusive while the turn is pending.
    match session.advance("again", InputMode::Choice).await {
        Err(SessionError::AlreadyInProgress) => {}
        other => panic!("expected AlreadyInProgress, got {other:?}"),
    }

    // Everything that does not generate stays available.
    session.time_travel(&NodeId::from("root")).expect("travel");
    let mut settings = session.settings();
    settings.story_background = "rewritten mid-flight".to_string();
    session.update_settings(settings);
    session.override_memory(memory("hand-written state"));
    assert!(session.has_memory_override());
    assert_eq!(
        session.settings().story_background,
        "rewritten mid-flight"
    );

    backend.gate.add_permits(1);
    let next = turn.await.expect("join").expect("turn");
    assert_eq!(next.parent_id, Some(NodeId::from("root")));
    assert_eq!(session.tree_snapshot().len(), 2);
    // The pending turn's commit consumed the staged override.
    assert!(!session.has_memory_override());
}

#[tokio::test]
async fn abandoned_turn_releases_the_busy_flag() {
    let backend = ParkedBackend::holding(node("n2", "b"));
    let session = restored_session(&backend);

    let turn = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.advance("go", InputMode::Choice).await }
    });
    backend.entered.acquire().await.expect("entered").forget();
    turn.abort();
    let _ = turn.await;

    // The dropped turn left no trace and released the flag; a fresh turn
    // goes straight through.
    assert_eq!(session.tree_snapshot().len(), 1);
    backend.gate.add_permits(1);
    let retry = session.advance("go", InputMode::Choice).await.expect("retry");
    assert_eq!(retry.parent_id, Some(NodeId::from("root")));
    assert_eq!(session.tree_snapshot().len(), 2);
}

#[tokio::test]
async fn portrait_url_is_deterministic() {
    let backend = ScriptedBackend::replying(vec![]);
    let session = session_over(&backend);
    let character = lumiere_core::types::Character {
        id: "ayla".to_string(),
        name: "艾拉".to_string(),
        archetype: "The Shadow".to_string(),
        affection: 50.0,
        description: "silver hair".to_string(),
        avatar_seed: "ayla-1".to_string(),
    };
    assert_eq!(session.portrait_url(&character), session.portrait_url(&character));
    assert!(session.portrait_url(&character).contains("seed=ayla-1"));
}
