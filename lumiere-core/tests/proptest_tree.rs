//! Property-based tests for the story tree and save format.
//!
//! Verified invariants:
//! - the root id equals the first inserted node's id and never changes;
//! - time travel relocates the cursor and nothing else;
//! - a god-mode edit touches exactly the targeted node;
//! - save files survive a serialize/deserialize round trip structurally
//!   unchanged.

use proptest::prelude::*;

use lumiere_core::save::SaveFile;
use lumiere_core::settings::GameSettings;
use lumiere_core::tree::StoryTree;
use lumiere_core::types::{
    CameraMovement, MemoryState, NodeId, ScriptLanguage, StoryChoice, StoryNode, VisualEffect,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_memory_state() -> impl Strategy<Value = MemoryState> {
    (
        "\\PC{0,24}",
        "\\PC{0,24}",
        "\\PC{0,24}",
        "\\PC{0,24}",
        prop::collection::vec("\\PC{0,12}", 0..4),
        "\\PC{0,24}",
        prop::collection::vec("\\PC{0,12}", 0..4),
    )
        .prop_map(|(cw, es, ltm, cm, inv, rel, sched)| MemoryState {
            context_window: cw,
            episode_summary: es,
            long_term_memory: ltm,
            core_memory: cm,
            inventory: inv,
            relationships: rel,
            scheduled_events: sched,
        })
}

fn arb_camera() -> impl Strategy<Value = CameraMovement> {
    prop_oneof![
        Just(CameraMovement::Static),
        Just(CameraMovement::ZoomIn),
        Just(CameraMovement::ZoomOut),
        Just(CameraMovement::PanRight),
        Just(CameraMovement::PanLeft),
        Just(CameraMovement::DutchAngle),
        Just(CameraMovement::Shake),
    ]
}

fn arb_effect() -> impl Strategy<Value = VisualEffect> {
    prop_oneof![
        Just(VisualEffect::None),
        Just(VisualEffect::Rain),
        Just(VisualEffect::Snow),
        Just(VisualEffect::Glitch),
        Just(VisualEffect::Embers),
    ]
}

prop_compose! {
    fn arb_node_body()(
        memory in arb_memory_state(),
        camera in arb_camera(),
        effect in arb_effect(),
        text in "\\PC{1,40}",
        choices in prop::collection::vec(("\\PC{1,8}", "\\PC{0,16}", "\\PC{0,16}"), 0..4),
        is_ending in any::<bool>(),
        timestamp in 0_i64..1_700_000_000_000,
    ) -> StoryNode {
        StoryNode {
            id: NodeId::from(""), // assigned by the plan builder
            timestamp,
            parent_id: None,
            background_keyword: "backdrop".into(),
            camera_movement: camera,
            visual_effect: effect,
            character_emotion: "🙂".into(),
            reasoning_fr: String::new(),
            reasoning_cn_translation: String::new(),
            original_script: String::new(),
            script_language: ScriptLanguage::French,
            display_text_cn: text,
            speaker_name: "旁白".into(),
            memory_updates: memory,
            characters: Vec::new(),
            choices: choices
                .into_iter()
                .enumerate()
                .map(|(i, (id, text_cn, hint))| StoryChoice {
                    id: format!("{id}-{i}"),
                    text_cn,
                    logic_hint: hint,
                })
                .collect(),
            is_ending,
        }
    }
}

/// An insertion plan: node bodies plus, for each node after the first, an
/// index selecting its parent among the already-inserted nodes.
fn arb_tree_plan() -> impl Strategy<Value = (Vec<StoryNode>, Vec<usize>)> {
    prop::collection::vec(arb_node_body(), 1..16).prop_flat_map(|bodies| {
        let n = bodies.len();
        let parents = prop::collection::vec(any::<usize>(), n.saturating_sub(1));
        (Just(bodies), parents)
    })
}

/// Build a tree by applying the plan; node `k` gets id `n{k}` and parent
/// `n{parents[k-1] % k}`.
fn build_tree(bodies: &[StoryNode], parents: &[usize]) -> StoryTree {
    let mut tree = StoryTree::new();
    for (k, body) in bodies.iter().enumerate() {
        let mut node = body.clone();
        node.id = NodeId(format!("n{k}"));
        node.parent_id = (k > 0).then(|| NodeId(format!("n{}", parents[k - 1] % k)));
        tree.insert(node).expect("plan inserts are always well-parented");
    }
    tree
}

// ---------------------------------------------------------------------------
// P1: root stability
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn root_is_first_inserted_and_never_changes((bodies, parents) in arb_tree_plan()) {
        let tree = build_tree(&bodies, &parents);
        prop_assert_eq!(tree.root_id(), Some(&NodeId::from("n0")));
        // The cursor always follows the latest insert.
        let last = format!("n{}", bodies.len() - 1);
        prop_assert_eq!(tree.current_id(), Some(&NodeId(last)));
    }
}

// ---------------------------------------------------------------------------
// P2: time travel is non-destructive
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn time_travel_changes_only_the_cursor(
        (bodies, parents) in arb_tree_plan(),
        target in any::<usize>(),
    ) {
        let mut tree = build_tree(&bodies, &parents);
        let before = tree.clone();
        let target_id = NodeId(format!("n{}", target % bodies.len()));

        tree.time_travel(&target_id).expect("target exists");

        prop_assert_eq!(tree.current_id(), Some(&target_id));
        prop_assert_eq!(tree.root_id(), before.root_id());
        prop_assert_eq!(tree.len(), before.len());
        for node in before.iter() {
            prop_assert_eq!(tree.get(&node.id), Some(node));
        }
    }
}

// ---------------------------------------------------------------------------
// P4: direct edit locality
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn direct_edit_touches_exactly_one_node(
        (bodies, parents) in arb_tree_plan(),
        target in any::<usize>(),
        new_text in "\\PC{1,40}",
    ) {
        let mut tree = build_tree(&bodies, &parents);
        let before = tree.clone();
        let target_id = NodeId(format!("n{}", target % bodies.len()));

        let mut edited = before.get(&target_id).expect("target exists").clone();
        edited.display_text_cn = new_text.clone();
        tree.direct_edit(edited).expect("edit");

        prop_assert_eq!(tree.current_id(), before.current_id());
        prop_assert_eq!(tree.root_id(), before.root_id());
        for node in before.iter() {
            let stored = tree.get(&node.id).expect("no node disappears");
            if node.id == target_id {
                prop_assert_eq!(&stored.display_text_cn, &new_text);
                prop_assert_eq!(&stored.parent_id, &node.parent_id);
            } else {
                prop_assert_eq!(stored, node);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// P6: save round trip
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn save_file_round_trips((bodies, parents) in arb_tree_plan()) {
        let tree = build_tree(&bodies, &parents);
        let save = SaveFile::new(tree, GameSettings::default());

        let json = save.to_json().expect("serialize");
        let loaded = SaveFile::from_json(&json).expect("parse");
        prop_assert_eq!(&loaded, &save);

        // Serializing again without further play reproduces the document.
        prop_assert_eq!(loaded.to_json().expect("serialize"), json);
    }
}
