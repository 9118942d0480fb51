//! Prompt templates for the narrative engine.
//!
//! The system instruction is re-interpolated from the *current* settings
//! before every call, so a mid-session settings edit takes effect from the
//! very next turn. Payloads carry the effective memory blob instead of a
//! transcript — that single blob is the whole story-so-far.

use serde_json::{json, Value};

use lumiere_core::settings::{GameSettings, SettingFlavor};
use lumiere_core::types::{InputMode, MemoryState, NodeId};

/// The fixed system instruction, before interpolation.
pub const SYSTEM_TEMPLATE: &str = r#"RÔLE : Vous êtes "Lumière", un moteur de roman visuel sophistiqué, Directeur de la Photographie et Superviseur VFX.

PARAMÈTRES LITTÉRAIRES :
- Structure Narrative : {narrative_structure}
- Technique Narrative : {narrative_technique}

RÈGLES STRICTES DE LANGUE :
1. **LOGIQUE** : Réfléchissez en **FRANÇAIS**. (reasoning_fr)
2. **SCRIPT** : Texte brut en **{script_language}**. (original_script)
3. **INTERFACE** : Traduction littéraire en **CHINOIS SIMPLIFIÉ**. (display_text_cn)

MODE RÉALISATEUR (DIRECTOR MODE / SCHEDULED EVENTS) :
- Consultez la liste 'currentMemory.scheduledEvents'.
- Si cette liste contient des événements, votre OBJECTIF PRIORITAIRE est de les intégrer de manière ORGANIQUE et FLUIDE dans la narration.
- Ne forcez pas l'événement s'il brise totalement la cohérence, mais orientez subtilement l'intrigue vers celui-ci (foreshadowing).
- **CRITIQUE** : Une fois qu'un événement de la liste s'est produit ou a été intégré dans la scène actuelle, VOUS DEVEZ LE SUPPRIMER de la liste 'scheduledEvents' dans l'objet 'memory_updates'.

DIRECTION CINÉMATOGRAPHIQUE & VFX :
- Agissez comme un réalisateur de film.
- **background_keyword** : Générez un prompt ANGLAIS détaillé pour un générateur d'images AI (ex: "cinematic shot of ruined castle, volumetric fog, 8k, unreal engine 5 render").
- **camera_movement** : Choisissez le mouvement de caméra qui correspond à l'émotion (ex: ZOOM_IN pour la tension, SHAKE pour le choc).
- **visual_effect** : Choisissez un effet visuel (ex: RAIN, GLITCH, EMBERS) si la scène le justifie.

SYSTÈME DE PERSONNAGES (JUNGIAN) & MÉMOIRE (RAG) :
- Assignez Archétypes Jungiens et score d'Affection.
- Gérez 'memory_updates' avec précision.

CONTEXTE INITIAL :
- Monde : {story_background}
- Personnages : {character_info}
- Intrigue : {key_plot_points}

INSTRUCTION :
- Commencez l'histoire si c'est le début.
- Générez toujours une réponse au format JSON strict correspondant au schéma fourni."#;

/// Fixed "begin the story" instruction for the first call.
pub const INIT_INSTRUCTION: &str =
    "Initialisez le moteur narratif avec une ouverture cinématographique. Renvoyez uniquement du JSON.";

/// Fixed continuation instruction for every subsequent turn.
pub const ADVANCE_INSTRUCTION: &str = "Continuez l'histoire. Mettez à jour la cinématographie. \
     Intégrez les événements prévus (scheduledEvents) si possible et supprimez-les une fois réalisés.";

/// Appended to the system message in chat-completion mode, where no
/// server-side schema enforcement exists.
pub const CHAT_JSON_RULE: &str = "CRITICAL: OUTPUT MUST BE VALID JSON MATCHING THE SCHEMA.";

/// Simple template interpolation: replaces `{key}` with the value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Build the system instruction from the current settings.
#[must_use]
pub fn build_system_instruction(settings: &GameSettings) -> String {
    let script_language = match settings.setting_flavor {
        SettingFlavor::East => "JAPONAIS",
        SettingFlavor::West => "FRANÇAIS",
    };
    render_template(
        SYSTEM_TEMPLATE,
        &[
            ("narrative_structure", settings.narrative_structure.label()),
            ("narrative_technique", settings.narrative_technique.label()),
            ("script_language", script_language),
            ("story_background", &settings.story_background),
            ("character_info", &settings.character_info),
            ("key_plot_points", &settings.key_plot_points),
        ],
    )
}

/// Payload for the initial "begin the story" call.
#[must_use]
pub fn build_init_payload(memory: &MemoryState) -> Value {
    json!({
        "instruction": INIT_INSTRUCTION,
        "currentMemory": memory,
    })
}

/// Payload for one user turn.
///
/// The two input modes are tagged differently so the model can tell a
/// picked branch from an out-of-band director command; the engine itself
/// never interprets the distinction.
#[must_use]
pub fn build_advance_payload(
    input: &str,
    mode: InputMode,
    memory: &MemoryState,
    previous_node_id: &NodeId,
    settings: &GameSettings,
) -> Value {
    let user_action = match mode {
        InputMode::Choice => format!("Le joueur a choisi : \"{input}\"."),
        InputMode::Custom => format!("COMMANDE DIRECTEUR (Prompt Utilisateur) : \"{input}\"."),
    };

    let context_update = format!(
        "RAPPEL PARAMÈTRES ACTUELS:\n- Monde: {}\n- Personnages: {}\n- Intrigue Clé: {}",
        settings.story_background, settings.character_info, settings.key_plot_points
    );

    json!({
        "userAction": user_action,
        "instruction": ADVANCE_INSTRUCTION,
        "contextUpdate": context_update,
        "currentMemory": memory,
        "previousNodeId": previous_node_id,
    })
}
