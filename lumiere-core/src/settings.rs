//! Game settings: world premise, narrative mode selectors, and provider
//! configuration.
//!
//! Settings are an explicit value owned by the orchestration layer and
//! threaded into every core call — never ambient global state. A mid-session
//! edit takes effect from the next generation call only.
//!
//! Provider configs are tagged unions so each backend's required fields are
//! statically present instead of optionally typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// Narrative mode selectors
// ---------------------------------------------------------------------------

/// Overall plot topology requested from the model.
///
/// Purely advisory: the label is interpolated into the system prompt and the
/// engine never interprets it programmatically. Wire spellings keep the
/// bilingual labels the interface shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrativeStructure {
    /// Single through-line.
    #[serde(rename = "线性 (Linear)")]
    Linear,
    /// Branching tree of routes.
    #[serde(rename = "树状复线 (Branching)")]
    Branching,
    /// Web / rhizome.
    #[serde(rename = "网状叙事 (Web/Rhizome)")]
    Web,
    /// Time loop.
    #[serde(rename = "循环叙事 (Time Loop)")]
    Loop,
    /// Parallel timelines.
    #[serde(rename = "平行时空 (Parallel)")]
    Parallel,
    /// Frame story.
    #[serde(rename = "框架式 (Frame Story)")]
    Frame,
    /// Episodic units.
    #[serde(rename = "单元剧 (Episodic)")]
    Episodic,
    /// Reverse chronology.
    #[serde(rename = "倒叙 (Reverse Chronology)")]
    Reverse,
    /// Stream of consciousness.
    #[serde(rename = "意识流 (Stream of Consciousness)")]
    Stream,
    /// Rashomon effect.
    #[serde(rename = "罗生门 (Rashomon Effect)")]
    Rashomon,
}

impl NarrativeStructure {
    /// The bilingual label injected into the system prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Linear => "线性 (Linear)",
            Self::Branching => "树状复线 (Branching)",
            Self::Web => "网状叙事 (Web/Rhizome)",
            Self::Loop => "循环叙事 (Time Loop)",
            Self::Parallel => "平行时空 (Parallel)",
            Self::Frame => "框架式 (Frame Story)",
            Self::Episodic => "单元剧 (Episodic)",
            Self::Reverse => "倒叙 (Reverse Chronology)",
            Self::Stream => "意识流 (Stream of Consciousness)",
            Self::Rashomon => "罗生门 (Rashomon Effect)",
        }
    }
}

impl fmt::Display for NarrativeStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Narration technique requested from the model. Advisory, like
/// [`NarrativeStructure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrativeTechnique {
    /// Standard narration.
    #[serde(rename = "标准 (Standard)")]
    None,
    /// Non-linear narration.
    #[serde(rename = "非线性叙事 (Non-linear)")]
    NonLinear,
    /// Nested stories.
    #[serde(rename = "嵌套式 (Nested)")]
    Nested,
    /// Metafiction.
    #[serde(rename = "打破第四面墙 (Metafiction)")]
    FourthWall,
    /// Unreliable narrator.
    #[serde(rename = "不可靠叙述者 (Unreliable Narrator)")]
    Unreliable,
    /// In media res.
    #[serde(rename = "中间开始 (In Media Res)")]
    InMediaRes,
    /// Multiple perspectives.
    #[serde(rename = "多视角 (Multiperspective)")]
    Multiperspective,
}

impl NarrativeTechnique {
    /// The bilingual label injected into the system prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "标准 (Standard)",
            Self::NonLinear => "非线性叙事 (Non-linear)",
            Self::Nested => "嵌套式 (Nested)",
            Self::FourthWall => "打破第四面墙 (Metafiction)",
            Self::Unreliable => "不可靠叙述者 (Unreliable Narrator)",
            Self::InMediaRes => "中间开始 (In Media Res)",
            Self::Multiperspective => "多视角 (Multiperspective)",
        }
    }
}

impl fmt::Display for NarrativeTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cultural flavor of the setting; selects the raw script language
/// (east → Japanese, west → French).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingFlavor {
    /// Eastern setting; script layer in Japanese.
    East,
    /// Western setting; script layer in French.
    West,
}

// ---------------------------------------------------------------------------
// Provider configuration
// ---------------------------------------------------------------------------

/// Narrative engine (text) provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all_fields = "camelCase")]
pub enum LlmConfig {
    /// Native structured-output API: the response schema is enforced
    /// server-side.
    #[serde(rename = "gemini")]
    GeminiNative {
        /// API key. May be empty when a no-auth proxy is used.
        #[serde(default)]
        api_key: String,
        /// Override endpoint; `None` uses the official API host.
        #[serde(default)]
        base_url: Option<String>,
        /// Model name, e.g. `gemini-2.5-flash`.
        model_name: String,
    },
    /// Generic chat-completion API (GPT-4o, DeepSeek, proxies). The schema
    /// is only requested in the prompt; the raw text is parsed client-side.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        /// Endpoint base, e.g. `https://api.deepseek.com`.
        #[serde(default = "default_openai_base")]
        base_url: String,
        /// Bearer token.
        #[serde(default)]
        api_key: String,
        /// Model name, e.g. `deepseek-chat`.
        model_name: String,
    },
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl LlmConfig {
    /// Preset: Gemini 2.5 Flash via the native structured-output API.
    #[must_use]
    pub fn gemini_flash(api_key: impl Into<String>) -> Self {
        Self::GeminiNative {
            api_key: api_key.into(),
            base_url: None,
            model_name: "gemini-2.5-flash".to_string(),
        }
    }

    /// Preset: Gemini 1.5 Pro (long-context) via the native API.
    #[must_use]
    pub fn gemini_pro(api_key: impl Into<String>) -> Self {
        Self::GeminiNative {
            api_key: api_key.into(),
            base_url: None,
            model_name: "gemini-1.5-pro".to_string(),
        }
    }

    /// Preset: GPT-4o via the OpenAI chat API.
    #[must_use]
    pub fn gpt_4o(api_key: impl Into<String>) -> Self {
        Self::OpenAiCompatible {
            base_url: default_openai_base(),
            api_key: api_key.into(),
            model_name: "gpt-4o".to_string(),
        }
    }

    /// Preset: DeepSeek chat via its OpenAI-compatible endpoint.
    #[must_use]
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::OpenAiCompatible {
            base_url: "https://api.deepseek.com".to_string(),
            api_key: api_key.into(),
            model_name: "deepseek-chat".to_string(),
        }
    }

    /// The configured model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        match self {
            Self::GeminiNative { model_name, .. } | Self::OpenAiCompatible { model_name, .. } => {
                model_name
            }
        }
    }
}

/// Visual engine (image) provider configuration.
///
/// `Pollinations` is the zero-config deterministic mode: the URL is built
/// locally, no network round-trip, no key. The generative modes fall back
/// to it on any failure — image trouble must never block the narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all_fields = "camelCase")]
pub enum ImageConfig {
    /// Deterministic URL construction against image.pollinations.ai.
    #[serde(rename = "pollinations")]
    Pollinations,
    /// DALL·E 3 via the official OpenAI images endpoint.
    #[serde(rename = "openai_dalle")]
    OpenAiDalle {
        /// Bearer token.
        #[serde(default)]
        api_key: String,
        /// Endpoint base.
        #[serde(default = "default_openai_base")]
        base_url: String,
        /// Model name.
        #[serde(default = "default_dalle_model")]
        model_name: String,
    },
    /// Self-hosted SD/Flux or proxy speaking the OpenAI images protocol.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        /// Bearer token.
        #[serde(default)]
        api_key: String,
        /// Endpoint base.
        #[serde(default = "default_openai_base")]
        base_url: String,
        /// Model name, e.g. `flux-schnell`.
        #[serde(default = "default_dalle_model")]
        model_name: String,
    },
}

fn default_dalle_model() -> String {
    "dall-e-3".to_string()
}

// ---------------------------------------------------------------------------
// Generation tunables
// ---------------------------------------------------------------------------

/// Runtime knobs for generation calls. All have serde defaults so older
/// saves and partial imports load cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTunables {
    /// Request timeout in milliseconds. Expiry is a transport failure.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Sampling temperature for story generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Backdrop image width in pixels.
    #[serde(default = "default_backdrop_width")]
    pub backdrop_width: u32,
    /// Backdrop image height in pixels.
    #[serde(default = "default_backdrop_height")]
    pub backdrop_height: u32,
    /// Square character portrait edge length in pixels.
    #[serde(default = "default_portrait_size")]
    pub portrait_size: u32,
}

fn default_timeout_ms() -> u64 {
    60_000
}
fn default_temperature() -> f32 {
    1.0
}
fn default_backdrop_width() -> u32 {
    1920
}
fn default_backdrop_height() -> u32 {
    1080
}
fn default_portrait_size() -> u32 {
    512
}

impl Default for GenerationTunables {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            temperature: default_temperature(),
            backdrop_width: default_backdrop_width(),
            backdrop_height: default_backdrop_height(),
            portrait_size: default_portrait_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// GameSettings
// ---------------------------------------------------------------------------

/// Everything a session needs to drive generation: world premise, mode
/// selectors, and the two independent provider configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// World premise text.
    #[serde(rename = "storyBackground")]
    pub story_background: String,
    /// Main / supporting character descriptions.
    #[serde(rename = "characterInfo")]
    pub character_info: String,
    /// Key plot beats the story should hit.
    #[serde(rename = "keyPlotPoints")]
    pub key_plot_points: String,
    /// Cultural flavor (selects the script language).
    #[serde(rename = "settingType")]
    pub setting_flavor: SettingFlavor,
    /// Requested plot topology (advisory).
    #[serde(rename = "narrativeStructure")]
    pub narrative_structure: NarrativeStructure,
    /// Requested narration technique (advisory).
    #[serde(rename = "narrativeTechnique")]
    pub narrative_technique: NarrativeTechnique,
    /// Text provider configuration.
    #[serde(rename = "llmConfig")]
    pub llm: LlmConfig,
    /// Image provider configuration.
    #[serde(rename = "imageConfig")]
    pub image: ImageConfig,
    /// Runtime generation knobs.
    #[serde(rename = "generation", default)]
    pub generation: GenerationTunables,
}

impl Default for GameSettings {
    /// The stock neon-Paris premise shown on the setup screen.
    fn default() -> Self {
        Self {
            story_background: "2050年的新巴黎，霓虹灯与旧石建筑交织。雨夜连绵不绝。".to_string(),
            character_info: "主角：一位失忆的侦探。配角：神秘的AI少女\"Lumière\"。".to_string(),
            key_plot_points: "发现一张加密芯片；被财团追杀；寻找记忆的真相。".to_string(),
            setting_flavor: SettingFlavor::West,
            narrative_structure: NarrativeStructure::Branching,
            narrative_technique: NarrativeTechnique::None,
            llm: LlmConfig::gemini_flash(""),
            image: ImageConfig::Pollinations,
            generation: GenerationTunables::default(),
        }
    }
}

impl GameSettings {
    /// Load settings from a TOML string.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The script language implied by the setting flavor.
    #[must_use]
    pub fn script_language(&self) -> crate::types::ScriptLanguage {
        match self.setting_flavor {
            SettingFlavor::East => crate::types::ScriptLanguage::Japanese,
            SettingFlavor::West => crate::types::ScriptLanguage::French,
        }
    }

    /// Merge an externally supplied JSON document into these settings.
    ///
    /// Accepted shapes:
    /// - a full save file (the nested `settings` object is merged), or
    /// - a partial settings document with top-level narrative fields
    ///   (`storyBackground` / `characterInfo`).
    ///
    /// Fields present in the document overwrite the corresponding current
    /// setting; absent fields are left untouched. The merge is shallow:
    /// a supplied `llmConfig` replaces the whole provider config.
    ///
    /// # Errors
    /// Returns [`CoreError::ImportFormat`] for unrecognized documents or
    /// fields with the wrong shape. Current settings are never mutated on
    /// failure (the merge builds a new value).
    pub fn merge_import(&self, doc: &Value) -> Result<Self> {
        let incoming = if let Some(nested) = doc.get("settings") {
            nested.as_object().ok_or_else(|| {
                CoreError::ImportFormat("`settings` is not an object".to_string())
            })?
        } else if doc.get("storyBackground").is_some() || doc.get("characterInfo").is_some() {
            doc.as_object().ok_or_else(|| {
                CoreError::ImportFormat("document is not a JSON object".to_string())
            })?
        } else {
            return Err(CoreError::ImportFormat(
                "expected a nested `settings` object or top-level \
                 storyBackground/characterInfo fields"
                    .to_string(),
            ));
        };

        let mut merged = serde_json::to_value(self)?;
        let target = merged
            .as_object_mut()
            .ok_or_else(|| CoreError::ImportFormat("settings did not serialize to an object".to_string()))?;
        for (key, value) in incoming {
            target.insert(key.clone(), value.clone());
        }

        serde_json::from_value(merged).map_err(|e| CoreError::ImportFormat(e.to_string()))
    }
}
