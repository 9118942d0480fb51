//! Narrative generation client for the interchangeable text backends.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use lumiere_core::settings::{GenerationTunables, LlmConfig};
use lumiere_core::types::StoryNode;

use crate::error::GenerationError;
use crate::prompt::CHAT_JSON_RULE;
use crate::schema::story_node_schema;
use crate::validate::validate_node;

const GEMINI_DEFAULT_BASE: &str = "https://generativelanguage.googleapis.com";

/// The seam between the session engine and the network.
///
/// The real implementation is [`GenerationClient`]; tests substitute a
/// scripted backend so session behavior is exercised without a provider.
pub trait StoryBackend: Send + Sync {
    /// Generate, parse, and validate one story node.
    fn generate_story_node(
        &self,
        llm: &LlmConfig,
        system_instruction: &str,
        payload: Value,
        tunables: &GenerationTunables,
    ) -> impl Future<Output = Result<StoryNode, GenerationError>> + Send;
}

impl<B: StoryBackend> StoryBackend for std::sync::Arc<B> {
    fn generate_story_node(
        &self,
        llm: &LlmConfig,
        system_instruction: &str,
        payload: Value,
        tunables: &GenerationTunables,
    ) -> impl Future<Output = Result<StoryNode, GenerationError>> + Send {
        (**self).generate_story_node(llm, system_instruction, payload, tunables)
    }
}

/// HTTP backend speaking both provider protocols.
///
/// A failed call is a failed turn: there is no retry loop here. The caller
/// keeps its state untouched and the player simply tries again.
#[derive(Debug, Clone, Default)]
pub struct GenerationClient {
    http: Client,
}

impl GenerationClient {
    /// Create a client with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    async fn generate_gemini(
        &self,
        api_key: &str,
        base_url: Option<&str>,
        model_name: &str,
        system_instruction: &str,
        payload: &Value,
        tunables: &GenerationTunables,
    ) -> Result<StoryNode, GenerationError> {
        let base = base_url
            .unwrap_or(GEMINI_DEFAULT_BASE)
            .trim_end_matches('/');
        let url = format!("{base}/v1beta/models/{model_name}:generateContent");

        let body = json!({
            "systemInstruction": {
                "parts": [{ "text": system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": payload.to_string() }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": story_node_schema(),
                "temperature": tunables.temperature,
            }
        });

        let start = Instant::now();
        let result = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .timeout(Duration::from_millis(tunables.timeout_ms))
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                warn!(model = model_name, timeout_ms = tunables.timeout_ms, "generation timed out");
                return Err(GenerationError::Timeout(tunables.timeout_ms));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let excerpt = body_excerpt(resp).await;
            warn!(model = model_name, %status, "provider returned an error status");
            return Err(GenerationError::Transport {
                status: Some(status.as_u16()),
                message: excerpt,
            });
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let text = envelope["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::Parse("response has no candidate text".to_string())
            })?;

        debug!(
            model = model_name,
            latency_ms = start.elapsed().as_millis() as u64,
            "structured generation succeeded"
        );
        parse_node_text(text)
    }

    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        model_name: &str,
        system_instruction: &str,
        payload: &Value,
        tunables: &GenerationTunables,
    ) -> Result<StoryNode, GenerationError> {
        let base = base_url.trim_end_matches('/');
        let url = format!("{base}/chat/completions");

        // No server-side schema here: restate the contract in the system
        // message and parse whatever comes back.
        let system = format!(
            "{system_instruction}\n\n{CHAT_JSON_RULE}\nSCHEMA:\n{}",
            story_node_schema()
        );
        let body = json!({
            "model": model_name,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": payload.to_string() },
            ],
            "response_format": { "type": "json_object" },
            "temperature": tunables.temperature,
        });

        let start = Instant::now();
        let result = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .timeout(Duration::from_millis(tunables.timeout_ms))
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                warn!(model = model_name, timeout_ms = tunables.timeout_ms, "generation timed out");
                return Err(GenerationError::Timeout(tunables.timeout_ms));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let excerpt = body_excerpt(resp).await;
            warn!(model = model_name, %status, "provider returned an error status");
            return Err(GenerationError::Transport {
                status: Some(status.as_u16()),
                message: excerpt,
            });
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let text = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::Parse("response has no message content".to_string())
            })?;

        debug!(
            model = model_name,
            latency_ms = start.elapsed().as_millis() as u64,
            "chat generation succeeded"
        );
        parse_node_text(text)
    }
}

impl StoryBackend for GenerationClient {
    fn generate_story_node(
        &self,
        llm: &LlmConfig,
        system_instruction: &str,
        payload: Value,
        tunables: &GenerationTunables,
    ) -> impl Future<Output = Result<StoryNode, GenerationError>> + Send {
        async move {
            match llm {
                LlmConfig::GeminiNative {
                    api_key,
                    base_url,
                    model_name,
                } => {
                    self.generate_gemini(
                        api_key,
                        base_url.as_deref(),
                        model_name,
                        system_instruction,
                        &payload,
                        tunables,
                    )
                    .await
                }
                LlmConfig::OpenAiCompatible {
                    base_url,
                    api_key,
                    model_name,
                } => {
                    self.generate_openai(
                        base_url,
                        api_key,
                        model_name,
                        system_instruction,
                        &payload,
                        tunables,
                    )
                    .await
                }
            }
        }
    }
}

/// Parse raw provider text into a validated node.
///
/// Chat backends routinely wrap JSON in markdown fences even when told not
/// to, so fences are stripped before parsing.
fn parse_node_text(text: &str) -> Result<StoryNode, GenerationError> {
    let cleaned = strip_markdown_fences(text);
    let node: StoryNode =
        serde_json::from_str(cleaned).map_err(|e| GenerationError::Parse(e.to_string()))?;
    validate_node(node)
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

async fn body_excerpt(resp: reqwest::Response) -> String {
    let mut body = resp.text().await.unwrap_or_default();
    body.truncate(512);
    body
}
