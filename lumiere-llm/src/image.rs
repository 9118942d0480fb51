//! Visual engine: turning scene/portrait prompts into image URLs.
//!
//! Resolution is infallible by contract. The deterministic mode builds a
//! URL locally with no network at all, and the generative modes fall back
//! to that URL on any failure, so the narrative loop never stalls on
//! images.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use lumiere_core::settings::ImageConfig;
use lumiere_core::types::Character;

const POLLINATIONS_BASE: &str = "https://image.pollinations.ai/prompt";
const IMAGE_TIMEOUT_MS: u64 = 45_000;

/// Image URL resolver.
#[derive(Debug, Clone, Default)]
pub struct ImageClient {
    http: Client,
}

impl ImageClient {
    /// Create a resolver with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// Resolve a prompt to a displayable image URL.
    ///
    /// Always returns a URL. Generative modes that fail for any reason
    /// (transport, auth, malformed response) log the failure and return the
    /// deterministic URL instead.
    pub async fn resolve_image_url(
        &self,
        config: &ImageConfig,
        prompt: &str,
        width: u32,
        height: u32,
        seed: &str,
    ) -> String {
        match config {
            ImageConfig::Pollinations => pollinations_url(prompt, width, height, seed),
            ImageConfig::OpenAiDalle {
                api_key,
                base_url,
                model_name,
            }
            | ImageConfig::OpenAiCompatible {
                api_key,
                base_url,
                model_name,
            } => {
                match self
                    .generate_openai_image(base_url, api_key, model_name, prompt)
                    .await
                {
                    Ok(url) => url,
                    Err(reason) => {
                        warn!(model = %model_name, %reason, "image generation failed, using deterministic fallback");
                        pollinations_url(prompt, width, height, seed)
                    }
                }
            }
        }
    }

    async fn generate_openai_image(
        &self,
        base_url: &str,
        api_key: &str,
        model_name: &str,
        prompt: &str,
    ) -> Result<String, String> {
        let base = base_url.trim_end_matches('/');
        let url = format!("{base}/images/generations");
        let body = json!({
            "model": model_name,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .timeout(Duration::from_millis(IMAGE_TIMEOUT_MS))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let envelope: Value = resp.json().await.map_err(|e| e.to_string())?;

        if let Some(remote) = envelope["data"][0]["url"].as_str() {
            debug!(model = model_name, "image generated (hosted url)");
            return Ok(remote.to_string());
        }
        if let Some(b64) = envelope["data"][0]["b64_json"].as_str() {
            debug!(model = model_name, "image generated (inline base64)");
            return Ok(format!("data:image/png;base64,{b64}"));
        }
        Err("response carried neither url nor b64_json".to_string())
    }
}

/// Deterministic image URL. Same prompt and seed always yield the same
/// URL, which keeps backdrops and portraits stable across reloads.
#[must_use]
pub fn pollinations_url(prompt: &str, width: u32, height: u32, seed: &str) -> String {
    format!(
        "{POLLINATIONS_BASE}/{}?width={width}&height={height}&nologo=true&seed={}&model=flux",
        percent_encode(prompt),
        percent_encode(seed)
    )
}

/// Standard portrait prompt for a character, seeded by their stable
/// avatar seed so the face survives scene changes.
#[must_use]
pub fn portrait_prompt(character: &Character) -> String {
    format!(
        "portrait of {}, {}, {} archetype, anime style, highly detailed, 8k",
        character.name, character.description, character.archetype
    )
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}
