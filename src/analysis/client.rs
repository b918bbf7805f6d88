//! Minimal Anthropic Messages API client.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Point the client at a different endpoint. Used by tests.
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send one user prompt, return the text of the first content block.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        anyhow::ensure!(self.is_configured(), "Anthropic API key not configured");

        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("messages request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("messages API returned {status}: {detail}");
        }

        let data: Value = response.json().await.context("messages API returned non-JSON")?;
        let text = data["content"][0]["text"]
            .as_str()
            .context("messages API response had no text content")?;

        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text.to_string())
    }

    /// Complete and parse the answer as JSON of type `T`, tolerating
    /// markdown code fences around the JSON body.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<T> {
        let text = self.complete(prompt, max_tokens).await?;
        parse_json_answer(&text)
    }
}

/// Strip a markdown code fence (```json ... ``` or ``` ... ```) if the
/// answer carries one, returning the inner text.
pub fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let inner = &text[start + 7..];
        if let Some(end) = inner.find("```") {
            return inner[..end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let inner = &text[start + 3..];
        if let Some(end) = inner.find("```") {
            return inner[..end].trim();
        }
    }
    text.trim()
}

/// Parse a model answer into `T` with a descriptive error on malformed JSON.
pub fn parse_json_answer<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text);
    serde_json::from_str(json)
        .with_context(|| format!("model returned unparseable JSON: {}", truncate(json, 200)))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
