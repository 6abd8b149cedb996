//! Cloud model adapters (Gemini, OpenAI-compatible chat completions).

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Value};
use tracing::debug;

use super::LanguageModel;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE: &str = "https://api.openai.com/v1";

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Google Gemini `models/{model}:generateContent`.
pub struct GeminiModel {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: trim_base(base_url.unwrap_or(GEMINI_BASE)),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn call(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        debug!(model = %self.model, chars = prompt.len(), "Sending prompt to Gemini");

        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {}: {}", status, body);
        }

        let json: Value = resp.json().await?;
        gemini_text(&json)
    }
}

fn gemini_text(json: &Value) -> anyhow::Result<String> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Gemini response has no candidate text"))
}

impl LanguageModel for GeminiModel {
    fn generate(
        &self,
        prompt: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let prompt = prompt.to_string();
        Box::pin(async move { self.call(&prompt).await })
    }

    fn name(&self) -> String {
        format!("Gemini ({})", self.model)
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

/// Any server speaking the OpenAI `chat/completions` protocol.
pub struct OpenAiCompatibleModel {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleModel {
    pub fn new(api_key: Option<String>, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            base_url: trim_base(base_url.unwrap_or(OPENAI_BASE)),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": prompt }]
        });
        debug!(model = %self.model, endpoint = %self.base_url, "Sending prompt to chat completions");

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions API error {}: {}", status, body);
        }

        let json: Value = resp.json().await?;
        chat_text(&json)
    }
}

fn chat_text(json: &Value) -> anyhow::Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Chat completions response has no message content"))
}

impl LanguageModel for OpenAiCompatibleModel {
    fn generate(
        &self,
        prompt: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let prompt = prompt.to_string();
        Box::pin(async move { self.call(&prompt).await })
    }

    fn name(&self) -> String {
        format!("OpenAI-compatible ({})", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_url_uses_model_and_trims_base() {
        let m = GeminiModel::new("k", "gemini-2.0-flash", Some("https://proxy.local/v1beta/"));
        assert_eq!(
            m.url(),
            "https://proxy.local/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn extracts_gemini_text() {
        let resp = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"command\":\"play_cine\"}" }] } }]
        });
        assert_eq!(gemini_text(&resp).unwrap(), "{\"command\":\"play_cine\"}");
        assert!(gemini_text(&json!({ "candidates": [] })).is_err());
    }

    #[test]
    fn extracts_chat_text() {
        let resp = json!({ "choices": [{ "message": { "role": "assistant", "content": "hi" } }] });
        assert_eq!(chat_text(&resp).unwrap(), "hi");
        assert!(chat_text(&json!({})).is_err());
    }
}
