//! Language-model access.
//!
//! Provides a dyn-compatible `LanguageModel` trait with implementations for:
//! - Google Gemini `generateContent`
//! - Any OpenAI-compatible chat-completions endpoint
//!
//! and the [`CommandModelClient`], which turns one prompt into at most one
//! JSON command object.

pub mod cloud;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ModelConfig, ModelProvider};

/// Common trait for all model backends (dyn-compatible).
pub trait LanguageModel: Send + Sync {
    /// Send one prompt, return the raw response text.
    fn generate(
        &self,
        prompt: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Display name (e.g. "Gemini (gemini-2.0-flash)").
    fn name(&self) -> String;
}

/// Create a model backend from config values.
pub fn create_language_model(config: &ModelConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    match config.provider {
        ModelProvider::Gemini => {
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Gemini requires an API key"))?;
            Ok(Arc::new(cloud::GeminiModel::new(
                key,
                &config.model,
                config.endpoint.as_deref(),
            )))
        }
        ModelProvider::OpenaiCompatible => {
            // Local servers usually run without a key; the hosted API needs one.
            if config.endpoint.is_none() && config.api_key.is_none() {
                anyhow::bail!("OpenAI-compatible model requires an API key or an endpoint");
            }
            Ok(Arc::new(cloud::OpenAiCompatibleModel::new(
                config.api_key.clone(),
                &config.model,
                config.endpoint.as_deref(),
            )))
        }
    }
}

/// Remove a surrounding triple-backtick fence (with optional language tag).
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// One model call per request; no retries.
#[derive(Clone)]
pub struct CommandModelClient {
    model: Arc<dyn LanguageModel>,
}

impl CommandModelClient {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Ask the model for a command. Returns the parsed JSON object, or
    /// `None` if the call failed or the reply was not a single object.
    /// The command kind is not checked here.
    pub async fn infer(&self, prompt: &str) -> Option<Value> {
        let raw = match self.model.generate(prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(model = %self.model.name(), "Model call failed: {e:#}");
                return None;
            }
        };
        debug!(raw = %raw, "Model response");

        let body = strip_code_fence(&raw);
        match serde_json::from_str::<Value>(body) {
            Ok(value) if value.is_object() => Some(value),
            Ok(other) => {
                warn!("Model response is not a JSON object: {other}");
                None
            }
            Err(e) => {
                warn!("Model response is not valid JSON: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies from a script and records every prompt it was given.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new<I: IntoIterator<Item = anyhow::Result<String>>>(replies: I) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                prompts: Mutex::default(),
            }
        }

        pub fn replying(reply: &str) -> Self {
            Self::new([Ok(reply.to_string())])
        }
    }

    impl LanguageModel for ScriptedModel {
        fn generate(
            &self,
            prompt: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")));
            Box::pin(async move { reply })
        }

        fn name(&self) -> String {
            "scripted".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn infer_parses_fenced_object() {
        let client = CommandModelClient::new(Arc::new(ScriptedModel::replying(
            "```json\n{ \"command\": \"reset_view\" }\n```",
        )));
        let value = client.infer("p").await.unwrap();
        assert_eq!(value["command"], "reset_view");
    }

    #[tokio::test]
    async fn infer_does_not_validate_kind() {
        let client = CommandModelClient::new(Arc::new(ScriptedModel::replying(
            r#"{"command":"launch_rocket"}"#,
        )));
        assert!(client.infer("p").await.is_some());
    }

    #[tokio::test]
    async fn infer_returns_none_on_failure() {
        let model = Arc::new(ScriptedModel::new([
            Err(anyhow::anyhow!("HTTP 500")),
            Ok("Sure! Here is your command.".to_string()),
            Ok("[{\"command\":\"play_cine\"}]".to_string()),
        ]));
        let client = CommandModelClient::new(model.clone());
        assert!(client.infer("a").await.is_none());
        assert!(client.infer("b").await.is_none());
        assert!(client.infer("c").await.is_none());
        assert_eq!(model.prompts.lock().unwrap().len(), 3);
    }

    #[test]
    fn factory_requires_credentials() {
        let mut cfg = ModelConfig::default();
        assert!(create_language_model(&cfg).is_err());
        cfg.api_key = Some("k".into());
        assert!(create_language_model(&cfg)
            .unwrap()
            .name()
            .contains("gemini-2.0-flash"));

        let local = ModelConfig {
            provider: ModelProvider::OpenaiCompatible,
            model: "llama3".into(),
            api_key: None,
            endpoint: Some("http://localhost:11434/v1".into()),
        };
        assert!(create_language_model(&local).is_ok());
    }
}
