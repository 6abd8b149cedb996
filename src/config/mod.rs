//! Engine configuration (`engine_config.json` in the data directory).
//!
//! Every field has a default, so a missing or partial file is fine. A file
//! that fails to parse is logged and ignored.

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prompt::PromptStrategy;
use paths::get_data_dir;

pub const MODEL_API_KEY_ENV: &str = "PACS_VOICE_MODEL_API_KEY";
pub const STT_API_KEY_ENV: &str = "PACS_VOICE_STT_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub sequencing: SequencingConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelProvider {
    #[default]
    Gemini,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: Option<String>,
    /// Base URL override (e.g. a proxy or a local OpenAI-compatible server).
    pub endpoint: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            model: "gemini-2.0-flash".into(),
            api_key: None,
            endpoint: None,
        }
    }
}

/// Speech-to-text adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SttConfig {
    /// `openai-cloud` or `custom-cloud`.
    pub adapter: String,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model_name: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            adapter: "openai-cloud".into(),
            api_key: None,
            endpoint: None,
            model_name: "whisper-1".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptConfig {
    pub strategy: PromptStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SequencingConfig {
    /// Pause after every dispatched action inside a sequence.
    pub step_delay_ms: u64,
    /// Upper bound on how long a destination surface waits for readiness
    /// before running a pending payload.
    pub settle_delay_ms: u64,
    pub max_macro_depth: usize,
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 100,
            settle_delay_ms: 2000,
            max_macro_depth: 8,
        }
    }
}

impl SequencingConfig {
    /// No pauses at all; steps still yield to the scheduler.
    pub fn immediate() -> Self {
        Self {
            step_delay_ms: 0,
            settle_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceConfig {
    /// Mean absolute amplitude below which a chunk counts as silence.
    pub silence_threshold: f32,
    pub silence_timeout_ms: u64,
    pub sample_rate: u32,
    /// Capture device name (`mic` feature). `None` uses the default input.
    pub input_device: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.01,
            silence_timeout_ms: 2000,
            sample_rate: 16_000,
            input_device: None,
        }
    }
}

impl EngineConfig {
    /// Fill API keys from the environment. Environment values win over the
    /// file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(MODEL_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.model.api_key = Some(key);
        }
        if let Some(key) = lookup(STT_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.stt.api_key = Some(key);
        }
    }
}

/// Path to engine_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("engine_config.json")
}

/// Read engine_config.json from the data directory and apply environment
/// overrides.
pub fn read_engine_config() -> EngineConfig {
    let mut config = load_from(&get_config_path());
    config.apply_env_overrides(|name| std::env::var(name).ok());
    config
}

/// Read a config file, falling back to defaults.
pub fn load_from(path: &Path) -> EngineConfig {
    read_json_file(path).unwrap_or_default()
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.model.provider, ModelProvider::Gemini);
        assert_eq!(cfg.model.model, "gemini-2.0-flash");
        assert_eq!(cfg.stt.adapter, "openai-cloud");
        assert_eq!(cfg.stt.model_name, "whisper-1");
        assert_eq!(cfg.prompt.strategy, PromptStrategy::Contextual);
        assert_eq!(cfg.sequencing.settle_delay(), Duration::from_secs(2));
        assert_eq!(cfg.sequencing.max_macro_depth, 8);
        assert_eq!(cfg.voice.sample_rate, 16_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{
                "model": { "provider": "openai-compatible", "model": "gpt-4o-mini" },
                "prompt": { "strategy": "basic" },
                "sequencing": { "stepDelayMs": 0 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.model.provider, ModelProvider::OpenaiCompatible);
        assert_eq!(cfg.model.model, "gpt-4o-mini");
        assert!(cfg.model.api_key.is_none());
        assert_eq!(cfg.prompt.strategy, PromptStrategy::Basic);
        assert_eq!(cfg.sequencing.step_delay_ms, 0);
        assert_eq!(cfg.sequencing.settle_delay_ms, 2000);
        assert_eq!(cfg.voice, VoiceConfig::default());
    }

    #[test]
    fn env_overrides_api_keys() {
        let mut cfg = EngineConfig::default();
        cfg.model.api_key = Some("from-file".into());
        cfg.apply_env_overrides(|name| match name {
            MODEL_API_KEY_ENV => Some("from-env".into()),
            STT_API_KEY_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.model.api_key.as_deref(), Some("from-env"));
        assert!(cfg.stt.api_key.is_none());
    }

    #[test]
    fn missing_or_invalid_file_falls_back() {
        let dir = std::env::temp_dir().join(format!("pacs-voice-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = load_from(&dir.join("nope.json"));
        assert_eq!(missing.sequencing, SequencingConfig::default());

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(load_from(&bad).model.model, "gemini-2.0-flash");

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{"voice":{"silenceTimeoutMs":500}}"#).unwrap();
        assert_eq!(load_from(&good).voice.silence_timeout_ms, 500);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
