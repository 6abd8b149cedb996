//! Speech-to-text adapters (OpenAI Whisper API, custom endpoint).

use std::future::Future;
use std::pin::Pin;

use reqwest::multipart;
use serde_json::Value;
use tracing::debug;

use crate::config::SttConfig;

const OPENAI_TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Turns recorded mono f32 audio into text (dyn-compatible).
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        audio: Vec<f32>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;
}

/// Encode f32 samples as 16-bit PCM mono WAV.
pub fn encode_wav(audio: &[f32], sample_rate: u32) -> Vec<u8> {
    const BYTES_PER_SAMPLE: u16 = 2;
    const CHANNELS: u16 = 1;

    let data_size = audio.len() as u32 * u32::from(BYTES_PER_SAMPLE);
    let mut buf = Vec::with_capacity(44 + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&CHANNELS.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    let block_align = CHANNELS * BYTES_PER_SAMPLE;
    buf.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&(BYTES_PER_SAMPLE * 8).to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in audio {
        let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        buf.extend_from_slice(&pcm.to_le_bytes());
    }

    buf
}

/// Multipart upload shared by both adapters.
struct Upload<'a> {
    client: &'a reqwest::Client,
    url: &'a str,
    api_key: Option<&'a str>,
    model_name: &'a str,
    sample_rate: u32,
}

impl Upload<'_> {
    async fn send(self, audio: &[f32]) -> anyhow::Result<String> {
        let wav = encode_wav(audio, self.sample_rate);
        debug!(bytes = wav.len(), url = %self.url, "Uploading audio for transcription");

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("model", self.model_name.to_string())
            .part("file", file_part);

        let mut req = self.client.post(self.url).multipart(form);
        if let Some(key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("STT API error {}: {}", status, body);
        }

        let json: Value = resp.json().await?;
        Ok(json["text"].as_str().unwrap_or("").trim().to_string())
    }
}

/// OpenAI Whisper API.
pub struct OpenAiStt {
    api_key: String,
    model_name: String,
    sample_rate: u32,
    client: reqwest::Client,
}

impl OpenAiStt {
    pub fn new(api_key: &str, model_name: &str, sample_rate: u32) -> Self {
        Self {
            api_key: api_key.to_string(),
            model_name: model_name.to_string(),
            sample_rate,
            client: reqwest::Client::new(),
        }
    }

    pub async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<String> {
        Upload {
            client: &self.client,
            url: OPENAI_TRANSCRIPTIONS_URL,
            api_key: Some(&self.api_key),
            model_name: &self.model_name,
            sample_rate: self.sample_rate,
        }
        .send(audio)
        .await
    }
}

/// User-configured endpoint accepting the same multipart form.
pub struct CustomApiStt {
    endpoint: String,
    api_key: Option<String>,
    model_name: String,
    sample_rate: u32,
    client: reqwest::Client,
}

impl CustomApiStt {
    pub fn new(endpoint: &str, api_key: Option<String>, model_name: &str, sample_rate: u32) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            model_name: model_name.to_string(),
            sample_rate,
            client: reqwest::Client::new(),
        }
    }

    pub async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<String> {
        Upload {
            client: &self.client,
            url: &self.endpoint,
            api_key: self.api_key.as_deref(),
            model_name: &self.model_name,
            sample_rate: self.sample_rate,
        }
        .send(audio)
        .await
    }
}

/// Enum-dispatch wrapper over the STT backends.
pub enum SttAdapter {
    OpenAi(OpenAiStt),
    Custom(CustomApiStt),
}

impl Transcriber for SttAdapter {
    fn transcribe(
        &self,
        audio: Vec<f32>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        Box::pin(async move {
            match self {
                Self::OpenAi(e) => e.transcribe(&audio).await,
                Self::Custom(e) => e.transcribe(&audio).await,
            }
        })
    }
}

/// Create an STT adapter from config values.
///
/// `adapter` is one of: "openai-cloud", "custom-cloud".
pub fn create_stt_adapter(config: &SttConfig, sample_rate: u32) -> anyhow::Result<SttAdapter> {
    match config.adapter.as_str() {
        "openai-cloud" => {
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("OpenAI STT requires an API key"))?;
            Ok(SttAdapter::OpenAi(OpenAiStt::new(
                key,
                &config.model_name,
                sample_rate,
            )))
        }
        "custom-cloud" => {
            let url = config
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Custom STT requires an endpoint URL"))?;
            Ok(SttAdapter::Custom(CustomApiStt::new(
                url,
                config.api_key.clone(),
                &config.model_name,
                sample_rate,
            )))
        }
        other => anyhow::bail!("Unknown STT adapter: {}", other),
    }
}
