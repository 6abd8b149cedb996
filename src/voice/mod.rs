//! Voice capture pipeline.
//!
//! `Idle → Recording → (AutoStopped | ManuallyStopped) → Transcribing →
//! [Translating] → Submitting → Idle`
//!
//! Audio arrives as mono f32 chunks (from the host over IPC, or from the
//! local microphone with the `mic` feature). A silence detector ends the
//! recording automatically; a typed override skips transcription entirely.

#[cfg(feature = "mic")]
pub mod capture;
#[cfg(feature = "mic")]
pub mod ring_buffer;
pub mod silence;
pub mod stt;
pub mod translate;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};

use crate::config::VoiceConfig;
use silence::SilenceDetector;
use stt::Transcriber;
use translate::{contains_hangul, Translator};

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Recording = 1,
    AutoStopped = 2,
    ManuallyStopped = 3,
    Transcribing = 4,
    Translating = 5,
    Submitting = 6,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Recording,
            2 => Self::AutoStopped,
            3 => Self::ManuallyStopped,
            4 => Self::Transcribing,
            5 => Self::Translating,
            6 => Self::Submitting,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::AutoStopped => "auto_stopped",
            Self::ManuallyStopped => "manually_stopped",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::Submitting => "submitting",
        };
        f.write_str(name)
    }
}

/// What started the current recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingSource {
    Manual,
    WakeWord,
}

impl fmt::Display for RecordingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::WakeWord => write!(f, "wake_word"),
        }
    }
}

/// Result of feeding one audio chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Not recording; the chunk was dropped.
    Ignored,
    Recording,
    /// This chunk completed the silent stretch; recording has stopped.
    AutoStopped,
}

/// Text ready for the prompt builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// English text to interpret.
    pub text: String,
    /// What the transcriber heard, when the text came from audio.
    pub transcript: Option<String>,
    /// Whether `text` is a translation.
    pub translated: bool,
}

#[derive(Debug)]
pub enum VoiceError {
    /// Another submission is in flight.
    Busy,
    /// Nothing usable was recorded, or no capture path is available.
    Capture(String),
    Transcription(anyhow::Error),
    Translation(anyhow::Error),
}

impl fmt::Display for VoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceError::Busy => write!(f, "A voice command is already being processed"),
            VoiceError::Capture(msg) => write!(f, "Recording failed: {msg}"),
            VoiceError::Transcription(e) => write!(f, "Transcription failed: {e}"),
            VoiceError::Translation(e) => write!(f, "Translation failed: {e}"),
        }
    }
}

impl std::error::Error for VoiceError {}

/// Decode base64 16-bit little-endian PCM into f32 samples.
pub fn decode_pcm16(encoded: &str) -> anyhow::Result<Vec<f32>> {
    let bytes = STANDARD.decode(encoded.trim())?;
    if bytes.len() % 2 != 0 {
        anyhow::bail!("PCM payload has an odd number of bytes ({})", bytes.len());
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
        .collect())
}

/// One pipeline per engine. Safe to share behind `Arc`/`Rc`.
pub struct VoicePipeline {
    state: AtomicU8,
    submitting: AtomicBool,
    source: Mutex<Option<RecordingSource>>,
    buffer: Mutex<Vec<f32>>,
    silence: Mutex<SilenceDetector>,
    transcriber: Option<Arc<dyn Transcriber>>,
    translator: Option<Arc<dyn Translator>>,
}

impl VoicePipeline {
    pub fn new(
        config: &VoiceConfig,
        transcriber: Option<Arc<dyn Transcriber>>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Idle as u8),
            submitting: AtomicBool::new(false),
            source: Mutex::new(None),
            buffer: Mutex::default(),
            silence: Mutex::new(SilenceDetector::new(
                config.silence_threshold,
                Duration::from_millis(config.silence_timeout_ms),
                config.sample_rate,
            )),
            transcriber,
            translator,
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn recording_source(&self) -> Option<RecordingSource> {
        *self.source.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Begin a recording session. Only allowed from `Idle`.
    pub fn start_recording(&self, source: RecordingSource) -> bool {
        if self.submitting.load(Ordering::Acquire)
            || !self.transition(PipelineState::Idle, PipelineState::Recording)
        {
            return false;
        }
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.silence.lock().unwrap_or_else(|e| e.into_inner()).reset();
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = Some(source);
        info!(%source, "Recording started");
        true
    }

    /// Append captured audio while recording.
    pub fn push_audio(&self, chunk: &[f32]) -> PushOutcome {
        if self.state() != PipelineState::Recording {
            return PushOutcome::Ignored;
        }
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(chunk);

        let silent = self
            .silence
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .observe(chunk);
        if silent && self.transition(PipelineState::Recording, PipelineState::AutoStopped) {
            info!("Silence detected, recording auto-stopped");
            return PushOutcome::AutoStopped;
        }
        PushOutcome::Recording
    }

    /// Manual stop. Returns `false` if no recording was running.
    pub fn stop_recording(&self) -> bool {
        let stopped = self.transition(PipelineState::Recording, PipelineState::ManuallyStopped);
        if stopped {
            info!("Recording stopped");
        }
        stopped
    }

    /// Samples captured in the current session.
    pub fn buffered_samples(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop any recording and return to `Idle`.
    pub fn reset(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_state(PipelineState::Idle);
    }

    /// Turn the stopped recording (or `typed`, if given) into English text
    /// and hand it to `deliver`.
    ///
    /// Only one submission runs at a time; a concurrent call returns
    /// [`VoiceError::Busy`] without touching the in-flight one. The pipeline
    /// is back in `Idle` when this returns, whatever the outcome.
    pub async fn submit<F, Fut, T>(&self, typed: Option<&str>, deliver: F) -> Result<T, VoiceError>
    where
        F: FnOnce(Utterance) -> Fut,
        Fut: Future<Output = T>,
    {
        if self.submitting.swap(true, Ordering::AcqRel) {
            return Err(VoiceError::Busy);
        }
        let _guard = SubmitGuard(self);

        // A submission may arrive while still recording (typed override).
        self.transition(PipelineState::Recording, PipelineState::ManuallyStopped);
        let audio = std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|e| e.into_inner()));

        let typed = typed.map(str::trim).filter(|t| !t.is_empty());
        let (text, transcript) = match typed {
            Some(text) => {
                if !audio.is_empty() {
                    debug!(samples = audio.len(), "Typed text supplied, discarding recording");
                }
                (text.to_string(), None)
            }
            None => {
                if audio.is_empty() {
                    return Err(VoiceError::Capture("no audio was recorded".into()));
                }
                let stt = self.transcriber.as_ref().ok_or_else(|| {
                    VoiceError::Transcription(anyhow::anyhow!("no transcription adapter configured"))
                })?;
                self.set_state(PipelineState::Transcribing);
                let heard = stt
                    .transcribe(audio)
                    .await
                    .map_err(VoiceError::Transcription)?;
                if heard.trim().is_empty() {
                    return Err(VoiceError::Transcription(anyhow::anyhow!(
                        "transcription was empty"
                    )));
                }
                info!(text = %heard, "Transcribed");
                (heard.clone(), Some(heard))
            }
        };

        let (text, translated) = if contains_hangul(&text) {
            let translator = self.translator.as_ref().ok_or_else(|| {
                VoiceError::Translation(anyhow::anyhow!("no translator configured"))
            })?;
            self.set_state(PipelineState::Translating);
            let english = translator
                .translate(&text)
                .await
                .map_err(VoiceError::Translation)?;
            (english, true)
        } else {
            (text, false)
        };

        self.set_state(PipelineState::Submitting);
        Ok(deliver(Utterance {
            text,
            transcript,
            translated,
        })
        .await)
    }
}

/// Returns the pipeline to `Idle` when a submission ends, however it ends.
struct SubmitGuard<'a>(&'a VoicePipeline);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.reset();
        self.0.submitting.store(false, Ordering::Release);
    }
}
