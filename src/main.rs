//! PACS voice engine sidecar.
//!
//! Communicates with the web host via JSON-line IPC on stdin/stdout. All
//! work runs on one thread: commands from the host are handled in order,
//! while submissions and pending-payload runs are spawned as local tasks.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{spawn_local, LocalSet};
use tracing::{debug, info, warn};

use pacs_voice_core::command::Surface;
use pacs_voice_core::config::{self, paths, EngineConfig, VoiceConfig};
use pacs_voice_core::entity::StudyCatalog;
use pacs_voice_core::error::CommandError;
use pacs_voice_core::handoff::ReadinessBoard;
use pacs_voice_core::ipc::bridge::{emit_error, emit_event, spawn_stdin_reader};
use pacs_voice_core::ipc::sink::IpcSink;
use pacs_voice_core::ipc::{EngineEvent, HostCommand};
use pacs_voice_core::logging;
use pacs_voice_core::model;
use pacs_voice_core::session::Session;
use pacs_voice_core::voice::stt::{self, Transcriber};
use pacs_voice_core::voice::translate::{ModelTranslator, Translator};
use pacs_voice_core::voice::{
    decode_pcm16, PushOutcome, RecordingSource, Utterance, VoiceError, VoicePipeline,
};

/// How often captured microphone audio is moved into the pipeline.
const MIC_POLL: Duration = Duration::from_millis(80);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = logging::try_init(&paths::get_log_dir()) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    // Let the host know we're alive before anything slow happens.
    emit_event(&EngineEvent::Starting {});

    let config = config::read_engine_config();
    info!(
        provider = ?config.model.provider,
        model = %config.model.model,
        stt = %config.stt.adapter,
        strategy = ?config.prompt.strategy,
        "Configuration loaded"
    );

    LocalSet::new().run_until(run(config)).await;
    info!("Engine shut down");
}

async fn run(config: EngineConfig) {
    let catalog = StudyCatalog::new();
    let sink = Arc::new(IpcSink::new(catalog.clone()));

    let model = match model::create_language_model(&config.model) {
        Ok(model) => {
            info!(model = %model.name(), "Language model ready");
            Some(model)
        }
        Err(e) => {
            warn!("Language model unavailable: {e:#}");
            emit_error(&format!("Language model unavailable: {e}"));
            None
        }
    };
    let transcriber: Option<Arc<dyn Transcriber>> =
        match stt::create_stt_adapter(&config.stt, config.voice.sample_rate) {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(e) => {
                warn!("Transcription unavailable: {e:#}");
                None
            }
        };
    let translator = model
        .clone()
        .map(|m| Arc::new(ModelTranslator::new(m)) as Arc<dyn Translator>);

    let transcription = transcriber.is_some();
    let mut engine = Engine {
        session: Rc::new(Session::new(&config, sink, model, catalog)),
        pipeline: Rc::new(VoicePipeline::new(&config.voice, transcriber, translator)),
        readiness: ReadinessBoard::new(),
        active: Surface::List,
        voice: config.voice.clone(),
        mic: MicSlot::default(),
    };

    let mut cmd_rx = spawn_stdin_reader();
    emit_event(&EngineEvent::Ready {
        model: engine.session.model_name(),
        transcription,
    });
    info!("Engine ready");

    let mut mic_poll = tokio::time::interval(MIC_POLL);
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => {
                    if !engine.handle(cmd) {
                        break;
                    }
                }
                None => {
                    info!("stdin closed, shutting down");
                    break;
                }
            },
            _ = mic_poll.tick(), if engine.mic.active() => {
                let samples = engine.mic.drain();
                engine.push_audio(&samples);
            }
        }
    }
}

struct Engine {
    session: Rc<Session>,
    pipeline: Rc<VoicePipeline>,
    readiness: ReadinessBoard,
    /// Surface that last mounted or spoke; auto-stopped recordings go here.
    active: Surface,
    voice: VoiceConfig,
    mic: MicSlot,
}

impl Engine {
    /// Handle a single host command. Returns `false` if the loop should exit.
    fn handle(&mut self, cmd: HostCommand) -> bool {
        match cmd {
            HostCommand::Ping {} => emit_event(&EngineEvent::Pong {}),

            HostCommand::Stop {} => {
                emit_event(&EngineEvent::Stopping {});
                return false;
            }

            HostCommand::Studies { known, visible } => {
                debug!(known = known.len(), visible = visible.len(), "Study catalog updated");
                self.session.catalog().replace(known, visible);
            }

            HostCommand::Instruction { surface, text } => {
                self.active = surface;
                self.end_recording("typed");
                self.submit(surface, Some(text));
            }

            HostCommand::StartRecording {} => self.start_recording(RecordingSource::Manual),

            HostCommand::WakeWord { model, score } => {
                info!(model = ?model, score = ?score, "Wake word detected");
                self.start_recording(RecordingSource::WakeWord);
            }

            HostCommand::AudioChunk { pcm } => match decode_pcm16(&pcm) {
                Ok(samples) => self.push_audio(&samples),
                Err(e) => warn!("Dropping malformed audio chunk: {e:#}"),
            },

            HostCommand::StopRecording { surface, text } => {
                self.active = surface;
                self.end_recording("manual");
                self.submit(surface, text);
            }

            HostCommand::Mount { surface, search } => {
                self.active = surface;
                let readiness = self.readiness.arm(surface);
                let session = self.session.clone();
                spawn_local(async move {
                    if let Err(e) = session.mount(surface, &search, &readiness).await {
                        report(&e);
                    }
                });
            }

            HostCommand::SurfaceReady { surface } => {
                debug!(surface = %surface, "Surface ready");
                self.readiness.mark_ready(surface);
            }
        }
        true
    }

    fn start_recording(&mut self, source: RecordingSource) {
        if !self.pipeline.start_recording(source) {
            debug!("Recording already active or a submission is in flight");
            return;
        }
        self.mic.start(&self.voice);
        emit_event(&EngineEvent::RecordingStart {
            source: source.to_string(),
        });
    }

    /// Close the mic and stop an active recording, telling the host why.
    fn end_recording(&mut self, reason: &str) {
        let tail = self.mic.stop();
        self.pipeline.push_audio(&tail);
        if self.pipeline.stop_recording() {
            emit_event(&EngineEvent::RecordingStop {
                reason: reason.into(),
            });
        }
    }

    fn push_audio(&mut self, samples: &[f32]) {
        if self.pipeline.push_audio(samples) == PushOutcome::AutoStopped {
            self.mic.stop();
            emit_event(&EngineEvent::RecordingStop {
                reason: "silence".into(),
            });
            self.submit(self.active, None);
        }
    }

    fn submit(&self, surface: Surface, text: Option<String>) {
        let session = self.session.clone();
        let pipeline = self.pipeline.clone();
        spawn_local(async move {
            let outcome = pipeline
                .submit(text.as_deref(), |utterance| deliver(session, surface, utterance))
                .await;
            match outcome {
                Ok(()) => {}
                Err(VoiceError::Busy) => debug!("Submission already in flight, ignoring"),
                Err(e) => {
                    warn!("{e}");
                    emit_error(&e.to_string());
                }
            }
        });
    }
}

async fn deliver(session: Rc<Session>, surface: Surface, utterance: Utterance) {
    if let Some(heard) = &utterance.transcript {
        emit_event(&EngineEvent::Transcription {
            text: heard.clone(),
        });
    }
    if utterance.translated {
        emit_event(&EngineEvent::Translation {
            text: utterance.text.clone(),
        });
    }

    let command = match session.interpret(surface, &utterance.text).await {
        Ok(command) => command,
        Err(e) => return report(&e),
    };
    emit_event(&EngineEvent::ModelResult {
        surface,
        command: serde_json::to_value(&command).unwrap_or_default(),
    });
    if let Err(e) = session.execute(surface, &command).await {
        report(&e);
    }
}

fn report(err: &CommandError) {
    warn!("Command rejected: {err}");
    emit_error(&err.to_string());
}

// ---------------------------------------------------------------------------
// Local microphone (optional)
// ---------------------------------------------------------------------------

#[cfg(feature = "mic")]
#[derive(Default)]
struct MicSlot(Option<pacs_voice_core::voice::capture::MicCapture>);

#[cfg(feature = "mic")]
impl MicSlot {
    fn start(&mut self, voice: &VoiceConfig) {
        use pacs_voice_core::voice::capture::MicCapture;
        match MicCapture::start(voice.input_device.as_deref(), voice.sample_rate) {
            Ok(mic) => self.0 = Some(mic),
            // The host can still stream audio_chunk commands.
            Err(e) => warn!("Microphone unavailable: {e:#}"),
        }
    }

    fn active(&self) -> bool {
        self.0.is_some()
    }

    fn drain(&mut self) -> Vec<f32> {
        self.0.as_mut().map(|mic| mic.drain()).unwrap_or_default()
    }

    /// Close the stream, returning whatever was still buffered.
    fn stop(&mut self) -> Vec<f32> {
        self.0.take().map(|mut mic| mic.drain()).unwrap_or_default()
    }
}

#[cfg(not(feature = "mic"))]
#[derive(Default)]
struct MicSlot;

#[cfg(not(feature = "mic"))]
impl MicSlot {
    fn start(&mut self, _voice: &VoiceConfig) {}

    fn active(&self) -> bool {
        false
    }

    fn drain(&mut self) -> Vec<f32> {
        Vec::new()
    }

    fn stop(&mut self) -> Vec<f32> {
        Vec::new()
    }
}
