//! IPC protocol types for communication with the web host.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (engine -> host).
//! Commands use `{"command": "<name>", ...}` format (host -> engine).

pub mod bridge;
pub mod sink;

use serde::{Deserialize, Serialize};

use crate::command::Surface;
use crate::entity::Study;
use crate::surface::Action;

// ---------------------------------------------------------------------------
// Events: engine -> host (stdout)
// ---------------------------------------------------------------------------

/// Serialized as `{"event": "<variant>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum EngineEvent {
    Starting {},
    Ready {
        model: Option<String>,
        transcription: bool,
    },
    Pong {},
    RecordingStart {
        source: String,
    },
    RecordingStop {
        /// `manual` or `silence`.
        reason: String,
    },
    Transcription {
        text: String,
    },
    Translation {
        text: String,
    },
    /// The validated command about to run.
    ModelResult {
        surface: Surface,
        command: serde_json::Value,
    },
    Action {
        surface: Surface,
        action: Action,
    },
    Error {
        message: String,
    },
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: host -> engine (stdin)
// ---------------------------------------------------------------------------

/// Deserialized from `{"command": "<variant>", ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum HostCommand {
    /// Typed instruction; skips recording but still goes through
    /// translation.
    Instruction {
        surface: Surface,
        text: String,
    },
    StartRecording {},
    WakeWord {
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        score: Option<f64>,
    },
    /// Base64 16-bit LE mono PCM at the configured sample rate.
    AudioChunk {
        pcm: String,
    },
    StopRecording {
        surface: Surface,
        #[serde(default)]
        text: Option<String>,
    },
    Studies {
        #[serde(default)]
        known: Vec<Study>,
        #[serde(default)]
        visible: Vec<Study>,
    },
    /// A surface mounted; `search` is its navigation query string.
    Mount {
        surface: Surface,
        #[serde(default)]
        search: String,
    },
    SurfaceReady {
        surface: Surface,
    },
    Ping {},
    Stop {},
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Layout;

    #[test]
    fn event_shape() {
        let json = serde_json::to_value(EngineEvent::Action {
            surface: Surface::Viewer,
            action: Action::SetLayout {
                layout: Layout::TwoByTwo,
            },
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "action",
                "data": {
                    "surface": "viewer",
                    "action": { "type": "set_layout", "layout": "2x2" }
                }
            })
        );
        let json = serde_json::to_value(EngineEvent::Pong {}).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "pong", "data": {} }));
    }

    #[test]
    fn command_shapes() {
        let cmd: HostCommand = serde_json::from_str(
            r#"{"command":"instruction","surface":"worklist","text":"clear filters"}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            HostCommand::Instruction { surface: Surface::List, ref text } if text == "clear filters"
        ));

        let cmd: HostCommand = serde_json::from_str(
            r#"{"command":"studies","known":[{"studyInstanceUid":"1","patientName":"A"}]}"#,
        )
        .unwrap();
        let HostCommand::Studies { known, visible } = cmd else {
            panic!("expected studies");
        };
        assert_eq!(known.len(), 1);
        assert!(visible.is_empty());

        let cmd: HostCommand =
            serde_json::from_str(r#"{"command":"mount","surface":"viewer"}"#).unwrap();
        assert!(matches!(cmd, HostCommand::Mount { ref search, .. } if search.is_empty()));
    }
}
