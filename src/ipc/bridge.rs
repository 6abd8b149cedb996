//! IPC bridge: stdin reader and stdout event emitter.
//!
//! A blocking stdin reader thread sends deserialized commands through an
//! mpsc channel; events go out as JSON lines on stdout.

use std::io::{self, BufRead, Write};

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{EngineEvent, HostCommand};

/// Write one event as a JSON line.
pub fn write_event<W: Write>(out: &mut W, event: &EngineEvent) -> io::Result<()> {
    let json = serde_json::to_string(event).map_err(io::Error::other)?;
    writeln!(out, "{json}")?;
    out.flush()
}

/// Emit an event on stdout. Write errors are ignored (the host may be gone).
pub fn emit_event(event: &EngineEvent) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = write_event(&mut handle, event) {
        debug!("Failed to write event: {}", e);
    }
}

pub fn emit_error(message: &str) {
    emit_event(&EngineEvent::Error {
        message: message.to_string(),
    });
}

/// Accept `{"type": ...}` as well as `{"command": ...}`.
fn normalize_command_json(input: &str) -> String {
    if let Ok(mut obj) = serde_json::from_str::<Map<String, Value>>(input) {
        if !obj.contains_key("command") {
            if let Some(kind) = obj.remove("type") {
                obj.insert("command".to_string(), kind);
                if let Ok(json) = serde_json::to_string(&obj) {
                    return json;
                }
            }
        }
    }
    input.to_string()
}

/// Parse one stdin line. Blank lines yield `Ok(None)`.
pub fn parse_command_line(line: &str) -> Result<Option<HostCommand>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&normalize_command_json(trimmed)).map(Some)
}

/// Spawn a blocking thread that reads JSON lines from stdin and forwards
/// them through the returned channel. The thread exits when stdin closes.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<HostCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let text = match line {
                Ok(text) => text,
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            };
            match parse_command_line(&text) {
                Ok(Some(cmd)) => {
                    debug!(?cmd, "Received command from host");
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Invalid JSON command: {} (input: {})", e, text.trim());
                    emit_error(&format!("Invalid JSON command: {}", e));
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Surface;

    #[test]
    fn type_key_is_normalized() {
        let cmd = parse_command_line(r#"{"type":"surface_ready","surface":"list"}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(
            cmd,
            HostCommand::SurfaceReady {
                surface: Surface::List
            }
        ));
    }

    #[test]
    fn command_key_wins_over_type() {
        let cmd = parse_command_line(r#"{"command":"ping","type":"stop"}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(cmd, HostCommand::Ping {}));
    }

    #[test]
    fn blank_and_invalid_lines() {
        assert!(parse_command_line("   ").unwrap().is_none());
        assert!(parse_command_line("{\"command\":\"dance\"}").is_err());
        assert!(parse_command_line("not json").is_err());
    }

    #[test]
    fn events_are_single_lines() {
        let mut out = Vec::new();
        write_event(
            &mut out,
            &EngineEvent::Transcription {
                text: "line one\nline two".into(),
            },
        )
        .unwrap();
        write_event(&mut out, &EngineEvent::Stopping {}).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            r#"{"event":"stopping","data":{}}"#
        );
    }
}
