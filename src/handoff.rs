//! Pending cross-surface payloads.
//!
//! When a sequence reaches steps that belong to the other surface, those
//! steps travel with the navigation as a base64-encoded JSON array in the
//! `pendingCommands` query parameter. The destination decodes them once,
//! waits for its own readiness and runs them as a local sequence.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::debug;
use url::form_urlencoded;

use crate::command::{parse::parse_steps_lenient, Command, Surface};
use crate::error::CommandError;

pub const STUDY_PARAM: &str = "StudyInstanceUIDs";
pub const PENDING_PARAM: &str = "pendingCommands";
pub const PENDING_ID_PARAM: &str = "pendingId";

/// Consumed payloads remembered per session.
const LEDGER_CAPACITY: usize = 32;

/// Serialize `steps` for transport.
pub fn encode_payload(steps: &[Command]) -> Result<String, CommandError> {
    let json = serde_json::to_vec(steps).map_err(|e| CommandError::InvalidPayload {
        reason: e.to_string(),
    })?;
    Ok(STANDARD.encode(json))
}

/// Decode a transported payload. Entries that fail validation are skipped;
/// a payload that is not base64 or not a JSON array is rejected.
pub fn decode_payload(encoded: &str) -> Result<Vec<Command>, CommandError> {
    let bytes = STANDARD
        .decode(normalize(encoded))
        .map_err(|e| CommandError::InvalidPayload {
            reason: format!("not base64: {e}"),
        })?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| CommandError::InvalidPayload {
        reason: format!("not JSON: {e}"),
    })?;
    let entries = value.as_array().ok_or_else(|| CommandError::InvalidPayload {
        reason: "expected a JSON array".into(),
    })?;
    Ok(parse_steps_lenient(entries))
}

/// Query strings decode `+` as a space; base64 never contains spaces.
/// Spaces are restored before stray line breaks are trimmed so a trailing
/// `+` survives.
fn normalize(encoded: &str) -> String {
    encoded
        .trim_matches(|c: char| c.is_whitespace() && c != ' ')
        .replace(' ', "+")
}

/// The hand-off parameters found in a surface's navigation query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingQuery {
    pub study_instance_uid: Option<String>,
    pub pending_commands: Option<String>,
    pub pending_id: Option<String>,
}

/// Parse a location search string (`?a=b&c=d`, leading `?` optional).
pub fn parse_query(search: &str) -> PendingQuery {
    let search = search.strip_prefix('?').unwrap_or(search);
    let mut query = PendingQuery::default();
    for (key, value) in form_urlencoded::parse(search.as_bytes()) {
        let value = value.into_owned();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            STUDY_PARAM => query.study_instance_uid = Some(value),
            PENDING_PARAM => query.pending_commands = Some(value),
            PENDING_ID_PARAM => query.pending_id = Some(value),
            _ => {}
        }
    }
    query
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Remembers which payloads were already consumed so a remount or
/// re-render never replays them.
#[derive(Debug, Clone, Default)]
pub struct PendingLedger {
    seen: Arc<Mutex<VecDeque<String>>>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(pending_id: Option<&str>, encoded: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(pending_id.unwrap_or_default().as_bytes());
        hasher.update(b":");
        hasher.update(normalize(encoded).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Mark a payload consumed. Returns `false` if it already was.
    pub fn claim(&self, pending_id: Option<&str>, encoded: &str) -> bool {
        let key = Self::fingerprint(pending_id, encoded);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(&key) {
            return false;
        }
        if seen.len() == LEDGER_CAPACITY {
            seen.pop_front();
        }
        seen.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// What a destination surface waits for before running a payload: either an
/// explicit ready signal (bounded by the settle delay) or the settle delay
/// alone.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    signal: Option<watch::Receiver<bool>>,
}

impl Readiness {
    /// No signal; wait out the settle delay.
    pub fn fixed() -> Self {
        Self { signal: None }
    }

    pub fn signal(rx: watch::Receiver<bool>) -> Self {
        Self { signal: Some(rx) }
    }

    pub async fn wait(&self, settle: Duration) {
        match &self.signal {
            Some(rx) => {
                let mut rx = rx.clone();
                let ready = matches!(
                    tokio::time::timeout(settle, rx.wait_for(|ready| *ready)).await,
                    Ok(Ok(_))
                );
                if !ready {
                    debug!(settle_ms = settle.as_millis() as u64, "Readiness signal not received, continuing");
                }
            }
            None if settle.is_zero() => tokio::task::yield_now().await,
            None => tokio::time::sleep(settle).await,
        }
    }
}

/// Per-surface ready flags. A surface is armed (not ready) when it mounts
/// and flips to ready when the host reports it initialized.
#[derive(Debug)]
pub struct ReadinessBoard {
    list: watch::Sender<bool>,
    viewer: watch::Sender<bool>,
}

impl Default for ReadinessBoard {
    fn default() -> Self {
        Self {
            list: watch::Sender::new(false),
            viewer: watch::Sender::new(false),
        }
    }
}

impl ReadinessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, surface: Surface) -> &watch::Sender<bool> {
        match surface {
            Surface::List => &self.list,
            Surface::Viewer => &self.viewer,
        }
    }

    /// Reset `surface` to not-ready and hand out a waiter for it.
    pub fn arm(&self, surface: Surface) -> Readiness {
        let tx = self.sender(surface);
        tx.send_replace(false);
        Readiness::signal(tx.subscribe())
    }

    pub fn mark_ready(&self, surface: Surface) {
        self.sender(surface).send_replace(true);
    }

    pub fn is_ready(&self, surface: Surface) -> bool {
        *self.sender(surface).borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Layout, RotateDirection, RotationAngle, ZoomDirection};

    fn steps() -> Vec<Command> {
        vec![
            Command::ChangeLayout {
                layout: Layout::TwoByTwo,
            },
            Command::RotateView {
                direction: RotateDirection::Right,
                angle: RotationAngle::Deg180,
            },
            Command::ZoomView {
                direction: ZoomDirection::Out,
                intensity: 2,
                dx: -0.5,
                dy: 1.0,
            },
        ]
    }

    #[test]
    fn payload_round_trips() {
        let encoded = encode_payload(&steps()).unwrap();
        assert_eq!(decode_payload(&encoded).unwrap(), steps());
    }

    #[test]
    fn decode_restores_plus_signs_lost_in_query_strings() {
        let encoded = encode_payload(&steps()).unwrap();
        let mangled = encoded.replace('+', " ");
        assert_eq!(decode_payload(&mangled).unwrap(), steps());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_payload("%%%"),
            Err(CommandError::InvalidPayload { .. })
        ));
        // {"a":1}
        assert!(matches!(
            decode_payload("eyJhIjoxfQ=="),
            Err(CommandError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn decode_skips_invalid_entries() {
        let raw = serde_json::json!([
            { "command": "rotate_view", "direction": "left", "angle": 45 },
            { "command": "reset_view" }
        ]);
        let encoded = STANDARD.encode(raw.to_string());
        assert_eq!(decode_payload(&encoded).unwrap(), vec![Command::ResetView]);
    }

    #[test]
    fn query_parsing() {
        let q = parse_query("?StudyInstanceUIDs=1.2.3&pendingCommands=ab%2Bc%3D&pendingId=42&foo=bar");
        assert_eq!(q.study_instance_uid.as_deref(), Some("1.2.3"));
        assert_eq!(q.pending_commands.as_deref(), Some("ab+c="));
        assert_eq!(q.pending_id.as_deref(), Some("42"));

        assert_eq!(parse_query(""), PendingQuery::default());
        assert_eq!(parse_query("pendingCommands="), PendingQuery::default());
    }

    #[test]
    fn ledger_claims_once() {
        let ledger = PendingLedger::new();
        assert!(ledger.claim(Some("id"), "abc+"));
        assert!(!ledger.claim(Some("id"), "abc+"));
        assert!(!ledger.claim(Some("id"), "abc "));
        assert!(!ledger.claim(Some("id"), "abc \n"));
        assert!(ledger.claim(Some("other"), "abc+"));
        assert!(ledger.claim(None, "abc+"));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn ledger_is_bounded() {
        let ledger = PendingLedger::new();
        for i in 0..40 {
            assert!(ledger.claim(None, &format!("payload-{i}")));
        }
        assert_eq!(ledger.len(), LEDGER_CAPACITY);
        // The oldest entries were evicted.
        assert!(ledger.claim(None, "payload-0"));
        assert!(!ledger.claim(None, "payload-39"));
    }

    #[tokio::test]
    async fn readiness_returns_once_signalled() {
        let board = ReadinessBoard::new();
        let waiter = board.arm(Surface::Viewer);
        assert!(!board.is_ready(Surface::Viewer));
        board.mark_ready(Surface::Viewer);
        // Would otherwise block for an hour.
        waiter.wait(Duration::from_secs(3600)).await;
        assert!(board.is_ready(Surface::Viewer));
        assert!(!board.is_ready(Surface::List));
    }

    #[tokio::test]
    async fn readiness_times_out_without_signal() {
        let board = ReadinessBoard::new();
        let waiter = board.arm(Surface::List);
        waiter.wait(Duration::from_millis(10)).await;
        Readiness::fixed().wait(Duration::ZERO).await;
    }
}
