//! The command-dispatch interface toward the rendering layer.
//!
//! The engine never touches tables, viewports or routing itself. Each
//! validated command is lowered into one or more [`Action`]s and handed to
//! an [`ActionSink`], which the host implements (over IPC in the binary, in
//! memory in tests).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use uuid::Uuid;

use crate::command::{FilterParams, Layout, RotateDirection, SortDirection, Surface, ZoomDirection};
use crate::entity::Study;
use crate::handoff::{PENDING_ID_PARAM, PENDING_PARAM, STUDY_PARAM};

const VIEWER_PATH: &str = "/viewer/dicomweb";
const LIST_PATH: &str = "/";

/// A single side effect requested from a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    /// Merge the present fields over the current filters. Absent fields keep
    /// their current value.
    ApplyFilter(FilterParams),
    SetPage {
        page_number: u32,
    },
    SetSort {
        sort_by: String,
        sort_direction: SortDirection,
    },
    ClearFilters,
    GoToMainPage,
    ShowVersion,
    OpenUpload,
    DeleteExam {
        study_instance_uid: String,
    },
    /// User-visible message (model refusals, rejected commands).
    Notify {
        message: String,
    },
    SetLayout {
        layout: Layout,
    },
    /// One 90° rotation.
    RotateStep {
        direction: RotateDirection,
    },
    Zoom {
        direction: ZoomDirection,
        intensity: u32,
        dx: f64,
        dy: f64,
    },
    Pan {
        dx: f64,
        dy: f64,
    },
    SetCine {
        playing: bool,
    },
    DownloadImage,
    ResetView,
    Navigate(Navigation),
    /// Drop the pending-payload marker from the current navigation state.
    ClearPending,
}

/// A route change, optionally carrying deferred steps for the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// Destination surface.
    pub surface: Surface,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_instance_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_commands: Option<String>,
    /// Distinguishes two hand-offs that carry identical steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_id: Option<String>,
    pub url: String,
}

impl Navigation {
    /// Open `study_instance_uid` in the viewer.
    pub fn to_viewer(study_instance_uid: &str, pending: Option<String>) -> Self {
        Self::build(Surface::Viewer, Some(study_instance_uid), pending)
    }

    /// Return to the study list.
    pub fn to_list(pending: Option<String>) -> Self {
        Self::build(Surface::List, None, pending)
    }

    fn build(surface: Surface, study: Option<&str>, pending: Option<String>) -> Self {
        let pending_id = pending.as_ref().map(|_| Uuid::new_v4().to_string());

        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(uid) = study {
            query.append_pair(STUDY_PARAM, uid);
        }
        if let Some(payload) = &pending {
            query.append_pair(PENDING_PARAM, payload);
        }
        if let Some(id) = &pending_id {
            query.append_pair(PENDING_ID_PARAM, id);
        }
        let query = query.finish();

        let path = match surface {
            Surface::Viewer => VIEWER_PATH,
            Surface::List => LIST_PATH,
        };
        let url = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };

        Self {
            surface,
            study_instance_uid: study.map(str::to_string),
            pending_commands: pending,
            pending_id,
            url,
        }
    }
}

/// Where actions go. Implementations must not block: dispatch is called
/// from the engine's event loop.
pub trait ActionSink: Send + Sync {
    fn dispatch(&self, surface: Surface, action: Action);

    /// Studies currently shown on the list page, in display order.
    fn visible_studies(&self) -> Vec<Study>;
}

/// In-memory sink that records every action. Useful for embedding the
/// engine headless and for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    actions: Mutex<Vec<(Surface, Action)>>,
    visible: Mutex<Vec<Study>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visible(visible: Vec<Study>) -> Self {
        Self {
            actions: Mutex::default(),
            visible: Mutex::new(visible),
        }
    }

    pub fn set_visible(&self, visible: Vec<Study>) {
        *self.visible.lock().unwrap_or_else(|e| e.into_inner()) = visible;
    }

    /// Snapshot of everything dispatched so far.
    pub fn actions(&self) -> Vec<(Surface, Action)> {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the recorded actions.
    pub fn take(&self) -> Vec<(Surface, Action)> {
        std::mem::take(&mut *self.actions.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ActionSink for RecordingSink {
    fn dispatch(&self, surface: Surface, action: Action) {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((surface, action));
    }

    fn visible_studies(&self) -> Vec<Study> {
        self.visible
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
