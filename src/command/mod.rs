//! Structured commands produced from natural language.
//!
//! The wire format is one JSON object per command, tagged by a `"command"`
//! field (snake_case kind) with camelCase payload fields:
//!
//! ```json
//! { "command": "rotate_view", "direction": "right", "angle": 90 }
//! ```
//!
//! Every kind carries a static surface tag (see [`Command::surface`]) so the
//! sequencer can split a step list without consulting name tables.

pub mod parse;

use serde::{Deserialize, Serialize};

pub use parse::parse_command;

// ---------------------------------------------------------------------------
// Surfaces
// ---------------------------------------------------------------------------

/// One of the two application screens with disjoint command vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// The study list screen.
    #[serde(alias = "worklist")]
    List,
    /// The image viewer screen.
    Viewer,
}

impl Surface {
    pub fn other(self) -> Self {
        match self {
            Self::List => Self::Viewer,
            Self::Viewer => Self::List,
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// `[start, end]`, ISO dates as the model emits them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_date_range: Option<[String; 2]>,
}

impl FilterParams {
    pub fn is_empty(&self) -> bool {
        self.patient_name.is_none()
            && self.description.is_none()
            && self.modalities.is_none()
            && self.study_date_range.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Viewport grid layouts the viewer knows how to stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    #[serde(rename = "1x1")]
    OneByOne,
    #[serde(rename = "2x1")]
    TwoByOne,
    #[serde(rename = "2x2")]
    TwoByTwo,
    #[serde(rename = "3x1")]
    ThreeByOne,
}

impl Layout {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "1x1" => Some(Self::OneByOne),
            "2x1" => Some(Self::TwoByOne),
            "2x2" => Some(Self::TwoByTwo),
            "3x1" => Some(Self::ThreeByOne),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneByOne => "1x1",
            Self::TwoByOne => "2x1",
            Self::TwoByTwo => "2x2",
            Self::ThreeByOne => "3x1",
        }
    }

    /// Number of viewports the layout shows.
    pub fn viewport_count(self) -> usize {
        match self {
            Self::OneByOne => 1,
            Self::TwoByOne => 2,
            Self::TwoByTwo => 4,
            Self::ThreeByOne => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotateDirection {
    Left,
    Right,
}

/// A rotation the viewer can perform as whole quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RotationAngle {
    Deg90,
    Deg180,
    Deg270,
}

impl RotationAngle {
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn quarter_turns(self) -> u16 {
        self.degrees() / 90
    }
}

impl TryFrom<u16> for RotationAngle {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(format!("unsupported rotation angle {other}")),
        }
    }
}

impl From<RotationAngle> for u16 {
    fn from(angle: RotationAngle) -> Self {
        angle.degrees()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    #[default]
    In,
    Out,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A validated instruction. Immutable once produced by the model client
/// (via [`parse_command`]) or by macro expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    // -- list surface --
    Filter(FilterParams),
    GoToPage {
        page_number: u32,
    },
    Sort {
        sort_by: String,
        sort_direction: SortDirection,
    },
    ClearFilters,
    GoToMainPage,
    OpenStudy {
        study_instance_uid: String,
    },
    /// 1-based position on the currently visible page.
    OpenStudyIndex {
        index: usize,
    },
    ShowVersion,
    OpenUpload,
    DeleteExam {
        study_instance_uid: String,
    },

    // -- either surface --
    Error {
        message: String,
    },

    // -- viewer surface --
    ChangeLayout {
        layout: Layout,
    },
    RotateView {
        direction: RotateDirection,
        angle: RotationAngle,
    },
    ZoomView {
        direction: ZoomDirection,
        intensity: u32,
        dx: f64,
        dy: f64,
    },
    PanView {
        dx: f64,
        dy: f64,
    },
    PlayCine,
    StopCine,
    DownloadImage,
    ResetView,

    // -- structural --
    RunSequence {
        steps: Vec<Command>,
    },
    DefineMacro {
        macro_name: String,
        steps: Vec<Command>,
    },
    PerformMacro {
        macro_name: String,
    },
}

impl Command {
    /// Surface whose vocabulary this kind belongs to. `None` for kinds that
    /// are valid on either surface (errors and the structural kinds).
    pub fn surface(&self) -> Option<Surface> {
        match self {
            Self::Filter(_)
            | Self::GoToPage { .. }
            | Self::Sort { .. }
            | Self::ClearFilters
            | Self::GoToMainPage
            | Self::OpenStudy { .. }
            | Self::OpenStudyIndex { .. }
            | Self::ShowVersion
            | Self::OpenUpload
            | Self::DeleteExam { .. } => Some(Surface::List),

            Self::ChangeLayout { .. }
            | Self::RotateView { .. }
            | Self::ZoomView { .. }
            | Self::PanView { .. }
            | Self::PlayCine
            | Self::StopCine
            | Self::DownloadImage
            | Self::ResetView => Some(Surface::Viewer),

            Self::Error { .. }
            | Self::RunSequence { .. }
            | Self::DefineMacro { .. }
            | Self::PerformMacro { .. } => None,
        }
    }

    /// Wire name of the kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Filter(_) => "filter",
            Self::GoToPage { .. } => "go_to_page",
            Self::Sort { .. } => "sort",
            Self::ClearFilters => "clear_filters",
            Self::GoToMainPage => "go_to_main_page",
            Self::OpenStudy { .. } => "open_study",
            Self::OpenStudyIndex { .. } => "open_study_index",
            Self::ShowVersion => "show_version",
            Self::OpenUpload => "open_upload",
            Self::DeleteExam { .. } => "delete_exam",
            Self::Error { .. } => "error",
            Self::ChangeLayout { .. } => "change_layout",
            Self::RotateView { .. } => "rotate_view",
            Self::ZoomView { .. } => "zoom_view",
            Self::PanView { .. } => "pan_view",
            Self::PlayCine => "play_cine",
            Self::StopCine => "stop_cine",
            Self::DownloadImage => "download_image",
            Self::ResetView => "reset_view",
            Self::RunSequence { .. } => "run_sequence",
            Self::DefineMacro { .. } => "define_macro",
            Self::PerformMacro { .. } => "perform_macro",
        }
    }

    /// Whether this command belongs to `surface`'s counterpart.
    pub fn belongs_elsewhere(&self, surface: Surface) -> bool {
        self.surface().is_some_and(|s| s != surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_command_tag_and_camel_case_fields() {
        let cmd = Command::Sort {
            sort_by: "studyDate".into(),
            sort_direction: SortDirection::Descending,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "command": "sort",
                "sortBy": "studyDate",
                "sortDirection": "descending"
            })
        );
    }

    #[test]
    fn rotation_angle_serializes_as_degrees() {
        let cmd = Command::RotateView {
            direction: RotateDirection::Left,
            angle: RotationAngle::Deg270,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"angle\":270"));
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn strict_deserialize_rejects_odd_angle() {
        let err = serde_json::from_str::<Command>(
            r#"{"command":"rotate_view","direction":"left","angle":45}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn surface_tags() {
        assert_eq!(
            Command::ChangeLayout { layout: Layout::TwoByTwo }.surface(),
            Some(Surface::Viewer)
        );
        assert_eq!(Command::ClearFilters.surface(), Some(Surface::List));
        assert_eq!(
            Command::Error { message: "x".into() }.surface(),
            None
        );
        assert!(Command::PlayCine.belongs_elsewhere(Surface::List));
        assert!(!Command::PlayCine.belongs_elsewhere(Surface::Viewer));
    }

    #[test]
    fn surface_accepts_worklist_alias() {
        let s: Surface = serde_json::from_str("\"worklist\"").unwrap();
        assert_eq!(s, Surface::List);
        assert_eq!(Surface::List.other(), Surface::Viewer);
    }

    #[test]
    fn layout_names() {
        for name in ["1x1", "2x1", "2x2", "3x1"] {
            assert_eq!(Layout::from_name(name).map(Layout::as_str), Some(name));
        }
        assert!(Layout::from_name("4x4").is_none());
        assert_eq!(Layout::TwoByTwo.viewport_count(), 4);
    }
}
