//! Lenient validation of raw model output into [`Command`]s.
//!
//! The model is not trusted to emit exactly the right shapes, so this layer
//! applies the documented defaults (zoom direction and intensity, pan
//! offsets), drops individual optional fields that have the wrong type, and
//! only rejects a command when a required field is missing or invalid.
//! Steps nested in `run_sequence` / `define_macro` are validated one by one:
//! an invalid step is skipped with a warning, the rest are kept in order.

use serde_json::{Map, Value};
use tracing::warn;

use super::{
    Command, FilterParams, Layout, RotateDirection, RotationAngle, SortDirection, ZoomDirection,
};
use crate::error::CommandError;

type Object = Map<String, Value>;

/// Validate one JSON value as a command.
pub fn parse_command(value: &Value) -> Result<Command, CommandError> {
    let obj = value.as_object().ok_or_else(|| CommandError::Malformed {
        reason: format!("expected a JSON object, got {}", type_name(value)),
    })?;

    // `kind` is accepted as an alternate tag name.
    let kind = obj
        .get("command")
        .or_else(|| obj.get("kind"))
        .and_then(Value::as_str)
        .ok_or_else(|| CommandError::Malformed {
            reason: "missing `command` tag".into(),
        })?;

    let cmd = match kind {
        "filter" => Command::Filter(parse_filter(obj)),
        "go_to_page" => Command::GoToPage {
            page_number: positive_int(obj, kind, "pageNumber")?
                .ok_or_else(|| missing(kind, "pageNumber"))?,
        },
        "sort" => Command::Sort {
            sort_by: required_str(obj, kind, "sortBy")?,
            sort_direction: parse_sort_direction(obj, kind)?,
        },
        "clear_filters" => Command::ClearFilters,
        "go_to_main_page" => Command::GoToMainPage,
        "open_study" => Command::OpenStudy {
            study_instance_uid: required_str(obj, kind, "studyInstanceUid")?,
        },
        "open_study_index" => Command::OpenStudyIndex {
            index: positive_int(obj, kind, "index")?
                .ok_or_else(|| missing(kind, "index"))? as usize,
        },
        "show_version" => Command::ShowVersion,
        "open_upload" => Command::OpenUpload,
        "delete_exam" => Command::DeleteExam {
            study_instance_uid: required_str(obj, kind, "studyInstanceUid")?,
        },
        "error" => Command::Error {
            message: required_str(obj, kind, "message")?,
        },
        "change_layout" => {
            let name = required_str(obj, kind, "layout")?;
            let layout = Layout::from_name(&name).ok_or_else(|| CommandError::InvalidField {
                kind: kind.into(),
                field: "layout",
                reason: format!("unsupported layout {name}"),
            })?;
            Command::ChangeLayout { layout }
        }
        "rotate_view" => Command::RotateView {
            direction: parse_rotate_direction(obj, kind)?,
            angle: parse_angle(obj, kind)?,
        },
        "zoom_view" => Command::ZoomView {
            direction: match obj.get("direction").and_then(Value::as_str) {
                Some("out") => ZoomDirection::Out,
                _ => ZoomDirection::In,
            },
            intensity: match positive_int(obj, kind, "intensity") {
                Ok(Some(n)) => n,
                _ => 1,
            },
            dx: number_or_zero(obj.get("dx")),
            dy: number_or_zero(obj.get("dy")),
        },
        "pan_view" => Command::PanView {
            dx: number_or_zero(obj.get("dx")),
            dy: number_or_zero(obj.get("dy")),
        },
        "play_cine" => Command::PlayCine,
        "stop_cine" => Command::StopCine,
        "download_image" => Command::DownloadImage,
        "reset_view" => Command::ResetView,
        "run_sequence" => Command::RunSequence {
            steps: parse_steps(obj, kind)?,
        },
        "define_macro" => Command::DefineMacro {
            macro_name: required_str(obj, kind, "macroName")?,
            steps: parse_steps(obj, kind)?,
        },
        "perform_macro" => Command::PerformMacro {
            macro_name: required_str(obj, kind, "macroName")?,
        },
        other => {
            return Err(CommandError::UnknownKind {
                kind: other.to_string(),
            })
        }
    };

    Ok(cmd)
}

/// Validate a list of step values, skipping (and logging) the invalid ones.
pub fn parse_steps_lenient(values: &[Value]) -> Vec<Command> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match parse_command(v) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!(step = i + 1, error = %e, "Skipping invalid step");
                None
            }
        })
        .collect()
}

// -- field helpers --

fn parse_steps(obj: &Object, kind: &str) -> Result<Vec<Command>, CommandError> {
    match obj.get("steps") {
        Some(Value::Array(items)) => Ok(parse_steps_lenient(items)),
        Some(_) => Err(CommandError::NotAList {
            kind: kind.into(),
            field: "steps",
        }),
        None => Err(missing(kind, "steps")),
    }
}

fn parse_filter(obj: &Object) -> FilterParams {
    FilterParams {
        patient_name: optional_str(obj, "patientName"),
        description: optional_str(obj, "description"),
        modalities: match obj.get("modalities") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
            Some(Value::Array(items)) => {
                let list: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (!list.is_empty()).then_some(list)
            }
            Some(other) => {
                warn!(value = %other, "filter: ignoring invalid `modalities`");
                None
            }
        },
        study_date_range: match obj.get("studyDateRange") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => match items.as_slice() {
                [Value::String(start), Value::String(end)] => {
                    Some([start.clone(), end.clone()])
                }
                _ => {
                    warn!("filter: `studyDateRange` must hold exactly two date strings");
                    None
                }
            },
            Some(other) => {
                warn!(value = %other, "filter: ignoring invalid `studyDateRange`");
                None
            }
        },
    }
}

fn parse_sort_direction(obj: &Object, kind: &str) -> Result<SortDirection, CommandError> {
    let raw = required_str(obj, kind, "sortDirection")?;
    match raw.to_ascii_lowercase().as_str() {
        "ascending" | "asc" => Ok(SortDirection::Ascending),
        "descending" | "desc" => Ok(SortDirection::Descending),
        _ => Err(CommandError::InvalidField {
            kind: kind.into(),
            field: "sortDirection",
            reason: format!("expected ascending or descending, got {raw}"),
        }),
    }
}

fn parse_rotate_direction(obj: &Object, kind: &str) -> Result<RotateDirection, CommandError> {
    match required_str(obj, kind, "direction")?.as_str() {
        "left" => Ok(RotateDirection::Left),
        "right" => Ok(RotateDirection::Right),
        other => Err(CommandError::InvalidField {
            kind: kind.into(),
            field: "direction",
            reason: format!("expected left or right, got {other}"),
        }),
    }
}

fn parse_angle(obj: &Object, kind: &str) -> Result<RotationAngle, CommandError> {
    let value = obj.get("angle").ok_or_else(|| missing(kind, "angle"))?;
    let invalid = || CommandError::InvalidField {
        kind: kind.into(),
        field: "angle",
        reason: format!("{value} is not one of 90, 180, 270"),
    };
    let degrees = as_integer(value).ok_or_else(invalid)?;
    u16::try_from(degrees)
        .ok()
        .and_then(|d| RotationAngle::try_from(d).ok())
        .ok_or_else(invalid)
}

fn required_str(obj: &Object, kind: &str, field: &'static str) -> Result<String, CommandError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(CommandError::InvalidField {
            kind: kind.into(),
            field,
            reason: "must not be empty".into(),
        }),
        None | Some(Value::Null) => Err(missing(kind, field)),
        Some(other) => Err(CommandError::InvalidField {
            kind: kind.into(),
            field,
            reason: format!("expected a string, got {}", type_name(other)),
        }),
    }
}

fn optional_str(obj: &Object, field: &str) -> Option<String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        None | Some(Value::Null) | Some(Value::String(_)) => None,
        Some(other) => {
            warn!(field, value = %other, "filter: ignoring non-string field");
            None
        }
    }
}

/// `Ok(None)` when absent, `Err` when present but not an integer >= 1.
fn positive_int(obj: &Object, kind: &str, field: &'static str) -> Result<Option<u32>, CommandError> {
    let Some(value) = obj.get(field).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    as_integer(value)
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| CommandError::InvalidField {
            kind: kind.into(),
            field,
            reason: format!("expected a positive integer, got {value}"),
        })
}

/// Integers, integral floats (`3.0`) and integer strings (`"3"`).
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn missing(kind: &str, field: &'static str) -> CommandError {
    CommandError::MissingField {
        kind: kind.into(),
        field,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
