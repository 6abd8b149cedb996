use std::fmt;

/// Why a command (or one step of a sequence) was rejected.
///
/// Rejections are local and non-fatal: the interpreter logs them, skips the
/// offending step and carries on with the rest of the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Model output was not a JSON object or had no kind tag.
    Malformed { reason: String },
    UnknownKind { kind: String },
    MissingField { kind: String, field: &'static str },
    InvalidField {
        kind: String,
        field: &'static str,
        reason: String,
    },
    /// A structural field (`steps`) was not a list.
    NotAList { kind: String, field: &'static str },
    UnknownMacro { name: String },
    MacroCycle { name: String },
    MacroTooDeep { name: String, depth: usize },
    IndexOutOfRange { index: usize, visible: usize },
    /// Steps for the viewer were queued but nothing opened a study.
    MissingHandoffTarget { deferred: usize },
    InvalidPayload { reason: String },
    NotDispatchable { kind: String },
    /// The model call failed or returned nothing usable.
    NoModelResponse,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Malformed { reason } => write!(f, "Malformed command: {reason}"),
            CommandError::UnknownKind { kind } => write!(f, "Unknown command kind: {kind}"),
            CommandError::MissingField { kind, field } => {
                write!(f, "{kind}: missing required field `{field}`")
            }
            CommandError::InvalidField {
                kind,
                field,
                reason,
            } => write!(f, "{kind}: invalid `{field}`: {reason}"),
            CommandError::NotAList { kind, field } => {
                write!(f, "{kind}: `{field}` must be a list")
            }
            CommandError::UnknownMacro { name } => write!(f, "Macro not defined: {name}"),
            CommandError::MacroCycle { name } => {
                write!(f, "Macro {name} invokes itself (cycle rejected)")
            }
            CommandError::MacroTooDeep { name, depth } => {
                write!(f, "Macro {name} exceeds nesting depth {depth}")
            }
            CommandError::IndexOutOfRange { index, visible } => {
                write!(f, "Study index {index} is outside the visible range 1..={visible}")
            }
            CommandError::MissingHandoffTarget { deferred } => write!(
                f,
                "{deferred} viewer step(s) need an open study but none was selected"
            ),
            CommandError::InvalidPayload { reason } => {
                write!(f, "Invalid pending payload: {reason}")
            }
            CommandError::NotDispatchable { kind } => {
                write!(f, "{kind} cannot be dispatched directly")
            }
            CommandError::NoModelResponse => write!(f, "The language model returned no command"),
        }
    }
}

impl std::error::Error for CommandError {}
