//! Voice and natural-language command engine for a PACS study list and
//! image viewer.
//!
//! Free-form instructions (typed or spoken) are turned into structured
//! commands by a language model, then sequenced, macro-expanded and
//! dispatched across the two application surfaces, including the hand-off
//! of remaining steps across a navigation.

pub mod command;
pub mod config;
pub mod entity;
pub mod error;
pub mod handoff;
pub mod interpreter;
pub mod ipc;
pub mod logging;
pub mod macros;
pub mod model;
pub mod prompt;
pub mod session;
pub mod surface;
pub mod voice;

pub use command::{Command, Surface};
pub use error::CommandError;
pub use interpreter::{Flow, Interpreter};
pub use session::Session;
