use crate::command::Surface;
use crate::entity::{Study, StudyCatalog};
use crate::surface::{Action, ActionSink};

use super::bridge::emit_event;
use super::EngineEvent;

/// Forwards actions to the host as `action` events. Positional lookups use
/// the last page the host reported.
#[derive(Debug, Clone)]
pub struct IpcSink {
    catalog: StudyCatalog,
}

impl IpcSink {
    pub fn new(catalog: StudyCatalog) -> Self {
        Self { catalog }
    }
}

impl ActionSink for IpcSink {
    fn dispatch(&self, surface: Surface, action: Action) {
        emit_event(&EngineEvent::Action { surface, action });
    }

    fn visible_studies(&self) -> Vec<Study> {
        self.catalog.visible()
    }
}
