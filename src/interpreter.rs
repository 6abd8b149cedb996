//! Command interpreter and cross-surface sequencer.
//!
//! Every command, single or composite, runs through the same path:
//!
//! 1. **Flatten.** Nested `run_sequence` and `perform_macro` steps are
//!    expanded in place. A `define_macro` earlier in the same sequence is
//!    visible to later performs. Cycles and over-deep nesting are skipped.
//! 2. **Split.** The first step that belongs to the other surface marks the
//!    hand-off point. Everything from there on is deferred.
//! 3. **Run the local prefix** in order. `open_study` / `open_study_index`
//!    only record a target; every dispatched action is followed by the
//!    configured step delay.
//! 4. **Navigate** once: to the recorded target, carrying the deferred steps
//!    as a pending payload if there are any.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::{Command, Surface};
use crate::config::SequencingConfig;
use crate::error::CommandError;
use crate::handoff::{self, PendingLedger, Readiness};
use crate::macros::MacroStore;
use crate::surface::{Action, ActionSink, Navigation};

/// How a command finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// All steps ran on this surface.
    Completed,
    /// The surface navigated away; remaining steps (if any) travel with it.
    Navigated(Navigation),
}

/// Executes commands on behalf of one surface.
pub struct Interpreter {
    surface: Surface,
    sink: Arc<dyn ActionSink>,
    macros: MacroStore,
    sequencing: SequencingConfig,
}

impl Interpreter {
    pub fn new(
        surface: Surface,
        sink: Arc<dyn ActionSink>,
        macros: MacroStore,
        sequencing: SequencingConfig,
    ) -> Self {
        Self {
            surface,
            sink,
            macros,
            sequencing,
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Execute one validated command.
    ///
    /// A lone command that fails (out-of-range index, unknown macro) is
    /// returned as an error. Inside a sequence, a failing step is logged and
    /// skipped instead.
    pub async fn execute(&self, command: &Command) -> Result<Flow, CommandError> {
        debug!(surface = %self.surface, kind = command.kind(), "Executing command");
        match command {
            Command::RunSequence { steps } => self.run_sequence(steps).await,
            Command::PerformMacro { macro_name } => {
                let body = self
                    .macros
                    .get(macro_name)
                    .ok_or_else(|| CommandError::UnknownMacro {
                        name: macro_name.clone(),
                    })?;
                info!(surface = %self.surface, macro_name = %macro_name, steps = body.len(), "Performing macro");
                let mut chain = vec![macro_name.clone()];
                let flat = self.flatten(&body, &mut chain);
                self.run_flat(flat, false).await
            }
            single => {
                let flat = self.flatten(std::slice::from_ref(single), &mut Vec::new());
                self.run_flat(flat, true).await
            }
        }
    }

    /// Run `steps` in order, handing off to the other surface if needed.
    pub async fn run_sequence(&self, steps: &[Command]) -> Result<Flow, CommandError> {
        info!(surface = %self.surface, steps = steps.len(), "Running sequence");
        let flat = self.flatten(steps, &mut Vec::new());
        self.run_flat(flat, false).await
    }

    /// Consume a pending payload on arrival.
    ///
    /// The payload runs at most once per ledger. Malformed or empty payloads
    /// are logged and dropped; the pending marker is cleared either way.
    pub async fn resume_pending(
        &self,
        encoded: &str,
        pending_id: Option<&str>,
        ledger: &PendingLedger,
        readiness: &Readiness,
    ) -> Result<Flow, CommandError> {
        if !ledger.claim(pending_id, encoded) {
            debug!(surface = %self.surface, "Pending payload already consumed");
            return Ok(Flow::Completed);
        }
        self.sink.dispatch(self.surface, Action::ClearPending);

        let steps = match handoff::decode_payload(encoded) {
            Ok(steps) if steps.is_empty() => {
                warn!(surface = %self.surface, "Pending payload has no usable steps");
                return Ok(Flow::Completed);
            }
            Ok(steps) => steps,
            Err(err) => {
                warn!(surface = %self.surface, "Discarding pending payload: {err}");
                return Ok(Flow::Completed);
            }
        };

        readiness.wait(self.sequencing.settle_delay()).await;
        info!(surface = %self.surface, steps = steps.len(), "Resuming handed-off steps");
        self.run_sequence(&steps).await
    }

    // -----------------------------------------------------------------------
    // Flattening
    // -----------------------------------------------------------------------

    fn flatten(&self, steps: &[Command], chain: &mut Vec<String>) -> Vec<Command> {
        let mut out = Vec::with_capacity(steps.len());
        let mut defined = HashMap::new();
        self.expand_into(steps, chain, &mut defined, &mut out);
        out
    }

    fn expand_into(
        &self,
        steps: &[Command],
        chain: &mut Vec<String>,
        defined: &mut HashMap<String, Vec<Command>>,
        out: &mut Vec<Command>,
    ) {
        for step in steps {
            match step {
                Command::RunSequence { steps } => self.expand_into(steps, chain, defined, out),
                Command::DefineMacro { macro_name, steps } => {
                    defined.insert(macro_name.clone(), steps.clone());
                    out.push(step.clone());
                }
                Command::PerformMacro { macro_name } => {
                    match self.macro_body(macro_name, chain, defined) {
                        Ok(body) => {
                            chain.push(macro_name.clone());
                            self.expand_into(&body, chain, defined, out);
                            chain.pop();
                        }
                        Err(err) => warn!(surface = %self.surface, "Skipping step: {err}"),
                    }
                }
                other => out.push(other.clone()),
            }
        }
    }

    fn macro_body(
        &self,
        name: &str,
        chain: &[String],
        defined: &HashMap<String, Vec<Command>>,
    ) -> Result<Vec<Command>, CommandError> {
        if chain.iter().any(|n| n == name) {
            return Err(CommandError::MacroCycle { name: name.into() });
        }
        if chain.len() >= self.sequencing.max_macro_depth {
            return Err(CommandError::MacroTooDeep {
                name: name.into(),
                depth: self.sequencing.max_macro_depth,
            });
        }
        defined
            .get(name)
            .cloned()
            .or_else(|| self.macros.get(name))
            .ok_or_else(|| CommandError::UnknownMacro { name: name.into() })
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    async fn run_flat(&self, steps: Vec<Command>, strict: bool) -> Result<Flow, CommandError> {
        let split = steps
            .iter()
            .position(|step| step.belongs_elsewhere(self.surface))
            .unwrap_or(steps.len());
        let (local, deferred) = steps.split_at(split);

        let mut target: Option<String> = None;
        for step in local {
            let outcome = match step {
                Command::OpenStudy { study_instance_uid } => {
                    target = Some(study_instance_uid.clone());
                    Ok(())
                }
                Command::OpenStudyIndex { index } => {
                    self.resolve_index(*index).map(|uid| target = Some(uid))
                }
                other => self.apply(other).await,
            };
            if let Err(err) = outcome {
                if strict {
                    return Err(err);
                }
                warn!(surface = %self.surface, kind = step.kind(), "Skipping step: {err}");
            }
        }

        if deferred.is_empty() {
            return Ok(match target {
                Some(uid) => self.navigate(Navigation::to_viewer(&uid, None)),
                None => Flow::Completed,
            });
        }

        let navigation = match self.surface {
            Surface::List => {
                let uid = target.ok_or(CommandError::MissingHandoffTarget {
                    deferred: deferred.len(),
                })?;
                Navigation::to_viewer(&uid, Some(handoff::encode_payload(deferred)?))
            }
            Surface::Viewer => Navigation::to_list(Some(handoff::encode_payload(deferred)?)),
        };
        info!(
            from = %self.surface,
            to = %navigation.surface,
            deferred = deferred.len(),
            "Handing off remaining steps"
        );
        Ok(self.navigate(navigation))
    }

    /// 1-based position on the visible page.
    fn resolve_index(&self, index: usize) -> Result<String, CommandError> {
        let visible = self.sink.visible_studies();
        index
            .checked_sub(1)
            .and_then(|i| visible.get(i))
            .map(|study| study.study_instance_uid.clone())
            .ok_or(CommandError::IndexOutOfRange {
                index,
                visible: visible.len(),
            })
    }

    fn navigate(&self, navigation: Navigation) -> Flow {
        info!(surface = %self.surface, url = %navigation.url, "Navigating");
        self.sink
            .dispatch(self.surface, Action::Navigate(navigation.clone()));
        Flow::Navigated(navigation)
    }

    /// Lower one local step into actions and dispatch them.
    async fn apply(&self, step: &Command) -> Result<(), CommandError> {
        let action = match step {
            Command::Filter(params) => {
                if params.is_empty() {
                    return Err(CommandError::InvalidField {
                        kind: "filter".into(),
                        field: "filter",
                        reason: "no usable filter fields".into(),
                    });
                }
                Action::ApplyFilter(params.clone())
            }
            Command::GoToPage { page_number } => Action::SetPage {
                page_number: *page_number,
            },
            Command::Sort {
                sort_by,
                sort_direction,
            } => Action::SetSort {
                sort_by: sort_by.clone(),
                sort_direction: *sort_direction,
            },
            Command::ClearFilters => Action::ClearFilters,
            Command::GoToMainPage => Action::GoToMainPage,
            Command::ShowVersion => Action::ShowVersion,
            Command::OpenUpload => Action::OpenUpload,
            Command::DeleteExam { study_instance_uid } => Action::DeleteExam {
                study_instance_uid: study_instance_uid.clone(),
            },
            Command::Error { message } => Action::Notify {
                message: message.clone(),
            },
            Command::ChangeLayout { layout } => Action::SetLayout { layout: *layout },
            Command::RotateView { direction, angle } => {
                // One dispatch per quarter turn.
                for _ in 0..angle.quarter_turns() {
                    self.emit(Action::RotateStep {
                        direction: *direction,
                    })
                    .await;
                }
                return Ok(());
            }
            Command::ZoomView {
                direction,
                intensity,
                dx,
                dy,
            } => Action::Zoom {
                direction: *direction,
                intensity: *intensity,
                dx: *dx,
                dy: *dy,
            },
            Command::PanView { dx, dy } => Action::Pan { dx: *dx, dy: *dy },
            Command::PlayCine => Action::SetCine { playing: true },
            Command::StopCine => Action::SetCine { playing: false },
            Command::DownloadImage => Action::DownloadImage,
            Command::ResetView => Action::ResetView,
            Command::DefineMacro { macro_name, steps } => {
                let replaced = self.macros.define(macro_name, steps.clone()).is_some();
                info!(macro_name = %macro_name, steps = steps.len(), replaced, "Macro defined");
                debug!(known = ?self.macros.names(), "Macro store");
                return Ok(());
            }
            Command::OpenStudy { .. }
            | Command::OpenStudyIndex { .. }
            | Command::RunSequence { .. }
            | Command::PerformMacro { .. } => {
                return Err(CommandError::NotDispatchable {
                    kind: step.kind().into(),
                })
            }
        };
        self.emit(action).await;
        Ok(())
    }

    async fn emit(&self, action: Action) {
        debug!(surface = %self.surface, ?action, "Dispatching action");
        self.sink.dispatch(self.surface, action);
        pause(self.sequencing.step_delay()).await;
    }
}

async fn pause(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
