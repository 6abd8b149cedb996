//! One engine session: the shared state both surfaces work against.

use std::sync::Arc;

use tracing::{debug, info};

use crate::command::{parse_command, Command, Surface};
use crate::config::EngineConfig;
use crate::entity::StudyCatalog;
use crate::error::CommandError;
use crate::handoff::{parse_query, PendingLedger, Readiness};
use crate::interpreter::{Flow, Interpreter};
use crate::macros::MacroStore;
use crate::model::{CommandModelClient, LanguageModel};
use crate::prompt::PromptBuilder;
use crate::surface::ActionSink;

/// Owns the macro store, the study catalog, the consumed-payload ledger
/// and one interpreter per surface.
pub struct Session {
    catalog: StudyCatalog,
    macros: MacroStore,
    ledger: PendingLedger,
    prompts: PromptBuilder,
    client: Option<CommandModelClient>,
    list: Interpreter,
    viewer: Interpreter,
}

impl Session {
    pub fn new(
        config: &EngineConfig,
        sink: Arc<dyn ActionSink>,
        model: Option<Arc<dyn LanguageModel>>,
        catalog: StudyCatalog,
    ) -> Self {
        let macros = MacroStore::new();
        let interpreter = |surface| {
            Interpreter::new(
                surface,
                sink.clone(),
                macros.clone(),
                config.sequencing.clone(),
            )
        };
        Self {
            list: interpreter(Surface::List),
            viewer: interpreter(Surface::Viewer),
            catalog,
            macros,
            ledger: PendingLedger::new(),
            prompts: PromptBuilder::new(config.prompt.strategy),
            client: model.map(CommandModelClient::new),
        }
    }

    pub fn catalog(&self) -> &StudyCatalog {
        &self.catalog
    }

    /// Display name of the configured model, if any.
    pub fn model_name(&self) -> Option<String> {
        self.client.as_ref().map(|c| c.model().name())
    }

    pub fn macros(&self) -> &MacroStore {
        &self.macros
    }

    pub fn interpreter(&self, surface: Surface) -> &Interpreter {
        match surface {
            Surface::List => &self.list,
            Surface::Viewer => &self.viewer,
        }
    }

    /// Build the prompt for `text` as seen from `surface`.
    pub fn prompt_for(&self, surface: Surface, text: &str) -> String {
        self.prompts.build(
            text,
            surface,
            &self.catalog.known(),
            &self.catalog.visible(),
        )
    }

    /// Natural language → validated command. No side effects.
    pub async fn interpret(&self, surface: Surface, text: &str) -> Result<Command, CommandError> {
        let client = self.client.as_ref().ok_or(CommandError::NoModelResponse)?;
        let prompt = self.prompt_for(surface, text);
        debug!(
            surface = %surface,
            strategy = ?self.prompts.strategy(),
            chars = prompt.len(),
            "Prompt built"
        );

        let value = client
            .infer(&prompt)
            .await
            .ok_or(CommandError::NoModelResponse)?;
        let command = parse_command(&value)?;
        info!(surface = %surface, kind = command.kind(), "Model produced command");
        Ok(command)
    }

    pub async fn execute(&self, surface: Surface, command: &Command) -> Result<Flow, CommandError> {
        self.interpreter(surface).execute(command).await
    }

    /// Interpret and run one instruction.
    pub async fn handle_instruction(
        &self,
        surface: Surface,
        text: &str,
    ) -> Result<Flow, CommandError> {
        let command = self.interpret(surface, text).await?;
        self.execute(surface, &command).await
    }

    /// A surface mounted with `search` as its query string. Runs any
    /// pending payload it carries, once.
    pub async fn mount(
        &self,
        surface: Surface,
        search: &str,
        readiness: &Readiness,
    ) -> Result<Flow, CommandError> {
        let query = parse_query(search);
        let Some(encoded) = query.pending_commands.as_deref() else {
            return Ok(Flow::Completed);
        };
        self.interpreter(surface)
            .resume_pending(encoded, query.pending_id.as_deref(), &self.ledger, readiness)
            .await
    }
}
