//! Prompt assembly for the command model.
//!
//! A prompt is built from, in order:
//! 1. the surface's command taxonomy and few-shot examples,
//! 2. a best-guess entity block from the fuzzy resolver (optional),
//! 3. the visible studies with their 1-based positions (optional,
//!    `contextual` strategy only),
//! 4. the user's instruction.
//!
//! Building is deterministic and side-effect free.

mod fewshot;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::command::Surface;
use crate::entity::{self, ResolveOptions, Study};

/// Which generation of the builder to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStrategy {
    /// Few-shot block, strict best-guess matches, instruction.
    Basic,
    /// Adds the visible-studies block and relaxes name matching.
    #[default]
    Contextual,
}

impl PromptStrategy {
    fn resolve_options(self) -> ResolveOptions {
        match self {
            Self::Basic => entity::STRICT,
            Self::Contextual => entity::RELAXED,
        }
    }

    fn includes_visible(self) -> bool {
        matches!(self, Self::Contextual)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    strategy: PromptStrategy,
}

impl PromptBuilder {
    pub fn new(strategy: PromptStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> PromptStrategy {
        self.strategy
    }

    pub fn build(
        &self,
        instruction: &str,
        surface: Surface,
        known: &[Study],
        visible: &[Study],
    ) -> String {
        let instruction = instruction.trim();
        let mut sections = vec![taxonomy_block(surface)];

        if let Some(block) = best_guess_block(instruction, known, &self.strategy.resolve_options()) {
            sections.push(block);
        }
        if self.strategy.includes_visible() {
            if let Some(block) = visible_block(visible) {
                sections.push(block);
            }
        }
        sections.push(format!("User: {instruction}\nResponse:"));

        sections.join("\n\n")
    }
}

/// Taxonomy + few-shot block for a surface.
pub fn taxonomy_block(surface: Surface) -> String {
    match surface {
        Surface::List => format!(
            "{}\n\n{}\n\n{}\n\n{}\n\n{}\n\n### Examples\n\n{}\n\n{}",
            fewshot::LIST_PREAMBLE,
            fewshot::LIST_COMMANDS,
            fewshot::VIEWER_COMMANDS,
            fewshot::SHARED_COMMANDS,
            fewshot::RESPONSE_RULES,
            fewshot::LIST_EXAMPLES,
            fewshot::VIEWER_EXAMPLES,
        ),
        Surface::Viewer => format!(
            "{}\n\n{}\n\n{}\n\n{}\n\n### Examples\n\n{}",
            fewshot::VIEWER_PREAMBLE,
            fewshot::VIEWER_COMMANDS,
            fewshot::SHARED_COMMANDS,
            fewshot::RESPONSE_RULES,
            fewshot::VIEWER_EXAMPLES,
        ),
    }
}

fn study_line(study: &Study) -> String {
    json!({
        "patientName": study.patient_name,
        "studyInstanceUid": study.study_instance_uid,
    })
    .to_string()
}

fn best_guess_block(instruction: &str, known: &[Study], options: &ResolveOptions) -> Option<String> {
    let matches = entity::resolve_with(instruction, known, options);
    if matches.is_empty() {
        return None;
    }

    let list = matches
        .iter()
        .map(|m| format!("  {}", study_line(m.study)))
        .collect::<Vec<_>>()
        .join(",\n");

    Some(format!(
        "### Context:\nHere are possible matching studies.\nPick the one whose patientName best matches the user's instruction (spelling/pronunciation).\n\n[\n{list}\n]"
    ))
}

fn visible_block(visible: &[Study]) -> Option<String> {
    if visible.is_empty() {
        return None;
    }

    let rows = visible
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, study_line(s)))
        .collect::<Vec<_>>()
        .join("\n");
    let n = visible.len();

    Some(format!(
        "### Visible studies (current page, 1-based index):\n{rows}\n\nWhen the user refers to a study by position (\"the first one\", \"number 3\"), respond with open_study_index using that index. Only indexes 1 to {n} are valid. If the requested index is outside 1 to {n}, respond with {{ \"command\": \"error\", \"message\": \"...\" }} instead."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<Study> {
        vec![
            Study::new("1.1", "Neptune"),
            Study::new("1.2", "Horse"),
            Study::new("1.3", "Kim Minji"),
        ]
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let builder = PromptBuilder::new(PromptStrategy::Contextual);
        let visible = known();
        let prompt = builder.build("neptun", Surface::List, &known(), &visible);

        let taxonomy = prompt.find("Supported commands").unwrap();
        let context = prompt.find("### Context:").unwrap();
        let visible_at = prompt.find("### Visible studies").unwrap();
        let user = prompt.find("User: neptun").unwrap();
        assert!(taxonomy < context && context < visible_at && visible_at < user);
        assert!(prompt.ends_with("User: neptun\nResponse:"));
    }

    #[test]
    fn best_guess_block_lists_matches_only() {
        let builder = PromptBuilder::new(PromptStrategy::Basic);
        let prompt = builder.build("neptune", Surface::List, &known(), &[]);
        assert!(prompt.contains(r#""studyInstanceUid":"1.1""#));
        assert!(!prompt.contains(r#""studyInstanceUid":"1.2""#));
    }

    #[test]
    fn no_context_block_without_matches() {
        let builder = PromptBuilder::default();
        let prompt = builder.build("reset the view", Surface::Viewer, &known(), &[]);
        assert!(!prompt.contains("### Context:"));
        assert!(!prompt.contains("### Visible studies"));
    }

    #[test]
    fn visible_block_is_one_based_and_states_the_bound() {
        let builder = PromptBuilder::new(PromptStrategy::Contextual);
        let visible = known();
        let prompt = builder.build("open the second one", Surface::List, &[], &visible);
        assert!(prompt.contains(r#"1. {"patientName":"Neptune","studyInstanceUid":"1.1"}"#));
        assert!(prompt.contains(r#"3. {"patientName":"Kim Minji","studyInstanceUid":"1.3"}"#));
        assert!(prompt.contains("Only indexes 1 to 3 are valid"));
        assert!(prompt.contains("\"command\": \"error\""));
    }

    #[test]
    fn basic_strategy_omits_visible_block() {
        let builder = PromptBuilder::new(PromptStrategy::Basic);
        let visible = known();
        let prompt = builder.build("open the second one", Surface::List, &[], &visible);
        assert!(!prompt.contains("### Visible studies"));
    }

    #[test]
    fn list_taxonomy_is_superset_of_viewer() {
        let list = taxonomy_block(Surface::List);
        let viewer = taxonomy_block(Surface::Viewer);
        for kind in ["change_layout", "rotate_view", "zoom_view", "run_sequence", "perform_macro"] {
            assert!(list.contains(kind), "{kind}");
            assert!(viewer.contains(kind), "{kind}");
        }
        assert!(list.contains("open_study_index"));
        assert!(!viewer.contains("open_study_index"));
    }

    #[test]
    fn build_is_deterministic() {
        let builder = PromptBuilder::default();
        let visible = known();
        let a = builder.build("horse", Surface::List, &known(), &visible);
        let b = builder.build("horse", Surface::List, &known(), &visible);
        assert_eq!(a, b);
    }
}
