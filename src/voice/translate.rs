//! Korean → English translation ahead of prompt construction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::model::{strip_code_fence, LanguageModel};

/// Translates secondary-language text to English (dyn-compatible).
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;
}

/// Whether `text` contains Hangul jamo (U+3131–U+318E) or syllables
/// (U+AC00–U+D7A3).
pub fn contains_hangul(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{3131}'..='\u{318E}' | '\u{AC00}'..='\u{D7A3}'))
}

/// Uses the configured language model as the translator.
pub struct ModelTranslator {
    model: Arc<dyn LanguageModel>,
}

impl ModelTranslator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn run(&self, text: &str) -> anyhow::Result<String> {
        let prompt = format!(
            "Translate the following Korean instruction for a medical image viewer into natural English. \
             Keep patient names, numbers and modality codes unchanged. \
             Respond with the translation only, without quotes or explanations.\n\n{text}"
        );
        let raw = self.model.generate(&prompt).await?;
        let english = strip_code_fence(&raw).trim_matches('"').trim().to_string();
        if english.is_empty() {
            anyhow::bail!("Translation came back empty");
        }
        debug!(source = %text, english = %english, "Translated instruction");
        Ok(english)
    }
}

impl Translator for ModelTranslator {
    fn translate(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let text = text.to_string();
        Box::pin(async move { self.run(&text).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::ScriptedModel;

    #[test]
    fn hangul_detection() {
        assert!(contains_hangul("두 번째 검사 열어줘"));
        assert!(contains_hangul("ㅋㅋ"));
        assert!(contains_hangul("open 김민지"));
        assert!(!contains_hangul("open the second study"));
        assert!(!contains_hangul("開く"));
        assert!(!contains_hangul(""));
    }

    #[tokio::test]
    async fn model_translator_strips_wrapping() {
        let model = Arc::new(ScriptedModel::replying("\"Open the second study\"\n"));
        let translator = ModelTranslator::new(model.clone());
        assert_eq!(
            translator.translate("두 번째 검사 열어줘").await.unwrap(),
            "Open the second study"
        );
        assert!(model.prompts.lock().unwrap()[0].ends_with("두 번째 검사 열어줘"));
    }

    #[tokio::test]
    async fn empty_translation_is_an_error() {
        let translator = ModelTranslator::new(Arc::new(ScriptedModel::replying("  ")));
        assert!(translator.translate("검사").await.is_err());
    }
}
