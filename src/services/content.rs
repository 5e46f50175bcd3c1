use crate::core::error::GenerationError;
use crate::core::state::{TargetLength, Tone};
use crate::services::llm::{LlmClient, TextRequest};
use crate::services::prompts::{content_prompt, ContentParams, GHOST_WRITER_PERSONA};
use crate::services::retry::Retrier;
use std::sync::Arc;

/// Everything needed to write one section.
pub struct ContentBrief<'a> {
    pub book_title: &'a str,
    pub topic: &'a str,
    pub section_title: &'a str,
    pub audience: &'a str,
    pub tone: Tone,
    pub target_length: TargetLength,
}

/// Writes section prose. Only used for standard books.
pub struct ContentGenerator {
    llm: Arc<dyn LlmClient>,
    retrier: Retrier,
    language: String,
}

impl ContentGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, retrier: Retrier, language: impl Into<String>) -> Self {
        Self {
            llm,
            retrier,
            language: language.into(),
        }
    }

    pub async fn generate(&self, brief: &ContentBrief<'_>) -> Result<String, GenerationError> {
        let request = TextRequest {
            prompt: content_prompt(&ContentParams {
                book_title: brief.book_title,
                topic: brief.topic,
                section_title: brief.section_title,
                audience: brief.audience,
                tone: brief.tone,
                length: brief.target_length,
                language: &self.language,
            }),
            system: Some(GHOST_WRITER_PERSONA.to_string()),
            schema: None,
        };

        log::debug!("Writing section \"{}\"", brief.section_title);
        let text = self.retrier.call(|| self.llm.generate(&request)).await?;
        Ok(text.trim().to_string())
    }
}
