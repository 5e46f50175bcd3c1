use crate::core::error::GenerationError;
use crate::core::state::{BookMode, SectionStub, TargetLength, Tone};
use crate::services::llm::{LlmClient, TextRequest};
use crate::services::prompts::{outline_prompt, stub_count, OutlineParams};
use crate::services::retry::Retrier;
use crate::utils::text::strip_code_blocks;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
struct OutlineResponse {
    sections: Vec<SectionStub>,
}

/// JSON schema of an outline with exactly `count` entries.
pub fn outline_schema(count: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "sections": {
                "type": "array",
                "minItems": count,
                "maxItems": count,
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "Title of the chapter or coloring page."
                        },
                        "description": {
                            "type": "string",
                            "description": "One-sentence summary of what the chapter or page is about."
                        }
                    },
                    "required": ["title", "description"]
                }
            }
        },
        "required": ["sections"]
    })
}

pub fn parse_outline(body: &str) -> Result<Vec<SectionStub>, GenerationError> {
    let cleaned = strip_code_blocks(body);
    serde_json::from_str::<OutlineResponse>(&cleaned)
        .map(|r| r.sections)
        .map_err(|e| GenerationError::Parse {
            reason: e.to_string(),
            body: body.to_string(),
        })
}

pub struct OutlineGenerator {
    llm: Arc<dyn LlmClient>,
    retrier: Retrier,
    language: String,
}

impl OutlineGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, retrier: Retrier, language: impl Into<String>) -> Self {
        Self {
            llm,
            retrier,
            language: language.into(),
        }
    }

    pub async fn generate(
        &self,
        topic: &str,
        audience: &str,
        tone: Tone,
        target_length: TargetLength,
        mode: BookMode,
    ) -> Result<Vec<SectionStub>, GenerationError> {
        let count = stub_count(target_length, mode);
        let request = TextRequest {
            prompt: outline_prompt(&OutlineParams {
                topic,
                audience,
                tone,
                mode,
                count,
                language: &self.language,
            }),
            system: None,
            schema: Some(outline_schema(count)),
        };

        log::info!("Requesting outline with {} entries ({:?} mode)", count, mode);
        let body = self.retrier.call(|| self.llm.generate(&request)).await?;
        let stubs = parse_outline(&body)?;
        if stubs.len() != count {
            log::warn!("Outline has {} entries, expected {}", stubs.len(), count);
        }
        Ok(stubs)
    }
}
