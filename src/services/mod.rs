pub mod content;
pub mod cover;
pub mod imagen;
pub mod images;
pub mod llm;
pub mod outline;
pub mod prompts;
pub mod retry;
pub mod workflow;

use crate::core::config::Config;
use anyhow::Result;
use imagen::{create_image_provider, ImageProvider};
use llm::{create_llm, LlmClient, LlmRole};
use retry::{Sleeper, TokioSleeper};
use std::sync::Arc;

/// Remote capabilities the workflow depends on.
#[derive(Clone)]
pub struct Providers {
    pub outline_llm: Arc<dyn LlmClient>,
    pub content_llm: Arc<dyn LlmClient>,
    pub images: Arc<dyn ImageProvider>,
    pub sleeper: Arc<dyn Sleeper>,
}

pub fn create_providers(config: &Config) -> Result<Providers> {
    Ok(Providers {
        outline_llm: Arc::from(create_llm(&config.llm, LlmRole::Outline)?),
        content_llm: Arc::from(create_llm(&config.llm, LlmRole::Content)?),
        images: Arc::from(create_image_provider(&config.images)?),
        sleeper: Arc::new(TokioSleeper),
    })
}
