use crate::core::config::Config;
use crate::core::error::{GenerationError, LayoutError};
use crate::core::io::Storage;
use crate::core::session::SessionStore;
use crate::core::state::{
    is_valid_body_font_size, BookMode, BookProject, FontFamily, Image, Section, SectionStub,
    Session, Stage, TargetLength, Tone, BODY_FONT_SIZES,
};
use crate::layout::pdf::PdfRenderer;
use crate::layout::LayoutEngine;
use crate::services::content::{ContentBrief, ContentGenerator};
use crate::services::cover::{CoverCompositor, CoverStyle};
use crate::services::images::ImageGenerator;
use crate::services::outline::OutlineGenerator;
use crate::services::prompts::{cover_prompt, illustration_prompt};
use crate::services::retry::{Retrier, RetryPolicy};
use crate::services::Providers;
use crate::utils::text::output_file_name;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the user fills in on the first stage.
#[derive(Debug, Clone, PartialEq)]
pub struct BookIdea {
    pub title: String,
    pub author: String,
    pub topic: String,
    pub audience: String,
    pub tone: Tone,
    pub target_length: TargetLength,
    pub mode: BookMode,
    pub font_family: FontFamily,
    pub font_size: f32,
}

impl BookIdea {
    /// Prefills the form from the current project.
    pub fn from_project(project: &BookProject) -> Self {
        Self {
            title: project.title.clone(),
            author: project.author.clone(),
            topic: project.topic.clone(),
            audience: project.audience.clone(),
            tone: project.tone,
            target_length: project.target_length,
            mode: project.mode,
            font_family: project.font_family,
            font_size: project.font_size,
        }
    }
}

/// Per-section events emitted while writing content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentProgress {
    Started { index: usize, total: usize, title: String },
    Skipped { index: usize, total: usize, title: String },
    Finished { index: usize, total: usize, title: String },
}

pub struct WorkflowManager {
    session: Session,
    store: SessionStore,
    outline: OutlineGenerator,
    content: ContentGenerator,
    images: ImageGenerator,
    cover: CoverCompositor,
    layout: LayoutEngine,
}

impl WorkflowManager {
    /// Builds the manager and restores the last saved session.
    pub async fn new(config: Config, providers: Providers, storage: Arc<dyn Storage>) -> Result<Self> {
        let store = SessionStore::new(storage);
        let session = store.load().await?;
        log::info!("Resuming at the {} stage", session.stage);

        let retrier = Retrier::new(RetryPolicy::from_config(&config.llm), providers.sleeper.clone());
        Ok(Self {
            session,
            store,
            outline: OutlineGenerator::new(providers.outline_llm, retrier.clone(), config.language.clone()),
            content: ContentGenerator::new(providers.content_llm, retrier.clone(), config.language.clone()),
            images: ImageGenerator::new(
                providers.images,
                retrier,
                providers.sleeper,
                config.images.batch_size,
                config.images.batch_pause(),
            ),
            cover: CoverCompositor::new(config.cover.clone()),
            layout: LayoutEngine::new(config.layout.clone()),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    pub fn project(&self) -> &BookProject {
        &self.session.project
    }

    /// Whether cover text can be drawn with the configured fonts.
    pub fn has_cover_fonts(&self) -> bool {
        self.cover.has_fonts()
    }

    async fn save(&self) -> Result<(), GenerationError> {
        self.store
            .save(&self.session)
            .await
            .map_err(GenerationError::Storage)
    }

    fn require_stage(&self, expected: Stage) -> Result<(), GenerationError> {
        if self.session.stage != expected {
            return Err(GenerationError::precondition(
                self.session.stage,
                format!("this step belongs to the {} stage", expected),
            ));
        }
        Ok(())
    }

    fn section_index(&self, index: usize) -> Result<usize, GenerationError> {
        let count = self.session.project.sections.len();
        if index >= count {
            return Err(GenerationError::InvalidRequest(format!(
                "section {} does not exist (the book has {})",
                index + 1,
                count
            )));
        }
        Ok(index)
    }

    async fn set_stage(&mut self, stage: Stage) -> Result<(), GenerationError> {
        log::info!("Stage {} -> {}", self.session.stage, stage);
        self.session.stage = stage;
        self.save().await
    }

    /// Idea -> Outline. Nothing is committed unless the outline succeeds.
    pub async fn submit_idea(&mut self, idea: BookIdea) -> Result<(), GenerationError> {
        self.require_stage(Stage::Idea)?;
        if idea.topic.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("the topic is empty".to_string()));
        }
        if !is_valid_body_font_size(idea.font_size) {
            return Err(GenerationError::InvalidRequest(format!(
                "font size {} is outside {}-{} pt",
                idea.font_size,
                BODY_FONT_SIZES[0],
                BODY_FONT_SIZES[4]
            )));
        }

        let stubs = self
            .outline
            .generate(
                &idea.topic,
                &idea.audience,
                idea.tone,
                idea.target_length,
                idea.mode,
            )
            .await?;
        if stubs.is_empty() {
            return Err(GenerationError::EmptyOutline);
        }

        let project = &mut self.session.project;
        project.title = idea.title;
        project.author = idea.author;
        project.topic = idea.topic;
        project.audience = idea.audience;
        project.tone = idea.tone;
        project.target_length = idea.target_length;
        project.mode = idea.mode;
        project.font_family = idea.font_family;
        project.font_size = idea.font_size;
        project.sections = stubs.into_iter().map(Section::from_stub).collect();
        project.cover_prompt = cover_prompt(project);

        self.set_stage(Stage::Outline).await
    }

    /// Outline -> Content. Applies in-place edits, then writes every
    /// standard section that has no content yet, in order. Results are only
    /// committed once every section succeeded.
    pub async fn confirm_outline(
        &mut self,
        edits: Vec<SectionStub>,
        on_progress: &mut dyn FnMut(&ContentProgress),
    ) -> Result<(), GenerationError> {
        self.require_stage(Stage::Outline)?;
        let project = &self.session.project;
        if edits.len() != project.sections.len() {
            return Err(GenerationError::precondition(
                Stage::Outline,
                format!(
                    "expected {} outline entries, got {}",
                    project.sections.len(),
                    edits.len()
                ),
            ));
        }

        let mut sections = project.sections.clone();
        for (section, edit) in sections.iter_mut().zip(edits) {
            section.title = edit.title;
            section.description = edit.description;
        }

        if project.mode == BookMode::Standard {
            let total = sections.len();
            for (index, section) in sections.iter_mut().enumerate() {
                let title = section.title.clone();
                if !section.content.trim().is_empty() {
                    on_progress(&ContentProgress::Skipped { index, total, title });
                    continue;
                }
                on_progress(&ContentProgress::Started {
                    index,
                    total,
                    title: title.clone(),
                });
                section.content = self
                    .content
                    .generate(&ContentBrief {
                        book_title: &project.title,
                        topic: &project.topic,
                        section_title: &section.title,
                        audience: &project.audience,
                        tone: project.tone,
                        target_length: project.target_length,
                    })
                    .await?;
                on_progress(&ContentProgress::Finished { index, total, title });
            }
        }

        self.session.project.sections = sections;
        self.set_stage(Stage::Content).await
    }

    /// Generates illustration candidates for one section. Nothing is stored
    /// until the user selects a candidate.
    pub async fn generate_section_images(&self, index: usize, count: u32) -> Result<Vec<Image>, GenerationError> {
        self.require_stage(Stage::Content)?;
        let index = self.section_index(index)?;
        let project = &self.session.project;
        let prompt = illustration_prompt(project, &project.sections[index]);
        self.images.generate_many(&prompt, count).await
    }

    pub async fn select_image(&mut self, index: usize, image: Image) -> Result<(), GenerationError> {
        self.require_stage(Stage::Content)?;
        let index = self.section_index(index)?;
        let mode = self.session.project.mode;
        self.session.project.sections[index].toggle_image(mode, image);
        self.save().await
    }

    pub async fn upload_image(&mut self, index: usize, image: Image) -> Result<(), GenerationError> {
        self.require_stage(Stage::Content)?;
        let index = self.section_index(index)?;
        let mode = self.session.project.mode;
        self.session.project.sections[index].add_upload(mode, image);
        self.save().await
    }

    /// Content -> Cover. Books without illustrations are allowed.
    pub async fn advance_to_cover(&mut self) -> Result<(), GenerationError> {
        self.require_stage(Stage::Content)?;
        self.set_stage(Stage::Cover).await
    }

    /// Generates a cover base image and remembers the prompt that produced it.
    pub async fn generate_cover_art(&mut self, prompt: &str) -> Result<Image, GenerationError> {
        self.require_stage(Stage::Cover)?;
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("the cover prompt is empty".to_string()));
        }
        let image = self.images.generate_one(prompt).await?;
        self.session.project.cover_prompt = prompt.to_string();
        self.save().await?;
        Ok(image)
    }

    /// Cover -> Download. Standard books with a style get their title and
    /// author drawn over the base; otherwise the base is used as is.
    pub async fn submit_cover(
        &mut self,
        prompt: &str,
        base: Option<Image>,
        style: Option<&CoverStyle>,
    ) -> Result<(), GenerationError> {
        self.require_stage(Stage::Cover)?;
        let base = base.ok_or_else(|| {
            GenerationError::precondition(Stage::Cover, "a base cover image is required")
        })?;

        let project = &self.session.project;
        let cover = match (project.mode, style) {
            (BookMode::Standard, Some(style)) => self
                .cover
                .compose(&base, &project.title, &project.author, style)
                .map_err(GenerationError::Cover)?,
            _ => base,
        };

        self.session.project.cover_prompt = prompt.to_string();
        self.session.project.cover_image = Some(cover);
        self.set_stage(Stage::Download).await
    }

    /// Returns to an earlier stage, keeping everything accepted so far.
    pub async fn go_back(&mut self, stage: Stage) -> Result<(), GenerationError> {
        if stage >= self.session.stage {
            return Err(GenerationError::precondition(
                self.session.stage,
                format!("{} is not an earlier stage", stage),
            ));
        }
        self.set_stage(stage).await
    }

    /// Lays out and writes the PDF, returning its path. Can be repeated.
    pub async fn download(&self, output_dir: &Path) -> Result<PathBuf, GenerationError> {
        self.require_stage(Stage::Download)?;
        let project = self.session.project.clone();
        let config = self.layout.config().clone();
        let path = output_dir.join(output_file_name(&project.title));

        // Image re-encoding is CPU bound; keep it off the async workers.
        let (bytes, pages) = tokio::task::spawn_blocking(move || {
            let document = LayoutEngine::new(config).layout(&project);
            let pages = document.pages.len();
            PdfRenderer::new().render(&document).map(|bytes| (bytes, pages))
        })
        .await
        .map_err(|e| LayoutError::Io(std::io::Error::other(e)))??;

        tokio::fs::write(&path, bytes).await.map_err(LayoutError::from)?;
        log::info!("Wrote {} pages to {}", pages, path.display());
        Ok(path)
    }

    /// Drops all progress and deletes the saved snapshot.
    pub async fn reset(&mut self) -> Result<(), GenerationError> {
        self.session.reset();
        self.store.clear().await.map_err(GenerationError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ProviderError;
    use crate::core::io::NativeStorage;
    use crate::services::imagen::ImageProvider;
    use crate::services::llm::{LlmClient, TextRequest};
    use crate::services::outline::tests::outline_body;
    use crate::services::retry::tests::RecordingSleeper;
    use crate::utils::image::tests::png_bytes;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct MockLlm {
        outline_calls: Mutex<usize>,
        content_calls: Mutex<usize>,
        empty_outline: bool,
        rate_limited: bool,
        fail_on_content_call: Option<usize>,
    }

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn generate(&self, request: &TextRequest) -> Result<String, ProviderError> {
            if self.rate_limited {
                return Err(ProviderError::rate_limited("RESOURCE_EXHAUSTED"));
            }
            if let Some(schema) = &request.schema {
                *self.outline_calls.lock().unwrap() += 1;
                if self.empty_outline {
                    return Ok(r#"{"sections": []}"#.to_string());
                }
                let count = schema["properties"]["sections"]["maxItems"].as_u64().unwrap() as usize;
                return Ok(outline_body(count));
            }

            let mut calls = self.content_calls.lock().unwrap();
            *calls += 1;
            if self.fail_on_content_call == Some(*calls) {
                return Err(ProviderError::Other(anyhow::anyhow!("model overloaded")));
            }
            Ok(format!("Prose number {}.", *calls))
        }
    }

    #[derive(Default)]
    struct PngProvider {
        calls: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl ImageProvider for PngProvider {
        async fn generate_images(&self, _prompt: &str, count: u32) -> Result<Vec<Image>, ProviderError> {
            self.calls.lock().unwrap().push(count);
            Ok((0..count)
                .map(|i| Image::from_encoded("image/png", png_bytes(40 + i, 30)).unwrap())
                .collect())
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        llm: Arc<MockLlm>,
        images: Arc<PngProvider>,
        sleeper: Arc<RecordingSleeper>,
    }

    impl Harness {
        fn new(llm: MockLlm) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                llm: Arc::new(llm),
                images: Arc::new(PngProvider::default()),
                sleeper: Arc::new(RecordingSleeper::default()),
            }
        }

        async fn manager(&self) -> WorkflowManager {
            let config = Config::parse(
                r#"
llm:
  provider: gemini
images:
  provider: gemini
"#,
            )
            .unwrap();
            let providers = Providers {
                outline_llm: self.llm.clone(),
                content_llm: self.llm.clone(),
                images: self.images.clone(),
                sleeper: self.sleeper.clone(),
            };
            let storage = Arc::new(NativeStorage::new(self.dir.path().join("build")));
            WorkflowManager::new(config, providers, storage).await.unwrap()
        }
    }

    fn idea(mode: BookMode, target_length: TargetLength) -> BookIdea {
        BookIdea {
            title: "Night Sky".to_string(),
            author: "R. Stone".to_string(),
            topic: "Stars and planets".to_string(),
            audience: "Teens".to_string(),
            tone: Tone::Inspiring,
            target_length,
            mode,
            font_family: FontFamily::SansSerif,
            font_size: 12.0,
        }
    }

    fn stubs(manager: &WorkflowManager) -> Vec<SectionStub> {
        manager
            .project()
            .sections
            .iter()
            .map(|s| SectionStub {
                title: s.title.clone(),
                description: s.description.clone(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_standard_book_end_to_end() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;

        manager.submit_idea(idea(BookMode::Standard, TargetLength::Short)).await.unwrap();
        assert_eq!(manager.stage(), Stage::Outline);
        assert_eq!(manager.project().sections.len(), 4);
        assert!(manager.project().cover_prompt.contains("ethereal"));

        let mut edits = stubs(&manager);
        edits[0].title = "Looking Up".to_string();
        let mut events = Vec::new();
        manager
            .confirm_outline(edits, &mut |p: &ContentProgress| events.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(manager.stage(), Stage::Content);
        assert_eq!(events.len(), 8);
        assert_eq!(
            events[0],
            ContentProgress::Started {
                index: 0,
                total: 4,
                title: "Looking Up".to_string()
            }
        );
        let contents: Vec<_> = manager.project().sections.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Prose number 1.", "Prose number 2.", "Prose number 3.", "Prose number 4."]
        );

        let candidates = manager.generate_section_images(0, 2).await.unwrap();
        assert_eq!(candidates.len(), 2);
        manager.select_image(0, candidates[1].clone()).await.unwrap();
        assert_eq!(manager.project().sections[0].images, vec![candidates[1].clone()]);

        manager.advance_to_cover().await.unwrap();
        let base = manager.generate_cover_art("A starry sky").await.unwrap();
        assert_eq!(manager.project().cover_prompt, "A starry sky");
        manager.submit_cover("A starry sky", Some(base.clone()), None).await.unwrap();
        assert_eq!(manager.stage(), Stage::Download);
        assert_eq!(manager.project().cover_image, Some(base));

        let out = harness.dir.path().join("output");
        std::fs::create_dir_all(&out).unwrap();
        let path = manager.download(&out).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "Night_Sky.pdf");

        // Cover, table of contents and one page per short section.
        let pdf = lopdf::Document::load_mem(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(pdf.get_pages().len(), 6);

        // Downloading again is allowed.
        assert!(manager.download(&out).await.is_ok());
    }

    #[tokio::test]
    async fn test_coloring_book_end_to_end() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;

        manager.submit_idea(idea(BookMode::Coloring, TargetLength::Short)).await.unwrap();
        assert_eq!(manager.project().sections.len(), 10);
        assert!(manager.project().cover_prompt.contains("no shading"));

        let edits = stubs(&manager);
        manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await.unwrap();
        assert_eq!(*harness.llm.content_calls.lock().unwrap(), 0);
        assert!(manager.project().sections.iter().all(|s| s.content.is_empty()));

        let candidates = manager.generate_section_images(1, 6).await.unwrap();
        assert_eq!(*harness.images.calls.lock().unwrap(), vec![4, 2]);
        assert_eq!(harness.sleeper.recorded(), vec![Duration::from_secs(1)]);
        for image in &candidates[..3] {
            manager.select_image(1, image.clone()).await.unwrap();
        }
        assert_eq!(manager.project().sections[1].images.len(), 3);

        manager.advance_to_cover().await.unwrap();
        let style = CoverStyle::default();
        // Coloring covers bypass text compositing, so no font is needed.
        manager
            .submit_cover("cover", Some(candidates[5].clone()), Some(&style))
            .await
            .unwrap();
        assert_eq!(manager.project().cover_image, Some(candidates[5].clone()));

        let path = manager.download(harness.dir.path()).await.unwrap();
        let pdf = lopdf::Document::load_mem(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(pdf.get_pages().len(), 1 + 3);
    }

    #[tokio::test]
    async fn test_content_generation_is_idempotent() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        manager.submit_idea(idea(BookMode::Standard, TargetLength::Short)).await.unwrap();
        let edits = stubs(&manager);
        manager.confirm_outline(edits.clone(), &mut |_: &ContentProgress| {}).await.unwrap();
        let before: Vec<_> = manager.project().sections.iter().map(|s| s.content.clone()).collect();

        manager.go_back(Stage::Outline).await.unwrap();
        let mut skipped = 0;
        manager
            .confirm_outline(edits, &mut |p: &ContentProgress| {
                if matches!(p, ContentProgress::Skipped { .. }) {
                    skipped += 1;
                }
            })
            .await
            .unwrap();

        let after: Vec<_> = manager.project().sections.iter().map(|s| s.content.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(skipped, 4);
        assert_eq!(*harness.llm.content_calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_content_failure_commits_nothing() {
        let harness = Harness::new(MockLlm {
            fail_on_content_call: Some(3),
            ..Default::default()
        });
        let mut manager = harness.manager().await;
        manager.submit_idea(idea(BookMode::Standard, TargetLength::Short)).await.unwrap();
        let mut edits = stubs(&manager);
        edits[0].title = "Renamed".to_string();

        let result = manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await;

        assert!(matches!(result, Err(GenerationError::Provider(_))));
        assert_eq!(manager.stage(), Stage::Outline);
        assert!(manager.project().sections.iter().all(|s| s.content.is_empty()));
        assert_eq!(manager.project().sections[0].title, "Part 1");

        // The saved snapshot matches the in-memory state.
        let reloaded = harness.manager().await;
        assert_eq!(reloaded.session(), manager.session());
    }

    #[tokio::test]
    async fn test_outline_edit_count_must_match() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        manager.submit_idea(idea(BookMode::Standard, TargetLength::Short)).await.unwrap();
        let mut edits = stubs(&manager);
        edits.pop();

        let result = manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await;
        assert!(matches!(result, Err(GenerationError::Precondition { .. })));
        assert_eq!(*harness.llm.content_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_outline_leaves_project_untouched() {
        let harness = Harness::new(MockLlm {
            empty_outline: true,
            ..Default::default()
        });
        let mut manager = harness.manager().await;

        let result = manager.submit_idea(idea(BookMode::Standard, TargetLength::Medium)).await;

        assert!(matches!(result, Err(GenerationError::EmptyOutline)));
        assert_eq!(manager.stage(), Stage::Idea);
        assert_eq!(manager.project(), &BookProject::default());
    }

    #[tokio::test]
    async fn test_rate_limited_outline_reports_distinct_message() {
        let harness = Harness::new(MockLlm {
            rate_limited: true,
            ..Default::default()
        });
        let mut manager = harness.manager().await;

        let err = manager
            .submit_idea(idea(BookMode::Standard, TargetLength::Medium))
            .await
            .unwrap_err();

        assert!(err.is_rate_limit());
        assert!(err.user_message().contains("rate limit"));
        assert_eq!(
            harness.sleeper.recorded(),
            vec![Duration::from_millis(5000), Duration::from_millis(10000)]
        );
        assert_eq!(manager.stage(), Stage::Idea);
    }

    #[tokio::test]
    async fn test_submit_cover_requires_base_image() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        manager.submit_idea(idea(BookMode::Coloring, TargetLength::Short)).await.unwrap();
        let edits = stubs(&manager);
        manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await.unwrap();
        manager.advance_to_cover().await.unwrap();

        let result = manager.submit_cover("prompt", None, None).await;
        assert!(matches!(
            result,
            Err(GenerationError::Precondition {
                stage: Stage::Cover,
                ..
            })
        ));
        assert_eq!(manager.stage(), Stage::Cover);
    }

    #[tokio::test]
    async fn test_go_back_keeps_data_and_resume_restores_stage() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        manager.submit_idea(idea(BookMode::Standard, TargetLength::Short)).await.unwrap();
        let edits = stubs(&manager);
        manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await.unwrap();

        assert!(manager.go_back(Stage::Cover).await.is_err());
        manager.go_back(Stage::Idea).await.unwrap();
        assert_eq!(manager.project().sections.len(), 4);
        assert!(!manager.project().sections[0].content.is_empty());

        let resumed = harness.manager().await;
        assert_eq!(resumed.stage(), Stage::Idea);
        assert_eq!(resumed.project(), manager.project());
    }

    #[tokio::test]
    async fn test_reset_clears_session_and_snapshot() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        manager.submit_idea(idea(BookMode::Standard, TargetLength::Short)).await.unwrap();

        manager.reset().await.unwrap();
        assert_eq!(manager.session(), &Session::default());

        let resumed = harness.manager().await;
        assert_eq!(resumed.session(), &Session::default());
    }

    #[tokio::test]
    async fn test_steps_outside_their_stage_are_rejected() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;

        assert!(matches!(
            manager.advance_to_cover().await,
            Err(GenerationError::Precondition { .. })
        ));
        assert!(manager.download(harness.dir.path()).await.is_err());
        assert!(manager.generate_section_images(0, 1).await.is_err());
    }

    /// Walks a short book of the given mode up to the Cover stage.
    async fn at_cover_stage(manager: &mut WorkflowManager, mode: BookMode) {
        manager.submit_idea(idea(mode, TargetLength::Short)).await.unwrap();
        let edits = stubs(manager);
        manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await.unwrap();
        manager.advance_to_cover().await.unwrap();
    }

    #[tokio::test]
    async fn test_download_sanitizes_title_with_separators() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        let mut book = idea(BookMode::Coloring, TargetLength::Short);
        book.title = "AC/DC Story".to_string();
        manager.submit_idea(book).await.unwrap();
        let edits = stubs(&manager);
        manager.confirm_outline(edits, &mut |_: &ContentProgress| {}).await.unwrap();
        manager.advance_to_cover().await.unwrap();
        let base = manager.generate_cover_art("cover").await.unwrap();
        manager.submit_cover("cover", Some(base), None).await.unwrap();

        let path = manager.download(harness.dir.path()).await.unwrap();

        assert_eq!(path, harness.dir.path().join("AC_DC_Story.pdf"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_invalid_font_size_is_rejected() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;

        for size in [0.0, -11.0, f32::NAN, f32::INFINITY, 72.0] {
            let mut book = idea(BookMode::Standard, TargetLength::Short);
            book.font_size = size;
            let result = manager.submit_idea(book).await;
            assert!(matches!(result, Err(GenerationError::InvalidRequest(_))), "size {}", size);
        }

        assert_eq!(*harness.llm.outline_calls.lock().unwrap(), 0);
        assert_eq!(manager.stage(), Stage::Idea);
        assert_eq!(manager.project(), &BookProject::default());
    }

    #[tokio::test]
    async fn test_failed_cover_compose_keeps_stage_and_allows_resubmit() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        at_cover_stage(&mut manager, BookMode::Standard).await;
        assert!(!manager.has_cover_fonts());

        let base = manager.generate_cover_art("A starry sky").await.unwrap();
        let result = manager
            .submit_cover("A starry sky", Some(base.clone()), Some(&CoverStyle::default()))
            .await;

        assert!(matches!(result, Err(GenerationError::Cover(_))));
        assert_eq!(manager.stage(), Stage::Cover);
        assert_eq!(manager.project().cover_image, None);

        // The same art can still be used, without text.
        manager.submit_cover("A starry sky", Some(base.clone()), None).await.unwrap();
        assert_eq!(manager.project().cover_image, Some(base));
        assert_eq!(*harness.images.calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_stored_cover_can_be_kept_after_going_back() {
        let harness = Harness::new(MockLlm::default());
        let mut manager = harness.manager().await;
        at_cover_stage(&mut manager, BookMode::Standard).await;
        let base = manager.generate_cover_art("cover").await.unwrap();
        manager.submit_cover("cover", Some(base.clone()), None).await.unwrap();

        manager.go_back(Stage::Cover).await.unwrap();
        let current = manager.project().cover_image.clone();
        manager.submit_cover("cover", current, None).await.unwrap();

        assert_eq!(manager.stage(), Stage::Download);
        assert_eq!(manager.project().cover_image, Some(base));
        assert_eq!(*harness.images.calls.lock().unwrap(), vec![1]);
    }
}
