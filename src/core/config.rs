use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_build")]
    pub build_folder: String,

    /// Language every generated text is written in.
    #[serde(default = "default_language")]
    pub language: String,

    pub llm: LlmConfig,

    pub images: ImageConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub cover: CoverConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama" or "openai"
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

impl LlmConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Model used for chapter prose; falls back to `model`.
    pub content_model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub content_model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub content_model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    pub provider: String, // "gemini" or "openai"
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    pub gemini: Option<ImagenConfig>,
    pub openai: Option<OpenAIImageConfig>,
}

impl ImageConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImagenConfig {
    pub api_key: String,
    #[serde(default = "default_imagen_model")]
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIImageConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_openai_image_size")]
    pub size: String,
}

/// Page geometry and labels of the rendered document, in points.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LayoutConfig {
    #[serde(default = "default_page_width")]
    pub page_width: f32,
    #[serde(default = "default_page_height")]
    pub page_height: f32,
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default = "default_title_font_size")]
    pub title_font_size: f32,
    #[serde(default = "default_toc_heading")]
    pub toc_heading: String,
    #[serde(default = "default_section_label")]
    pub section_label: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: default_page_width(),
            page_height: default_page_height(),
            margin: default_margin(),
            title_font_size: default_title_font_size(),
            toc_heading: default_toc_heading(),
            section_label: default_section_label(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoverConfig {
    #[serde(default = "default_cover_width")]
    pub width: u32,
    #[serde(default = "default_cover_height")]
    pub height: u32,
    #[serde(default)]
    pub fonts: CoverFonts,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            width: default_cover_width(),
            height: default_cover_height(),
            fonts: CoverFonts::default(),
        }
    }
}

/// TrueType files used to draw cover text, one per family.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CoverFonts {
    pub serif: Option<PathBuf>,
    pub sans_serif: Option<PathBuf>,
    pub monospace: Option<PathBuf>,
    pub cursive: Option<PathBuf>,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_build() -> String {
    "build".to_string()
}
fn default_language() -> String {
    "English".to_string()
}
fn default_retry_count() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5000
}
fn default_batch_size() -> u32 {
    4
}
fn default_batch_pause_ms() -> u64 {
    1000
}
fn default_imagen_model() -> String {
    "imagen-4.0-generate-001".to_string()
}
fn default_openai_image_size() -> String {
    "1024x1024".to_string()
}
fn default_page_width() -> f32 {
    595.28
}
fn default_page_height() -> f32 {
    841.89
}
fn default_margin() -> f32 {
    40.0
}
fn default_title_font_size() -> f32 {
    14.0
}
fn default_toc_heading() -> String {
    "Table of Contents".to_string()
}
fn default_section_label() -> String {
    "Section".to_string()
}
fn default_cover_width() -> u32 {
    600
}
fn default_cover_height() -> u32 {
    800
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(CONFIG_FILE, content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.build_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
llm:
  provider: gemini
  gemini:
    api_key: key
    model: gemini-2.5-flash
images:
  provider: gemini
  gemini:
    api_key: key
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.output_folder, "output");
        assert_eq!(config.language, "English");
        assert_eq!(config.llm.retry_count, 3);
        assert_eq!(config.llm.retry_delay(), Duration::from_millis(5000));
        assert_eq!(config.images.batch_size, 4);
        assert_eq!(config.images.batch_pause(), Duration::from_secs(1));
        assert_eq!(
            config.images.gemini.as_ref().unwrap().model,
            "imagen-4.0-generate-001"
        );
        assert_eq!(config.layout.margin, 40.0);
        assert_eq!(config.cover.width, 600);
        assert!(config.llm.gemini.unwrap().content_model.is_none());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("config.yml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
