use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::image::{base64_bytes, read_dimensions};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookMode {
    #[default]
    Standard,
    Coloring,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetLength {
    Short,
    #[default]
    Medium,
    Long,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Informative,
    Casual,
    Formal,
    Humorous,
    Inspiring,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Informative,
        Tone::Casual,
        Tone::Formal,
        Tone::Humorous,
        Tone::Inspiring,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tone::Informative => "informative",
            Tone::Casual => "casual",
            Tone::Formal => "formal",
            Tone::Humorous => "humorous",
            Tone::Inspiring => "inspiring",
        }
    }
}

/// Body font of the rendered document.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    #[default]
    Serif,
    SansSerif,
    Monospace,
}

/// An opaque bitmap: encoded bytes plus intrinsic pixel size.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Image {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Image {
    /// Builds an image from an encoded payload, reading its pixel size.
    pub fn from_encoded(mime_type: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let (width, height) = read_dimensions(&data).context("Failed to decode image payload")?;
        Ok(Self {
            mime_type: mime_type.into(),
            data,
            width,
            height,
        })
    }

    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Title and one-line description of a section, before any generation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct SectionStub {
    pub title: String,
    pub description: String,
}

/// One chapter (standard) or one page idea (coloring).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Section {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl Section {
    pub fn from_stub(stub: SectionStub) -> Self {
        Self {
            title: stub.title,
            description: stub.description,
            content: String::new(),
            images: Vec::new(),
        }
    }

    /// Applies a user selection of a candidate image.
    ///
    /// Standard sections keep at most one image: picking the selected image
    /// again clears it, picking another replaces it. Coloring sections toggle
    /// membership and keep the order of the remaining images.
    pub fn toggle_image(&mut self, mode: BookMode, image: Image) {
        match mode {
            BookMode::Standard => {
                if self.images.first() == Some(&image) {
                    self.images.clear();
                } else {
                    self.images = vec![image];
                }
            }
            BookMode::Coloring => {
                if let Some(pos) = self.images.iter().position(|i| *i == image) {
                    self.images.remove(pos);
                } else {
                    self.images.push(image);
                }
            }
        }
    }

    /// Adds an image supplied by the user instead of the generator.
    pub fn add_upload(&mut self, mode: BookMode, image: Image) {
        match mode {
            BookMode::Standard => self.images = vec![image],
            BookMode::Coloring => self.images.push(image),
        }
    }
}

/// Body sizes offered for standard books, in points.
pub const BODY_FONT_SIZES: [f32; 5] = [9.0, 10.0, 11.0, 12.0, 14.0];

pub fn is_valid_body_font_size(size: f32) -> bool {
    size.is_finite() && (BODY_FONT_SIZES[0]..=BODY_FONT_SIZES[4]).contains(&size)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BookProject {
    pub title: String,
    pub author: String,
    pub topic: String,
    pub audience: String,
    pub tone: Tone,
    pub target_length: TargetLength,
    pub mode: BookMode,
    pub font_family: FontFamily,
    pub font_size: f32,
    pub sections: Vec<Section>,
    pub cover_image: Option<Image>,
    pub cover_prompt: String,
}

impl Default for BookProject {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            topic: String::new(),
            audience: "Adults".to_string(),
            tone: Tone::default(),
            target_length: TargetLength::default(),
            mode: BookMode::default(),
            font_family: FontFamily::default(),
            font_size: 11.0,
            sections: Vec::new(),
            cover_image: None,
            cover_prompt: String::new(),
        }
    }
}

/// Ordered wizard stages.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Idea = 1,
    Outline = 2,
    Content = 3,
    Cover = 4,
    Download = 5,
}

impl Stage {
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idea => "Idea",
            Stage::Outline => "Outline",
            Stage::Content => "Content",
            Stage::Cover => "Cover",
            Stage::Download => "Download",
        };
        write!(f, "{}", name)
    }
}

/// Everything the wizard needs to resume: the current stage and the book.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Session {
    pub stage: Stage,
    pub project: BookProject,
}

impl Session {
    /// Returns the session to its default: `Idea` stage, default project.
    pub fn reset(&mut self) {
        *self = Session::default();
    }
}
