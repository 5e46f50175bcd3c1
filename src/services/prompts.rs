//! Prompt templates and the tone to visual-style lookup.

use crate::core::state::{BookMode, BookProject, Section, TargetLength, Tone};

/// Visual style family chosen from the book's tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleDescriptor {
    VibrantCartoon,
    SoftEthereal,
    MinimalistPremium,
}

impl StyleDescriptor {
    pub fn for_tone(tone: Tone) -> Self {
        match tone {
            Tone::Humorous => StyleDescriptor::VibrantCartoon,
            Tone::Inspiring => StyleDescriptor::SoftEthereal,
            Tone::Informative | Tone::Casual | Tone::Formal => StyleDescriptor::MinimalistPremium,
        }
    }

    pub fn cover_phrase(&self) -> &'static str {
        match self {
            StyleDescriptor::VibrantCartoon => "vibrant and expressive cartoon style",
            StyleDescriptor::SoftEthereal => "ethereal style with soft, hopeful lighting",
            StyleDescriptor::MinimalistPremium => "minimalist, modern and sophisticated style",
        }
    }

    pub fn illustration_phrase(&self) -> &'static str {
        match self {
            StyleDescriptor::VibrantCartoon => "playful 3D cartoon style, vivid colours",
            StyleDescriptor::SoftEthereal => "soft digital painting, golden light, uplifting",
            StyleDescriptor::MinimalistPremium => {
                "premium editorial illustration, highly detailed, cinematic colours"
            }
        }
    }
}

pub const GHOST_WRITER_PERSONA: &str = "You are a professional, creative ghost writer. \
Your writing is human, fluid and natural, avoiding robotic patterns. You use rich metaphors, \
vary sentence structure and adapt your vocabulary perfectly to the target audience. \
Your goal is to hold the reader's attention from beginning to end.";

/// Number of outline entries requested for a length and mode.
pub fn stub_count(length: TargetLength, mode: BookMode) -> usize {
    match (mode, length) {
        (BookMode::Standard, TargetLength::Short) => 4,
        (BookMode::Standard, TargetLength::Medium) => 7,
        (BookMode::Standard, TargetLength::Long) => 12,
        (BookMode::Coloring, TargetLength::Short) => 10,
        (BookMode::Coloring, TargetLength::Medium) => 25,
        (BookMode::Coloring, TargetLength::Long) => 50,
    }
}

/// Target word band of one chapter.
pub fn word_band(length: TargetLength) -> (u32, u32) {
    match length {
        TargetLength::Short => (600, 700),
        TargetLength::Medium => (800, 900),
        TargetLength::Long => (1000, 1200),
    }
}

pub struct OutlineParams<'a> {
    pub topic: &'a str,
    pub audience: &'a str,
    pub tone: Tone,
    pub mode: BookMode,
    pub count: usize,
    pub language: &'a str,
}

pub fn outline_prompt(p: &OutlineParams) -> String {
    match p.mode {
        BookMode::Coloring => format!(
            "You are an expert in creating coloring books. Create a table of contents for a \
coloring book on the theme \"{topic}\", for an audience of \"{audience}\".\n\
Generate a list of exactly {count} page ideas.\n\
Each item must represent one coloring page, with a title and a short description of what the \
picture should contain.\n\
Respond in {language}.",
            topic = p.topic,
            audience = p.audience,
            count = p.count,
            language = p.language,
        ),
        BookMode::Standard => format!(
            "You are an expert writer. Create a detailed table of contents for an ebook on the \
topic \"{topic}\", for an audience of \"{audience}\" with a {tone} tone.\n\
Generate an outline with exactly {count} chapters.\n\
Each chapter must have a title and a one-sentence description.\n\
Respond in {language}.",
            topic = p.topic,
            audience = p.audience,
            tone = p.tone.label(),
            count = p.count,
            language = p.language,
        ),
    }
}

pub struct ContentParams<'a> {
    pub book_title: &'a str,
    pub topic: &'a str,
    pub section_title: &'a str,
    pub audience: &'a str,
    pub tone: Tone,
    pub length: TargetLength,
    pub language: &'a str,
}

pub fn content_prompt(p: &ContentParams) -> String {
    let (low, high) = word_band(p.length);
    format!(
        "Book title: \"{book_title}\"\n\
General topic of the book: \"{topic}\"\n\
Title of the chapter to write: \"{section_title}\"\n\
\n\
Specific instructions:\n\
- Target audience: {audience}\n\
- Tone: {tone}\n\
- Length: write about {low}-{high} words.\n\
- The content must be engaging, fluid and well structured.\n\
- Do not repeat the chapter title at the start of the text, only the content itself.\n\
- Use well built paragraphs and avoid repetition.\n\
- Answer only with the chapter text.\n\
- Respond in {language}.",
        book_title = p.book_title,
        topic = p.topic,
        section_title = p.section_title,
        audience = p.audience,
        tone = p.tone.label(),
        low = low,
        high = high,
        language = p.language,
    )
}

pub fn cover_prompt(project: &BookProject) -> String {
    match project.mode {
        BookMode::Coloring => format!(
            "A professional, inviting coloring book cover. Title: \"{}\". Theme: {}. \
Style: thick black line art on a white background, clean vector design, no shading. \
The central picture should be cute and appealing to {}. Do not include any text in the image.",
            project.title, project.topic, project.audience
        ),
        BookMode::Standard => format!(
            "A professional, award-winning ebook cover. Book title: \"{}\". Topic: {}. \
Visual style: {}. Photographic quality or premium 3D illustration, cinematic composition, \
dramatic lighting, 8k resolution. Do not include any text in the image.",
            project.title,
            project.topic,
            StyleDescriptor::for_tone(project.tone).cover_phrase()
        ),
    }
}

pub fn illustration_prompt(project: &BookProject, section: &Section) -> String {
    match project.mode {
        BookMode::Coloring => format!(
            "Professional coloring book page. Theme: \"{}\" - {}. Style: black vector line art, \
pure white background, thick and consistent lines, no grey filled areas, design appealing to {}, \
high resolution. No text in the image.",
            section.title, section.description, project.audience
        ),
        BookMode::Standard => format!(
            "Professional book illustration. Book title: \"{}\". Chapter: \"{}\". \
Scene to illustrate: \"{}\". Style: {}. 8k quality, artistic composition, dramatic lighting, \
masterpiece. No text in the image.",
            project.title,
            section.title,
            section.description,
            StyleDescriptor::for_tone(project.tone).illustration_phrase()
        ),
    }
}
