use crate::core::config::CoverConfig;
use crate::core::state::Image;
use crate::layout::wrap::wrap_text;
use crate::utils::image::{decode, encode_png, parse_hex_color};
use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Cover styling is expressed for a preview 300 units wide and scaled to
/// the output canvas.
const PREVIEW_WIDTH: f32 = 300.0;
const PADDING: f32 = 24.0;
const AUTHOR_GAP: f32 = 8.0;
const LINE_HEIGHT: f32 = 1.2;
const SHADOW_ALPHA: u8 = 204;

pub const TITLE_SIZE_RANGE: (f32, f32) = (16.0, 64.0);
pub const AUTHOR_SIZE_RANGE: (f32, f32) = (12.0, 32.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverFont {
    #[default]
    Serif,
    SansSerif,
    Monospace,
    Cursive,
}

impl CoverFont {
    pub const ALL: [CoverFont; 4] = [
        CoverFont::Serif,
        CoverFont::SansSerif,
        CoverFont::Monospace,
        CoverFont::Cursive,
    ];
}

impl fmt::Display for CoverFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoverFont::Serif => "Serif",
            CoverFont::SansSerif => "Sans-serif",
            CoverFont::Monospace => "Monospace",
            CoverFont::Cursive => "Cursive",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    #[default]
    Right,
}

impl fmt::Display for TextAlign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextAlign::Left => "Left",
            TextAlign::Center => "Center",
            TextAlign::Right => "Right",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverStyle {
    pub text_color: String,
    pub font_family: CoverFont,
    pub text_align: TextAlign,
    pub title_font_size: f32,
    pub author_font_size: f32,
}

impl Default for CoverStyle {
    fn default() -> Self {
        Self {
            text_color: "#FFFFFF".to_string(),
            font_family: CoverFont::Serif,
            text_align: TextAlign::Right,
            title_font_size: 32.0,
            author_font_size: 20.0,
        }
    }
}

impl CoverStyle {
    /// Keeps font sizes inside the supported ranges.
    pub fn clamped(mut self) -> Self {
        self.title_font_size = self
            .title_font_size
            .clamp(TITLE_SIZE_RANGE.0, TITLE_SIZE_RANGE.1);
        self.author_font_size = self
            .author_font_size
            .clamp(AUTHOR_SIZE_RANGE.0, AUTHOR_SIZE_RANGE.1);
        self
    }
}

/// One line of cover text in canvas pixels. `top` is the top of its line box.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverLine {
    pub text: String,
    pub x: f32,
    pub top: f32,
    pub size: f32,
    pub shadow_offset: f32,
    pub shadow_blur: f32,
}

impl CoverLine {
    fn glyph_top(&self) -> f32 {
        self.top + (LINE_HEIGHT - 1.0) * self.size / 2.0
    }
}

struct Block {
    lines: Vec<String>,
    size: f32,
    shadow_offset: f32,
    shadow_blur: f32,
}

/// Positions the title and author text, bottom-anchored with the author
/// last. `measure(text, size)` returns the pixel width of `text`.
pub fn layout_cover_text<F>(
    width: u32,
    height: u32,
    title: &str,
    author: &str,
    style: &CoverStyle,
    measure: F,
) -> Vec<CoverLine>
where
    F: Fn(&str, f32) -> f32,
{
    let (width, height) = (width as f32, height as f32);
    let scale = width / PREVIEW_WIDTH;
    let padding = PADDING * scale;
    let max_width = (width - 2.0 * padding).max(1.0);

    let block = |text: &str, size: f32, offset: f32, blur: f32| {
        let size = size * scale;
        Block {
            lines: wrap_text(text, max_width, |s| measure(s, size)),
            size,
            shadow_offset: offset * scale,
            shadow_blur: blur * scale,
        }
    };
    let title_block = block(title, style.title_font_size, 2.0, 4.0);
    let author_block = block(author, style.author_font_size, 1.0, 3.0);

    let block_height = |b: &Block| b.lines.len() as f32 * b.size * LINE_HEIGHT;
    let bottom = height - padding;
    let author_top = bottom - block_height(&author_block);
    let gap = if author_block.lines.is_empty() || title_block.lines.is_empty() {
        0.0
    } else {
        AUTHOR_GAP * scale
    };
    let title_top = author_top - gap - block_height(&title_block);

    let mut placed = Vec::new();
    for (b, top) in [(&title_block, title_top), (&author_block, author_top)] {
        for (i, line) in b.lines.iter().enumerate() {
            let line_width = measure(line, b.size);
            let x = match style.text_align {
                TextAlign::Left => padding,
                TextAlign::Center => (width - line_width) / 2.0,
                TextAlign::Right => width - padding - line_width,
            };
            placed.push(CoverLine {
                text: line.clone(),
                x,
                top: top + i as f32 * b.size * LINE_HEIGHT,
                size: b.size,
                shadow_offset: b.shadow_offset,
                shadow_blur: b.shadow_blur,
            });
        }
    }
    placed
}

/// Scales and centre-crops `base` so it covers the whole canvas.
pub fn fit_cover(base: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    base.resize_to_fill(width, height, FilterType::Lanczos3)
        .to_rgba8()
}

pub struct CoverCompositor {
    config: CoverConfig,
}

impl CoverCompositor {
    pub fn new(config: CoverConfig) -> Self {
        Self { config }
    }

    /// Whether any family has a font file, i.e. whether text can be drawn.
    pub fn has_fonts(&self) -> bool {
        CoverFont::ALL.iter().any(|f| self.font_path(*f).is_some())
    }

    fn font_path(&self, family: CoverFont) -> Option<&PathBuf> {
        let fonts = &self.config.fonts;
        match family {
            CoverFont::Serif => fonts.serif.as_ref(),
            CoverFont::SansSerif => fonts.sans_serif.as_ref(),
            CoverFont::Monospace => fonts.monospace.as_ref(),
            CoverFont::Cursive => fonts.cursive.as_ref(),
        }
    }

    fn load_font(&self, family: CoverFont) -> Result<FontVec> {
        let path = match self.font_path(family) {
            Some(path) => path,
            None => {
                let fallback = CoverFont::ALL
                    .iter()
                    .find_map(|f| self.font_path(*f))
                    .ok_or_else(|| anyhow!("No cover font configured (cover.fonts)"))?;
                log::warn!("No {:?} cover font configured, using {}", family, fallback.display());
                fallback
            }
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        FontVec::try_from_vec(bytes).map_err(|e| anyhow!("Invalid font {}: {}", path.display(), e))
    }

    /// Draws title and author over the cover-fitted base and flattens the
    /// result to a PNG.
    pub fn compose(&self, base: &Image, title: &str, author: &str, style: &CoverStyle) -> Result<Image> {
        let style = style.clone().clamped();
        let color = parse_hex_color(&style.text_color)?;
        let font = self.load_font(style.font_family)?;
        let base = decode(&base.data).context("Failed to decode cover base image")?;

        let (width, height) = (self.config.width, self.config.height);
        let mut canvas = fit_cover(&base, width, height);

        let lines = layout_cover_text(width, height, title, author, &style, |text, size| {
            text_size(PxScale::from(size), &font, text).0 as f32
        });

        draw_shadows(&mut canvas, &lines, &font);
        for line in &lines {
            draw_text_mut(
                &mut canvas,
                color,
                line.x.round() as i32,
                line.glyph_top().round() as i32,
                PxScale::from(line.size),
                &font,
                &line.text,
            );
        }

        let data = encode_png(&DynamicImage::ImageRgba8(canvas))?;
        Ok(Image {
            mime_type: "image/png".to_string(),
            data,
            width,
            height,
        })
    }
}

/// Soft drop shadow: offset copies of the text on a transparent layer,
/// blurred and blended under the final text.
fn draw_shadows(canvas: &mut RgbaImage, lines: &[CoverLine], font: &FontVec) {
    let mut blurs: Vec<f32> = lines.iter().map(|l| l.shadow_blur).collect();
    blurs.dedup();
    for blur in blurs {
        let mut layer = RgbaImage::new(canvas.width(), canvas.height());
        for line in lines.iter().filter(|l| l.shadow_blur == blur) {
            draw_text_mut(
                &mut layer,
                Rgba([0, 0, 0, SHADOW_ALPHA]),
                (line.x + line.shadow_offset).round() as i32,
                (line.glyph_top() + line.shadow_offset).round() as i32,
                PxScale::from(line.size),
                font,
                &line.text,
            );
        }
        let blurred = imageops::blur(&layer, blur / 2.0);
        imageops::overlay(canvas, &blurred, 0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CoverFonts;
    use crate::utils::image::tests::png_bytes;

    // Half an em per character.
    fn measure(text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * size * 0.5
    }

    #[test]
    fn test_default_style() {
        let style = CoverStyle::default();
        assert_eq!(style.text_color, "#FFFFFF");
        assert_eq!(style.font_family, CoverFont::Serif);
        assert_eq!(style.text_align, TextAlign::Right);
        assert_eq!((style.title_font_size, style.author_font_size), (32.0, 20.0));
    }

    #[test]
    fn test_clamped_sizes() {
        let style = CoverStyle {
            title_font_size: 100.0,
            author_font_size: 2.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(style.title_font_size, 64.0);
        assert_eq!(style.author_font_size, 12.0);
    }

    #[test]
    fn test_text_is_bottom_anchored_right_aligned() {
        let style = CoverStyle::default();
        let lines = layout_cover_text(600, 800, "Deep Sea", "Ana Lima", &style, measure);
        assert_eq!(lines.len(), 2);

        // 600 px wide canvas: everything is scaled by 2.
        let (title, author) = (&lines[0], &lines[1]);
        assert_eq!(title.size, 64.0);
        assert_eq!(author.size, 40.0);
        assert!((author.top + author.size * LINE_HEIGHT - (800.0 - 48.0)).abs() < 1e-3);
        assert!((title.top + title.size * LINE_HEIGHT + 16.0 - author.top).abs() < 1e-3);
        for line in &lines {
            assert!((line.x + measure(&line.text, line.size) - (600.0 - 48.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_long_title_wraps_within_padding() {
        let style = CoverStyle {
            text_align: TextAlign::Left,
            ..Default::default()
        };
        let title = "The Complete Illustrated Guide to Backyard Astronomy";
        let lines = layout_cover_text(300, 400, title, "", &style, measure);
        assert!(lines.len() > 1);
        for line in &lines {
            assert_eq!(line.x, 24.0);
            assert!(measure(&line.text, line.size) <= 300.0 - 48.0);
        }
        let last = lines.last().unwrap();
        assert!((last.top + last.size * LINE_HEIGHT - 376.0).abs() < 1e-3);
    }

    #[test]
    fn test_centered_alignment() {
        let style = CoverStyle {
            text_align: TextAlign::Center,
            ..Default::default()
        };
        let lines = layout_cover_text(300, 400, "Hi", "Me", &style, measure);
        for line in &lines {
            let w = measure(&line.text, line.size);
            assert!((line.x - (300.0 - w) / 2.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_fit_cover_fills_canvas() {
        let base = decode(&png_bytes(100, 50)).unwrap();
        let fitted = fit_cover(&base, 60, 80);
        assert_eq!(fitted.dimensions(), (60, 80));
    }

    #[test]
    fn test_compose_without_fonts_fails() {
        let compositor = CoverCompositor::new(CoverConfig {
            fonts: CoverFonts::default(),
            ..Default::default()
        });
        assert!(!compositor.has_fonts());
        let base = Image::from_encoded("image/png", png_bytes(10, 10)).unwrap();
        let err = compositor
            .compose(&base, "Title", "Author", &CoverStyle::default())
            .unwrap_err();
        assert!(err.to_string().contains("font"));
    }
}
