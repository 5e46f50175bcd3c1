use crate::core::config::LayoutConfig;
use crate::core::state::{BookMode, BookProject, Image, Section};
use crate::layout::metrics::{PdfFont, StandardMetrics, TextMeasurer};
use crate::layout::wrap::wrap_text;

pub const TITLE_LINE_PITCH: f32 = 1.15;
pub const BODY_LINE_PITCH: f32 = 1.25;

const TOC_HEADING_SIZE: f32 = 24.0;
const TOC_HEADING_OFFSET: f32 = 20.0;
const TOC_ENTRY_SIZE: f32 = 12.0;
const TOC_ENTRIES_OFFSET: f32 = 80.0;
const TOC_PITCH: f32 = 20.0;

const STANDARD_TITLE_GAP: f32 = 20.0;
const COLORING_TITLE_GAP: f32 = 10.0;
const STANDARD_IMAGE_SCALE: f32 = 0.6;
const IMAGE_GAP: f32 = 20.0;
const COLORING_CLEARANCE: f32 = 20.0;
/// Tall standard images stop this far above the bottom margin so that a
/// capped image still fits a fresh page under the strict overflow check.
const STANDARD_IMAGE_CLEARANCE: f32 = 1.0;

/// Smallest coloring picture worth printing below a title, in points.
pub const MIN_IMAGE_HEIGHT: f32 = 72.0;

/// A single line of text. `y` is the baseline, measured from the page top.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font: PdfFont,
    pub size: f32,
}

/// An image box. `y` is the top edge, measured from the page top.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage<'a> {
    pub image: &'a Image,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element<'a> {
    Text(TextRun),
    Image(PlacedImage<'a>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page<'a> {
    pub elements: Vec<Element<'a>>,
}

impl<'a> Page<'a> {
    pub fn texts(&self) -> impl Iterator<Item = &TextRun> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text(t) => Some(t),
            Element::Image(_) => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = &PlacedImage<'a>> {
        self.elements.iter().filter_map(|e| match e {
            Element::Image(i) => Some(i),
            Element::Text(_) => None,
        })
    }
}

/// Laid out book: fixed-size pages of absolutely positioned elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    pub width: f32,
    pub height: f32,
    pub pages: Vec<Page<'a>>,
}

pub struct LayoutEngine {
    config: LayoutConfig,
    measurer: Box<dyn TextMeasurer>,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self::with_measurer(config, Box::new(StandardMetrics))
    }

    pub fn with_measurer(config: LayoutConfig, measurer: Box<dyn TextMeasurer>) -> Self {
        Self { config, measurer }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn usable_width(&self) -> f32 {
        self.config.page_width - 2.0 * self.config.margin
    }

    pub fn usable_height(&self) -> f32 {
        self.config.page_height - 2.0 * self.config.margin
    }

    /// Baselines and image bottoms must stay strictly above this line.
    pub fn bottom(&self) -> f32 {
        self.config.page_height - self.config.margin
    }

    /// Body lines that fit on a page started at the top margin.
    pub fn lines_per_page(&self, font_size: f32) -> usize {
        let pitch = font_size * BODY_LINE_PITCH;
        (self.usable_height() / pitch).ceil() as usize
    }

    pub fn measure(&self, text: &str, font: PdfFont, size: f32) -> f32 {
        self.measurer.width(text, font, size)
    }

    pub fn wrap(&self, text: &str, font: PdfFont, size: f32) -> Vec<String> {
        wrap_text(text, self.usable_width(), |s| self.measurer.width(s, font, size))
    }

    pub fn layout<'a>(&self, project: &'a BookProject) -> Document<'a> {
        let mut builder = PageBuilder::new(self);

        if let Some(cover) = &project.cover_image {
            builder.cover(cover);
        }

        match project.mode {
            BookMode::Standard => {
                builder.table_of_contents(&project.sections);
                let font = PdfFont::for_family(project.font_family);
                for section in &project.sections {
                    builder.standard_section(section, font, project.font_size);
                }
            }
            BookMode::Coloring => {
                for section in &project.sections {
                    for image in &section.images {
                        builder.coloring_page(&section.title, image);
                    }
                }
            }
        }

        Document {
            width: self.config.page_width,
            height: self.config.page_height,
            pages: builder.pages,
        }
    }
}

struct PaginationCursor {
    page_index: usize,
    y: f32,
}

struct PageBuilder<'a, 'e> {
    engine: &'e LayoutEngine,
    pages: Vec<Page<'a>>,
    cursor: PaginationCursor,
}

impl<'a, 'e> PageBuilder<'a, 'e> {
    fn new(engine: &'e LayoutEngine) -> Self {
        Self {
            engine,
            pages: Vec::new(),
            cursor: PaginationCursor {
                page_index: 0,
                y: engine.config.margin,
            },
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = PaginationCursor {
            page_index: self.pages.len() - 1,
            y: self.engine.config.margin,
        };
    }

    fn push(&mut self, element: Element<'a>) {
        if self.pages.is_empty() {
            self.new_page();
        }
        self.pages[self.cursor.page_index].elements.push(element);
    }

    fn text(&mut self, text: String, x: f32, y: f32, font: PdfFont, size: f32) {
        self.push(Element::Text(TextRun {
            text,
            x,
            y,
            font,
            size,
        }));
    }

    fn centered_x(&self, content_width: f32) -> f32 {
        (self.engine.config.page_width - content_width) / 2.0
    }

    fn cover(&mut self, image: &'a Image) {
        if image.aspect_ratio().is_none() {
            log::warn!("Skipping cover image with zero size");
            return;
        }
        self.new_page();
        let (width, height) = (self.engine.config.page_width, self.engine.config.page_height);
        self.push(Element::Image(PlacedImage {
            image,
            x: 0.0,
            y: 0.0,
            width,
            height,
        }));
    }

    fn table_of_contents(&mut self, sections: &[Section]) {
        let engine = self.engine;
        let margin = engine.config.margin;

        self.new_page();
        let heading = engine.config.toc_heading.clone();
        let heading_width = engine.measure(&heading, PdfFont::HelveticaBold, TOC_HEADING_SIZE);
        let x = self.centered_x(heading_width);
        self.text(
            heading,
            x,
            margin + TOC_HEADING_OFFSET,
            PdfFont::HelveticaBold,
            TOC_HEADING_SIZE,
        );

        self.cursor.y = margin + TOC_ENTRIES_OFFSET;
        for (i, section) in sections.iter().enumerate() {
            if self.cursor.y >= engine.bottom() {
                self.new_page();
            }
            let entry = format!("{} {}: {}", engine.config.section_label, i + 1, section.title);
            let y = self.cursor.y;
            self.text(entry, margin, y, PdfFont::Helvetica, TOC_ENTRY_SIZE);
            self.cursor.y += TOC_PITCH;
        }
    }

    /// Centred bold title; the cursor moves past its wrapped height plus `gap`.
    fn title(&mut self, title: &str, gap: f32) {
        let engine = self.engine;
        let size = engine.config.title_font_size;
        let pitch = size * TITLE_LINE_PITCH;
        let lines = engine.wrap(title, PdfFont::HelveticaBold, size);
        let top = self.cursor.y;
        for (i, line) in lines.iter().enumerate() {
            let x = self.centered_x(engine.measure(line, PdfFont::HelveticaBold, size));
            self.text(
                line.clone(),
                x,
                top + i as f32 * pitch,
                PdfFont::HelveticaBold,
                size,
            );
        }
        self.cursor.y = top + lines.len() as f32 * pitch + gap;
    }

    fn standard_section(&mut self, section: &'a Section, font: PdfFont, font_size: f32) {
        let engine = self.engine;
        self.new_page();
        self.title(&section.title, STANDARD_TITLE_GAP);

        if let Some(image) = section.images.first() {
            match image.aspect_ratio() {
                Some(aspect) => {
                    let mut width = engine.usable_width() * STANDARD_IMAGE_SCALE;
                    let mut height = width / aspect;
                    let max_height = engine.usable_height() - STANDARD_IMAGE_CLEARANCE;
                    if height > max_height {
                        height = max_height;
                        width = height * aspect;
                    }
                    if self.cursor.y + height >= engine.bottom() {
                        self.new_page();
                    }
                    let x = self.centered_x(width);
                    let y = self.cursor.y;
                    self.push(Element::Image(PlacedImage {
                        image,
                        x,
                        y,
                        width,
                        height,
                    }));
                    self.cursor.y += height + IMAGE_GAP;
                }
                None => log::warn!("Skipping zero-size image in \"{}\"", section.title),
            }
        }

        let pitch = font_size * BODY_LINE_PITCH;
        let margin = engine.config.margin;
        for line in engine.wrap(&section.content, font, font_size) {
            if self.cursor.y >= engine.bottom() {
                self.new_page();
            }
            if !line.is_empty() {
                let y = self.cursor.y;
                self.text(line, margin, y, font, font_size);
            }
            self.cursor.y += pitch;
        }
    }

    /// One page per picture: title on top, picture scaled to the usable width
    /// and capped to the room left below the title.
    fn coloring_page(&mut self, title: &str, image: &'a Image) {
        let engine = self.engine;
        let Some(aspect) = image.aspect_ratio() else {
            log::warn!("Skipping zero-size image in \"{}\"", title);
            return;
        };

        self.new_page();
        self.title(title, COLORING_TITLE_GAP);
        let mut room = engine.bottom() - self.cursor.y - COLORING_CLEARANCE;
        if room < MIN_IMAGE_HEIGHT {
            self.new_page();
            self.title(title, COLORING_TITLE_GAP);
            room = engine.bottom() - self.cursor.y - COLORING_CLEARANCE;
        }
        if room <= 0.0 {
            log::warn!("No room left for an image below \"{}\"", title);
            return;
        }

        let mut width = engine.usable_width();
        let mut height = width / aspect;
        if height > room {
            height = room;
            width = height * aspect;
        }
        let x = self.centered_x(width);
        let y = self.cursor.y;
        self.push(Element::Image(PlacedImage {
            image,
            x,
            y,
            width,
            height,
        }));
        self.cursor.y += height;
    }
}
