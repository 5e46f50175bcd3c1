use crate::core::state::FontFamily;

/// The standard Type 1 fonts used by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfFont {
    TimesRoman,
    Helvetica,
    HelveticaBold,
    Courier,
}

impl PdfFont {
    pub const ALL: [PdfFont; 4] = [
        PdfFont::TimesRoman,
        PdfFont::Helvetica,
        PdfFont::HelveticaBold,
        PdfFont::Courier,
    ];

    pub fn base_font(&self) -> &'static str {
        match self {
            PdfFont::TimesRoman => "Times-Roman",
            PdfFont::Helvetica => "Helvetica",
            PdfFont::HelveticaBold => "Helvetica-Bold",
            PdfFont::Courier => "Courier",
        }
    }

    /// Body font for a book's font family.
    pub fn for_family(family: FontFamily) -> Self {
        match family {
            FontFamily::Serif => PdfFont::TimesRoman,
            FontFamily::SansSerif => PdfFont::Helvetica,
            FontFamily::Monospace => PdfFont::Courier,
        }
    }
}

pub trait TextMeasurer: Send + Sync {
    /// Advance width of `text` in points.
    fn width(&self, text: &str, font: PdfFont, size: f32) -> f32;
}

/// AFM advance widths (1/1000 em) for the printable ASCII range.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const COURIER_WIDTH: u16 = 600;

/// Width table lookup for the standard fonts. Characters outside printable
/// ASCII use the font's average lowercase width.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMetrics;

impl StandardMetrics {
    fn char_width(font: PdfFont, c: char) -> u16 {
        let (table, fallback) = match font {
            PdfFont::Courier => return COURIER_WIDTH,
            PdfFont::Helvetica => (&HELVETICA, 556),
            PdfFont::HelveticaBold => (&HELVETICA_BOLD, 611),
            PdfFont::TimesRoman => (&TIMES_ROMAN, 500),
        };
        match c as u32 {
            code @ 32..=126 => table[(code - 32) as usize],
            _ => fallback,
        }
    }
}

impl TextMeasurer for StandardMetrics {
    fn width(&self, text: &str, font: PdfFont, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| Self::char_width(font, c) as u32).sum();
        units as f32 * size / 1000.0
    }
}
