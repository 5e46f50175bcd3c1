use crate::core::error::LayoutError;
use crate::core::state::Image;
use crate::layout::engine::{Document, Element, PlacedImage, TextRun};
use crate::layout::metrics::PdfFont;
use crate::utils::image::to_rgb_jpeg;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};
use std::collections::HashMap;

fn font_resource_name(font: PdfFont) -> &'static str {
    match font {
        PdfFont::TimesRoman => "F1",
        PdfFont::Helvetica => "F2",
        PdfFont::HelveticaBold => "F3",
        PdfFont::Courier => "F4",
    }
}

/// Encodes text for the standard fonts' WinAnsi encoding. Characters the
/// encoding lacks become `?`.
pub fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\t' => b' ',
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

/// Serializes a laid out document with `lopdf`.
pub struct PdfRenderer {
    document: lopdf::Document,
    pages_id: ObjectId,
    fonts_id: ObjectId,
    page_ids: Vec<ObjectId>,
    images: HashMap<*const Image, Option<ObjectId>>,
}

impl PdfRenderer {
    pub fn new() -> Self {
        let mut document = lopdf::Document::with_version("1.5");
        let pages_id = document.new_object_id();

        let mut fonts = Dictionary::new();
        for font in PdfFont::ALL {
            let font_dict = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            };
            fonts.set(font_resource_name(font), Object::Dictionary(font_dict));
        }
        let fonts_id = document.add_object(fonts);

        Self {
            document,
            pages_id,
            fonts_id,
            page_ids: Vec::new(),
            images: HashMap::new(),
        }
    }

    pub fn render(mut self, doc: &Document) -> Result<Vec<u8>, LayoutError> {
        for page in &doc.pages {
            self.add_page(&page.elements, doc.width, doc.height)?;
        }
        if self.page_ids.is_empty() {
            self.add_page(&[], doc.width, doc.height)?;
        }
        self.finish()
    }

    /// Embeds `image` once as a DCT XObject. `None` marks an image that
    /// could not be decoded.
    fn image_object(&mut self, image: &Image) -> Option<ObjectId> {
        let key = image as *const Image;
        if let Some(id) = self.images.get(&key) {
            return *id;
        }

        let id = match to_rgb_jpeg(&image.data) {
            Ok((jpeg, width, height)) => {
                let dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                };
                let stream = Stream::new(dict, jpeg).with_compression(false);
                Some(self.document.add_object(stream))
            }
            Err(e) => {
                log::warn!("Skipping image that could not be decoded: {}", e);
                None
            }
        };
        self.images.insert(key, id);
        id
    }

    fn add_page(&mut self, elements: &[Element], width: f32, height: f32) -> Result<(), LayoutError> {
        let mut operations = Vec::new();
        let mut xobjects = Dictionary::new();

        for element in elements {
            match element {
                Element::Text(run) => push_text(&mut operations, run, height),
                Element::Image(placed) => {
                    let Some(id) = self.image_object(placed.image) else {
                        continue;
                    };
                    let name = format!("Im{}", xobjects.len() + 1);
                    push_image(&mut operations, placed, &name, height);
                    xobjects.set(name, id);
                }
            }
        }

        let content = Content { operations };
        let content_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content.encode()?));

        let mut resources = dictionary! { "Font" => self.fonts_id };
        if !xobjects.is_empty() {
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => resources,
        };
        let page_id = self.document.add_object(page);
        self.page_ids.push(page_id);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, LayoutError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.document.save_to(&mut out)?;
        Ok(out)
    }
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// Layout coordinates grow downwards from the top edge; PDF grows upwards.
fn push_text(ops: &mut Vec<Operation>, run: &TextRun, page_height: f32) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![
            Object::Name(font_resource_name(run.font).as_bytes().to_vec()),
            run.size.into(),
        ],
    ));
    ops.push(Operation::new(
        "Td",
        vec![run.x.into(), (page_height - run.y).into()],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::string_literal(to_win_ansi(&run.text))],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn push_image(ops: &mut Vec<Operation>, placed: &PlacedImage, name: &str, page_height: f32) {
    let bottom = page_height - placed.y - placed.height;
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            placed.width.into(),
            0.into(),
            0.into(),
            placed.height.into(),
            placed.x.into(),
            bottom.into(),
        ],
    ));
    ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
    ops.push(Operation::new("Q", vec![]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::tests::image;
    use crate::layout::engine::Page;
    use crate::utils::image::tests::png_bytes;

    fn png(width: u32, height: u32) -> Image {
        Image::from_encoded("image/png", png_bytes(width, height)).unwrap()
    }

    fn text(s: &str) -> Element<'static> {
        Element::Text(TextRun {
            text: s.to_string(),
            x: 40.0,
            y: 60.0,
            font: PdfFont::TimesRoman,
            size: 11.0,
        })
    }

    fn placed(image: &Image) -> Element<'_> {
        Element::Image(PlacedImage {
            image,
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        })
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(to_win_ansi("Café"), vec![b'C', b'a', b'f', 0xE9]);
        assert_eq!(to_win_ansi("“ok”—"), vec![0x93, b'o', b'k', 0x94, 0x97]);
        assert_eq!(to_win_ansi("漢\t"), vec![b'?', b' ']);
    }

    #[test]
    fn test_render_pages_with_text_and_images() {
        let picture = png(8, 4);
        let doc = Document {
            width: 595.28,
            height: 841.89,
            pages: vec![
                Page {
                    elements: vec![placed(&picture)],
                },
                Page {
                    elements: vec![text("Hello"), placed(&picture)],
                },
            ],
        };

        let bytes = PdfRenderer::new().render(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 2);

        // The shared picture is embedded once.
        let xobjects = parsed
            .objects
            .values()
            .filter(|o| {
                o.as_stream()
                    .ok()
                    .and_then(|s| s.dict.get(b"Subtype").ok())
                    .and_then(|t| t.as_name().ok())
                    == Some(b"Image".as_slice())
            })
            .count();
        assert_eq!(xobjects, 1);
    }

    #[test]
    fn test_undecodable_image_is_skipped() {
        let broken = image(3);
        let doc = Document {
            width: 595.28,
            height: 841.89,
            pages: vec![Page {
                elements: vec![placed(&broken), text("Still here")],
            }],
        };

        let bytes = PdfRenderer::new().render(&doc).unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let doc = Document {
            width: 595.28,
            height: 841.89,
            pages: vec![],
        };
        let bytes = PdfRenderer::new().render(&doc).unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }
}
