use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba};
use std::io::Cursor;
use std::path::Path;

const JPEG_QUALITY: u8 = 90;

/// Reads the pixel size of an encoded image without decoding the pixels.
pub fn read_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Best-effort MIME type for an encoded payload.
pub fn guess_mime_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

/// Loads an image file from disk (used for user uploads).
pub fn load_image_file(path: &Path) -> Result<crate::core::state::Image> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or_else(|_| guess_mime_type(&data));
    crate::core::state::Image::from_encoded(mime, data)
}

pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(data)?)
}

/// Re-encodes any supported bitmap as baseline RGB JPEG, returning the bytes
/// and the pixel size.
pub fn to_rgb_jpeg(data: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let rgb = decode(data)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;
    Ok((out, width, height))
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Parses `#RRGGBB` or `#RGB` into an opaque colour.
pub fn parse_hex_color(hex: &str) -> Result<Rgba<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(anyhow!("Invalid colour: {}", hex)),
    };
    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| anyhow!("Invalid colour: {}", hex))
    };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Serde adapter storing byte payloads as standard base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[test]
    fn test_read_dimensions_of_png() {
        let data = png_bytes(12, 7);
        assert_eq!(read_dimensions(&data).unwrap(), (12, 7));
        assert_eq!(guess_mime_type(&data), "image/png");
    }

    #[test]
    fn test_read_dimensions_rejects_garbage() {
        assert!(read_dimensions(b"not an image").is_err());
    }

    #[test]
    fn test_to_rgb_jpeg_keeps_size() {
        let (jpeg, w, h) = to_rgb_jpeg(&png_bytes(20, 10)).unwrap();
        assert_eq!((w, h), (20, 10));
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#0a0").unwrap(), Rgba([0, 170, 0, 255]));
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
    }
}
