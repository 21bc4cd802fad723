//! Format detection and decoding: raw bytes → [`DecodedImage`].
//!
//! Content-type headers from arbitrary hosts are often missing or wrong, so
//! classification is a three-tier decision table:
//!
//! | Tier | Evidence | Result |
//! |------|----------|--------|
//! | 1 | declared type contains `png` | PNG |
//! | 1 | declared type contains `jpeg` / `jpg` | JPEG |
//! | 2 | first bytes `FF D8` | JPEG |
//! | 2 | first bytes `89 50` | PNG |
//! | 3 | nothing matched | unknown: trial-decode JPEG, then PNG |
//!
//! The detected codec is always tried first. If it fails the other codec gets
//! one attempt, so a mislabelled image still renders. Only when both fail is
//! the input skipped.
//!
//! ## Embedding
//!
//! JPEG data is embedded untouched (`DCTDecode`): re-encoding would lose
//! quality and the PDF reader already has a JPEG decoder. PNG data has no
//! PDF filter of its own, so it is decoded to 8-bit samples and
//! zlib-compressed (`FlateDecode`), with transparency split into a soft mask.

use crate::error::ImageError;
use crate::pipeline::fetch::FetchedImage;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::debug;

/// Image container format as classified by [`detect_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Unknown,
}

impl ImageFormat {
    /// Codecs to try, in order, for bytes classified as `self`.
    pub fn decode_order(self) -> [ImageFormat; 2] {
        match self {
            ImageFormat::Png => [ImageFormat::Png, ImageFormat::Jpeg],
            ImageFormat::Jpeg | ImageFormat::Unknown => [ImageFormat::Jpeg, ImageFormat::Png],
        }
    }
}

/// PDF device colour space of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    pub fn pdf_name(self) -> &'static [u8] {
        match self {
            ColorSpace::Gray => b"DeviceGray",
            ColorSpace::Rgb => b"DeviceRGB",
            ColorSpace::Cmyk => b"DeviceCMYK",
        }
    }
}

/// Image data in a form that can be written straight into a PDF stream.
#[derive(Debug, Clone)]
pub enum EmbeddedImage {
    /// Original JPEG bytes, embedded with `DCTDecode`.
    Dct {
        data: Vec<u8>,
        color_space: ColorSpace,
    },
    /// zlib-compressed 8-bit samples, embedded with `FlateDecode`.
    Flate {
        data: Vec<u8>,
        color_space: ColorSpace,
        /// zlib-compressed 8-bit alpha, present only when some pixel is not opaque.
        soft_mask: Option<Vec<u8>>,
    },
}

/// An image whose format and pixel size are known and that is ready to place.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Codec that actually read the bytes.
    pub format: ImageFormat,
    pub embed: EmbeddedImage,
}

/// Classify bytes by declared type first, then magic bytes.
pub fn detect_format(bytes: &[u8], content_type: &str) -> ImageFormat {
    let declared = content_type.to_ascii_lowercase();
    if declared.contains("png") {
        return ImageFormat::Png;
    }
    if declared.contains("jpeg") || declared.contains("jpg") {
        return ImageFormat::Jpeg;
    }

    match bytes {
        [0xFF, 0xD8, ..] => ImageFormat::Jpeg,
        [0x89, 0x50, ..] => ImageFormat::Png,
        _ => ImageFormat::Unknown,
    }
}

/// Detect and decode a fetched image.
///
/// CPU-bound; callers on an async runtime should run it inside
/// `spawn_blocking`.
pub fn decode(locator: &str, fetched: &FetchedImage) -> Result<DecodedImage, ImageError> {
    let detected = detect_format(&fetched.bytes, &fetched.content_type);
    let mut failures = Vec::with_capacity(2);

    for codec in detected.decode_order() {
        let attempt = match codec {
            ImageFormat::Jpeg => decode_jpeg(&fetched.bytes),
            _ => decode_png(&fetched.bytes),
        };
        match attempt {
            Ok(image) => {
                debug!(
                    "Decoded {} as {:?} (detected {:?}) → {}x{} px",
                    locator, image.format, detected, image.width, image.height
                );
                return Ok(image);
            }
            Err(e) => failures.push(format!("{codec:?}: {e}")),
        }
    }

    Err(ImageError::Undecodable {
        locator: locator.to_string(),
        detail: failures.join("; "),
    })
}

fn load(bytes: &[u8], format: image::ImageFormat) -> Result<DynamicImage, String> {
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())?;
    if img.width() == 0 || img.height() == 0 {
        return Err(format!("zero-sized image {}x{}", img.width(), img.height()));
    }
    Ok(img)
}

fn decode_jpeg(bytes: &[u8]) -> Result<DecodedImage, String> {
    let img = load(bytes, image::ImageFormat::Jpeg)?;

    // The decoder converts CMYK to RGB, so the frame header is the only
    // reliable source for the stored component count.
    let components = jpeg_components(bytes).unwrap_or(if img.color().has_color() { 3 } else { 1 });
    let color_space = match components {
        1 => ColorSpace::Gray,
        4 => ColorSpace::Cmyk,
        _ => ColorSpace::Rgb,
    };

    Ok(DecodedImage {
        width: img.width(),
        height: img.height(),
        format: ImageFormat::Jpeg,
        embed: EmbeddedImage::Dct {
            data: bytes.to_vec(),
            color_space,
        },
    })
}

fn decode_png(bytes: &[u8]) -> Result<DecodedImage, String> {
    let img = load(bytes, image::ImageFormat::Png)?;
    let (width, height) = (img.width(), img.height());
    let color = img.color();

    let (samples, color_space, alpha) = match (color.has_color(), color.has_alpha()) {
        (false, false) => (img.to_luma8().into_raw(), ColorSpace::Gray, None),
        (false, true) => {
            let (luma, alpha) = split_alpha(img.to_luma_alpha8().into_raw(), 2);
            (luma, ColorSpace::Gray, Some(alpha))
        }
        (true, false) => (img.to_rgb8().into_raw(), ColorSpace::Rgb, None),
        (true, true) => {
            let (rgb, alpha) = split_alpha(img.to_rgba8().into_raw(), 4);
            (rgb, ColorSpace::Rgb, Some(alpha))
        }
    };

    let soft_mask = match alpha {
        Some(a) if a.iter().any(|&v| v != u8::MAX) => Some(zlib(&a)?),
        _ => None,
    };

    Ok(DecodedImage {
        width,
        height,
        format: ImageFormat::Png,
        embed: EmbeddedImage::Flate {
            data: zlib(&samples)?,
            color_space,
            soft_mask,
        },
    })
}

/// Split interleaved samples whose last channel is alpha.
fn split_alpha(raw: Vec<u8>, channels: usize) -> (Vec<u8>, Vec<u8>) {
    let pixels = raw.len() / channels;
    let mut color = Vec::with_capacity(pixels * (channels - 1));
    let mut alpha = Vec::with_capacity(pixels);
    for px in raw.chunks_exact(channels) {
        color.extend_from_slice(&px[..channels - 1]);
        alpha.push(px[channels - 1]);
    }
    (color, alpha)
}

fn zlib(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| format!("zlib compression failed: {e}"))?;
    encoder
        .finish()
        .map_err(|e| format!("zlib compression failed: {e}"))
}

/// Component count from the first SOF segment of a JPEG stream.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        // SOF0–SOF15, except DHT (C4), JPG (C8) and DAC (CC).
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            // FF Cn | length(2) | precision(1) | height(2) | width(2) | components(1)
            return bytes.get(i + 9).copied();
        }
        i += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode test image");
        buf
    }

    fn png_rgb(w: u32, h: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30]))),
            image::ImageFormat::Png,
        )
    }

    fn jpeg_rgb(w: u32, h: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 100, 50]))),
            image::ImageFormat::Jpeg,
        )
    }

    // ── detect_format ────────────────────────────────────────────────────

    #[test]
    fn declared_png_wins_over_ambiguous_magic() {
        assert_eq!(detect_format(&[0, 0, 0, 0], "image/png"), ImageFormat::Png);
        assert_eq!(detect_format(&[0xFF, 0xD8], "image/png"), ImageFormat::Png);
    }

    #[test]
    fn declared_jpeg_variants() {
        assert_eq!(detect_format(&[], "image/jpeg"), ImageFormat::Jpeg);
        assert_eq!(detect_format(&[], "image/jpg"), ImageFormat::Jpeg);
        assert_eq!(detect_format(&[], "IMAGE/JPEG; charset=binary"), ImageFormat::Jpeg);
    }

    #[test]
    fn magic_bytes_without_content_type() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF], ""), ImageFormat::Jpeg);
        assert_eq!(detect_format(&[0x89, 0x50, 0x4E, 0x47], ""), ImageFormat::Png);
        assert_eq!(
            detect_format(&[0x89, 0x50], "application/octet-stream"),
            ImageFormat::Png
        );
    }

    #[test]
    fn unknown_when_nothing_matches() {
        assert_eq!(detect_format(b"GIF89a", ""), ImageFormat::Unknown);
        assert_eq!(detect_format(&[], ""), ImageFormat::Unknown);
        assert_eq!(detect_format(&[0xFF], ""), ImageFormat::Unknown);
    }

    #[test]
    fn decode_order_tries_jpeg_first_for_unknown() {
        assert_eq!(
            ImageFormat::Unknown.decode_order(),
            [ImageFormat::Jpeg, ImageFormat::Png]
        );
        assert_eq!(
            ImageFormat::Png.decode_order(),
            [ImageFormat::Png, ImageFormat::Jpeg]
        );
    }

    // ── decode ───────────────────────────────────────────────────────────

    #[test]
    fn png_with_declared_type_uses_png_path() {
        let fetched = FetchedImage::new(png_rgb(40, 20), "image/png");
        let img = decode("a.png", &fetched).expect("decode png");
        assert_eq!(img.format, ImageFormat::Png);
        assert_eq!((img.width, img.height), (40, 20));
        match img.embed {
            EmbeddedImage::Flate {
                color_space,
                soft_mask,
                ..
            } => {
                assert_eq!(color_space, ColorSpace::Rgb);
                assert!(soft_mask.is_none());
            }
            other => panic!("expected Flate, got {other:?}"),
        }
    }

    #[test]
    fn jpeg_magic_without_content_type_uses_jpeg_path() {
        let bytes = jpeg_rgb(30, 60);
        let fetched = FetchedImage::new(bytes.clone(), "");
        let img = decode("b", &fetched).expect("decode jpeg");
        assert_eq!(img.format, ImageFormat::Jpeg);
        assert_eq!((img.width, img.height), (30, 60));
        match img.embed {
            EmbeddedImage::Dct { data, color_space } => {
                assert_eq!(data, bytes, "JPEG bytes are embedded untouched");
                assert_eq!(color_space, ColorSpace::Rgb);
            }
            other => panic!("expected Dct, got {other:?}"),
        }
    }

    #[test]
    fn mislabelled_image_falls_back_to_other_codec() {
        let fetched = FetchedImage::new(png_rgb(8, 8), "image/jpeg");
        let img = decode("c", &fetched).expect("fallback decode");
        assert_eq!(img.format, ImageFormat::Png);
    }

    #[test]
    fn garbage_is_undecodable() {
        let fetched = FetchedImage::new(b"<html>not an image</html>".to_vec(), "text/html");
        let err = decode("https://x/y", &fetched).unwrap_err();
        match err {
            ImageError::Undecodable { locator, detail } => {
                assert_eq!(locator, "https://x/y");
                assert!(detail.contains("Jpeg"), "both attempts reported: {detail}");
                assert!(detail.contains("Png"), "both attempts reported: {detail}");
            }
            other => panic!("expected Undecodable, got {other:?}"),
        }
    }

    #[test]
    fn truncated_png_is_undecodable() {
        let mut bytes = png_rgb(16, 16);
        bytes.truncate(20);
        let fetched = FetchedImage::new(bytes, "image/png");
        assert!(decode("t", &fetched).is_err());
    }

    #[test]
    fn translucent_png_gets_soft_mask() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(img), image::ImageFormat::Png);
        let decoded = decode("m", &FetchedImage::new(bytes, "")).unwrap();
        match decoded.embed {
            EmbeddedImage::Flate { soft_mask, .. } => assert!(soft_mask.is_some()),
            other => panic!("expected Flate, got {other:?}"),
        }
    }

    #[test]
    fn opaque_rgba_png_has_no_soft_mask() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(img), image::ImageFormat::Png);
        let decoded = decode("o", &FetchedImage::new(bytes, "")).unwrap();
        match decoded.embed {
            EmbeddedImage::Flate { soft_mask, .. } => assert!(soft_mask.is_none()),
            other => panic!("expected Flate, got {other:?}"),
        }
    }

    #[test]
    fn grayscale_png_stays_gray() {
        let img = GrayImage::from_pixel(5, 3, Luma([77]));
        let bytes = encode(DynamicImage::ImageLuma8(img), image::ImageFormat::Png);
        let decoded = decode("g", &FetchedImage::new(bytes, "image/png")).unwrap();
        match decoded.embed {
            EmbeddedImage::Flate { color_space, .. } => assert_eq!(color_space, ColorSpace::Gray),
            other => panic!("expected Flate, got {other:?}"),
        }
    }

    #[test]
    fn grayscale_jpeg_reports_one_component() {
        let img = GrayImage::from_pixel(8, 8, Luma([128]));
        let bytes = encode(DynamicImage::ImageLuma8(img), image::ImageFormat::Jpeg);
        assert_eq!(jpeg_components(&bytes), Some(1));
        let decoded = decode("gj", &FetchedImage::new(bytes, "image/jpeg")).unwrap();
        match decoded.embed {
            EmbeddedImage::Dct { color_space, .. } => assert_eq!(color_space, ColorSpace::Gray),
            other => panic!("expected Dct, got {other:?}"),
        }
    }

    #[test]
    fn jpeg_components_rejects_non_jpeg() {
        assert_eq!(jpeg_components(b"\x89PNG"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn split_alpha_separates_channels() {
        let (color, alpha) = split_alpha(vec![1, 2, 3, 4, 5, 6, 7, 8], 4);
        assert_eq!(color, vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(alpha, vec![4, 8]);
    }
}
