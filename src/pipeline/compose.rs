//! Page composition: place each decoded image on its own A4-landscape page.
//!
//! Every page is 842 × 595 pt. The image keeps its aspect ratio, spans the
//! full width or the full height of the page (whichever it hits first), and
//! is centred on the other axis, so slides with unusual ratios are
//! letterboxed instead of distorted.
//!
//! [`SlideDocument`] is the per-request accumulator. It is created empty,
//! grows by one page per [`SlideDocument::add_slide`] call and is consumed by
//! [`SlideDocument::save`]; nothing is shared between requests.

use crate::error::SlidesError;
use crate::pipeline::detect::{DecodedImage, EmbeddedImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

/// Page width in points (A4 landscape).
pub const PAGE_WIDTH_PT: f64 = 842.0;
/// Page height in points (A4 landscape).
pub const PAGE_HEIGHT_PT: f64 = 595.0;

/// `Producer` entry written into every document.
pub const PRODUCER: &str = concat!("slides-pdf ", env!("CARGO_PKG_VERSION"));

/// Where an image is drawn on the page, in points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Fit a `width × height` px image onto the page, preserving aspect ratio and centring it.
pub fn fit_centered(width: u32, height: u32) -> Placement {
    let image_aspect = f64::from(width) / f64::from(height);
    let page_aspect = PAGE_WIDTH_PT / PAGE_HEIGHT_PT;

    let (draw_width, draw_height) = if image_aspect > page_aspect {
        (PAGE_WIDTH_PT, PAGE_WIDTH_PT / image_aspect)
    } else {
        (PAGE_HEIGHT_PT * image_aspect, PAGE_HEIGHT_PT)
    };

    Placement {
        x: (PAGE_WIDTH_PT - draw_width) / 2.0,
        y: (PAGE_HEIGHT_PT - draw_height) / 2.0,
        width: draw_width,
        height: draw_height,
    }
}

/// The PDF being built for one request.
pub struct SlideDocument {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl SlideDocument {
    /// Start an empty document. `title` goes into the document info, when non-blank.
    pub fn new(title: Option<&str>) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut info = Dictionary::new();
        info.set("Producer", Object::string_literal(PRODUCER));
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            info.set("Title", text_string(title));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", Object::Reference(info_id));

        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append a page showing `image` and return where it was drawn.
    pub fn add_slide(&mut self, image: &DecodedImage) -> Result<Placement, SlidesError> {
        let placement = fit_centered(image.width, image.height);
        let image_id = self.add_image_xobject(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(placement.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        real(placement.height),
                        real(placement.x),
                        real(placement.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| SlidesError::Serialization(format!("content stream: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content_bytes));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                real(PAGE_WIDTH_PT),
                real(PAGE_HEIGHT_PT),
            ]),
        );
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Reference(content_id));

        let page_id = self.doc.add_object(page);
        self.page_ids.push(page_id);

        debug!(
            "Page {}: {}x{} px image at ({:.1}, {:.1}) size {:.1}x{:.1} pt",
            self.page_ids.len(),
            image.width,
            image.height,
            placement.x,
            placement.y,
            placement.width,
            placement.height
        );
        Ok(placement)
    }

    fn add_image_xobject(&mut self, image: &DecodedImage) -> ObjectId {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(i64::from(image.width)));
        dict.set("Height", Object::Integer(i64::from(image.height)));
        dict.set("BitsPerComponent", Object::Integer(8));

        let data = match &image.embed {
            EmbeddedImage::Dct { data, color_space } => {
                dict.set("ColorSpace", Object::Name(color_space.pdf_name().to_vec()));
                dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
                if *color_space == crate::pipeline::detect::ColorSpace::Cmyk {
                    // Adobe CMYK JPEGs store inverted samples.
                    dict.set(
                        "Decode",
                        Object::Array([1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec()),
                    );
                }
                data.clone()
            }
            EmbeddedImage::Flate {
                data,
                color_space,
                soft_mask,
            } => {
                dict.set("ColorSpace", Object::Name(color_space.pdf_name().to_vec()));
                dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
                if let Some(mask) = soft_mask {
                    let mask_id = self.add_soft_mask(image.width, image.height, mask);
                    dict.set("SMask", Object::Reference(mask_id));
                }
                data.clone()
            }
        };

        self.doc
            .add_object(Stream::new(dict, data).with_compression(false))
    }

    fn add_soft_mask(&mut self, width: u32, height: u32, data: &[u8]) -> ObjectId {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(i64::from(width)));
        dict.set("Height", Object::Integer(i64::from(height)));
        dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        self.doc
            .add_object(Stream::new(dict, data.to_vec()).with_compression(false))
    }

    /// Write the page tree and catalog and serialise the document.
    ///
    /// A document with no pages is still a valid PDF.
    pub fn save(mut self) -> Result<Vec<u8>, SlidesError> {
        let kids: Vec<Object> = self
            .page_ids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(kids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| SlidesError::Serialization(e.to_string()))?;
        Ok(output)
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        Object::string_literal(s)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        bytes.extend(s.encode_utf16().flat_map(u16::to_be_bytes));
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}
