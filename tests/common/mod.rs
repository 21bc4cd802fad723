//! Shared fixtures for the integration tests: in-memory images and fake fetchers.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{Document, Object};
use slides_pdf::{FetchedImage, ImageError, ImageFetcher};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Route library logs through the test harness; `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Images ───────────────────────────────────────────────────────────────

fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 90, 160])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode fixture");
    buf
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Jpeg)
}

// ── Fetchers ─────────────────────────────────────────────────────────────

/// Serves a fixed locator → image table; anything else is unreachable.
#[derive(Default)]
pub struct MapFetcher {
    images: HashMap<String, FetchedImage>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: &str, bytes: Vec<u8>, content_type: &str) -> Self {
        self.images
            .insert(locator.to_string(), FetchedImage::new(bytes, content_type));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MapFetcher {
    async fn fetch(&self, locator: &str) -> Result<FetchedImage, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(locator.to_string());
        self.images
            .get(locator)
            .cloned()
            .ok_or_else(|| ImageError::Request {
                locator: locator.to_string(),
                detail: "connection refused".into(),
            })
    }
}

// ── PDF inspection ───────────────────────────────────────────────────────

/// `Filter` of the image drawn on each page, in page order.
pub fn page_image_filters(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).expect("reload PDF");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).expect("page dict");
            let resources = page
                .get(b"Resources")
                .and_then(Object::as_dict)
                .expect("resources");
            let xobjects = resources
                .get(b"XObject")
                .and_then(Object::as_dict)
                .expect("xobjects");
            let image_id = xobjects
                .get(b"Im0")
                .and_then(Object::as_reference)
                .expect("image ref");
            let stream = doc
                .get_object(image_id)
                .and_then(Object::as_stream)
                .expect("image stream");
            let filter = stream
                .dict
                .get(b"Filter")
                .and_then(Object::as_name)
                .expect("filter");
            String::from_utf8_lossy(filter).into_owned()
        })
        .collect()
}

pub fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).expect("reload PDF").get_pages().len()
}
