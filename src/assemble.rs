//! Assembly entry points: image locators in, PDF deck out.
//!
//! [`assemble`] runs the four pipeline stages for one request. The
//! contract that matters most is partial-failure tolerance: any input whose
//! fetch or decode fails is skipped and reported in
//! [`SlideDeck::slides`](crate::output::SlideDeck), never raised. A batch in
//! which every image fails still returns `Ok` with a valid zero-page PDF.
//! Only an empty request and a failure to serialise the document are errors.

use crate::config::AssemblyConfig;
use crate::error::{ImageError, SlidesError};
use crate::output::{AssemblyStats, SlideDeck, SlideResult};
use crate::pipeline::compose::SlideDocument;
use crate::pipeline::detect::{self, DecodedImage};
use crate::pipeline::emit;
use crate::pipeline::fetch::{self, HttpFetcher, ImageFetcher};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A validated request: at least one locator, optional title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRequest {
    image_refs: Vec<String>,
    title: Option<String>,
}

impl SlideRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    /// [`SlidesError::NoImages`] when `image_refs` is empty.
    pub fn new(image_refs: Vec<String>, title: Option<String>) -> Result<Self, SlidesError> {
        if image_refs.is_empty() {
            return Err(SlidesError::NoImages);
        }
        Ok(Self { image_refs, title })
    }

    pub fn image_refs(&self) -> &[String] {
        &self.image_refs
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Assemble a deck, fetching images through `fetcher`.
///
/// # Returns
/// `Ok(SlideDeck)` whenever the PDF could be serialised, even if some or
/// all inputs were skipped (check `deck.stats.skipped()`).
///
/// # Errors
/// Only [`SlidesError::Serialization`] or [`SlidesError::Internal`]; request
/// validation already happened in [`SlideRequest::new`].
pub async fn assemble(
    request: &SlideRequest,
    fetcher: &dyn ImageFetcher,
    config: &AssemblyConfig,
) -> Result<SlideDeck, SlidesError> {
    let total_start = Instant::now();
    let locators = request.image_refs();
    let total = locators.len();
    info!("Assembling deck: {} images, title {:?}", total, request.title());

    if let Some(ref cb) = config.progress_callback {
        cb.on_assembly_start(total);
    }

    // ── Step 1: Fetch ────────────────────────────────────────────────────
    let fetch_start = Instant::now();
    let fetched = fetch::fetch_all(fetcher, locators, config.concurrency).await;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    debug!(
        "Fetched {}/{} images in {}ms",
        fetched.iter().filter(|r| r.is_ok()).count(),
        total,
        fetch_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        for (idx, result) in fetched.iter().enumerate() {
            if let Ok(image) = result {
                cb.on_image_fetched(idx + 1, total, image.bytes.len());
            }
        }
    }

    // ── Step 2: Detect + decode ──────────────────────────────────────────
    let decode_start = Instant::now();
    let owned_locators = locators.to_vec();
    let decoded: Vec<Result<DecodedImage, ImageError>> = tokio::task::spawn_blocking(move || {
        fetched
            .into_iter()
            .zip(owned_locators.iter())
            .map(|(result, locator)| result.and_then(|image| detect::decode(locator, &image)))
            .collect()
    })
    .await
    .map_err(|e| SlidesError::Internal(format!("Decode task panicked: {e}")))?;
    let decode_duration_ms = decode_start.elapsed().as_millis() as u64;

    // ── Step 3: Compose, in input order ──────────────────────────────────
    let mut doc = SlideDocument::new(request.title());
    let mut slides = Vec::with_capacity(total);
    let mut fetch_failures = 0;
    let mut decode_failures = 0;

    for (idx, (locator, outcome)) in locators.iter().zip(decoded).enumerate() {
        let input_num = idx + 1;
        match outcome {
            Ok(image) => {
                let placement = doc.add_slide(&image)?;
                let page_num = doc.page_count();
                if let Some(ref cb) = config.progress_callback {
                    cb.on_slide_added(input_num, page_num, total);
                }
                slides.push(SlideResult {
                    input_num,
                    locator: locator.clone(),
                    page_num: Some(page_num),
                    format: Some(image.format),
                    pixel_width: image.width,
                    pixel_height: image.height,
                    placement: Some(placement),
                    error: None,
                });
            }
            Err(e) => {
                warn!("Skipping image {}/{}: {}", input_num, total, e);
                if e.is_fetch_failure() {
                    fetch_failures += 1;
                } else {
                    decode_failures += 1;
                }
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_skipped(input_num, total, &e.to_string());
                }
                slides.push(SlideResult::skipped(input_num, locator, e));
            }
        }
    }

    // ── Step 4: Emit ─────────────────────────────────────────────────────
    let pages = doc.page_count();
    if pages == 0 {
        warn!("None of the {} images could be used; emitting an empty document", total);
    }
    let download = emit::emit(doc, request.title(), &config.default_title)?;

    let stats = AssemblyStats {
        requested: total,
        pages,
        fetch_failures,
        decode_failures,
        fetch_duration_ms,
        decode_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        output_bytes: download.bytes.len(),
    };

    info!(
        "Deck assembled: {}/{} pages, {} bytes, {}ms total",
        pages, total, stats.output_bytes, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_assembly_complete(total, pages);
    }

    Ok(SlideDeck {
        pdf: download.bytes,
        filename: download.filename,
        media_type: download.media_type,
        slides,
        stats,
    })
}

/// Assemble a deck using an [`HttpFetcher`] built from `config`.
pub async fn assemble_http(
    request: &SlideRequest,
    config: &AssemblyConfig,
) -> Result<SlideDeck, SlidesError> {
    let fetcher = HttpFetcher::new(config)?;
    assemble(request, &fetcher, config).await
}

/// Assemble a deck and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn assemble_to_file(
    request: &SlideRequest,
    output_path: impl AsRef<Path>,
    config: &AssemblyConfig,
) -> Result<AssemblyStats, SlidesError> {
    let deck = assemble_http(request, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| SlidesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &deck.pdf)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), deck.pdf.len());
    Ok(deck.stats)
}

/// Synchronous wrapper around [`assemble_http`].
///
/// Creates a temporary tokio runtime internally.
pub fn assemble_sync(
    request: &SlideRequest,
    config: &AssemblyConfig,
) -> Result<SlideDeck, SlidesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlidesError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(assemble_http(request, config))
}
