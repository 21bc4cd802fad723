//! Output types returned by the assembly entry points.

use crate::error::ImageError;
use crate::pipeline::compose::Placement;
use crate::pipeline::detect::ImageFormat;
use serde::{Deserialize, Serialize};

/// What happened to one requested image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideResult {
    /// 1-indexed position in the request's locator list.
    pub input_num: usize,
    pub locator: String,
    /// 1-indexed page in the output PDF; `None` when the input was skipped.
    pub page_num: Option<usize>,
    /// Codec that read the image.
    pub format: Option<ImageFormat>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub placement: Option<Placement>,
    /// Why the input was skipped, if it was.
    pub error: Option<ImageError>,
}

impl SlideResult {
    pub(crate) fn skipped(input_num: usize, locator: &str, error: ImageError) -> Self {
        Self {
            input_num,
            locator: locator.to_string(),
            page_num: None,
            format: None,
            pixel_width: 0,
            pixel_height: 0,
            placement: None,
            error: Some(error),
        }
    }

    pub fn is_page(&self) -> bool {
        self.page_num.is_some()
    }
}

/// Counters and timings for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    /// Locators in the request.
    pub requested: usize,
    /// Pages in the output PDF.
    pub pages: usize,
    /// Inputs that never produced bytes.
    pub fetch_failures: usize,
    /// Inputs whose bytes could not be decoded.
    pub decode_failures: usize,
    pub fetch_duration_ms: u64,
    pub decode_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Size of the serialised PDF.
    pub output_bytes: usize,
}

impl AssemblyStats {
    pub fn skipped(&self) -> usize {
        self.fetch_failures + self.decode_failures
    }
}

/// A finished deck: PDF bytes, download metadata and a per-input report.
#[derive(Debug, Clone)]
pub struct SlideDeck {
    pub pdf: Vec<u8>,
    /// Percent-encoded filename with extension.
    pub filename: String,
    pub media_type: &'static str,
    /// One entry per requested locator, in request order.
    pub slides: Vec<SlideResult>,
    pub stats: AssemblyStats,
}

impl SlideDeck {
    /// `Content-Disposition` header value for serving the deck.
    pub fn content_disposition(&self) -> String {
        crate::pipeline::emit::content_disposition(&self.filename)
    }

    pub fn page_count(&self) -> usize {
        self.stats.pages
    }
}
