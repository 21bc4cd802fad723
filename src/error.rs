//! Error types for the slides-pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlidesError`]: **Fatal**: the deck cannot be produced at all (no
//!   images requested, HTTP client could not be built, the PDF could not be
//!   serialised). Returned as `Err(SlidesError)` from the `assemble*`
//!   functions.
//!
//! * [`ImageError`]: **Non-fatal**: a single image could not be fetched or
//!   decoded, but every other image is fine. Stored inside
//!   [`crate::output::SlideResult`] and the offending input is skipped, so a
//!   batch with a few dead links still produces a deck.
//!
//! Authentication failures live in [`crate::auth::AuthError`]; they belong
//! to the HTTP surface, not to the assembly pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slides-pdf library.
///
/// Per-image failures use [`ImageError`] and are stored in
/// [`crate::output::SlideResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SlidesError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The request carried no image locators.
    #[error("No images provided: at least one image URL is required")]
    NoImages,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client used for fetching could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The accumulated document could not be serialised to PDF bytes.
    #[error("PDF serialisation failed: {0}")]
    Serialization(String),

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// The input that produced it gets no page; assembly continues with the
/// next locator.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The locator is not an HTTP/HTTPS URL (or a local path where allowed).
    #[error("'{locator}' is not a fetchable image locator")]
    InvalidLocator { locator: String },

    /// Transport-level failure (DNS, connection refused, TLS, body read).
    #[error("Failed to fetch '{locator}': {detail}")]
    Request { locator: String, detail: String },

    /// The fetch exceeded the configured per-image timeout.
    #[error("Fetching '{locator}' timed out after {secs}s")]
    Timeout { locator: String, secs: u64 },

    /// The server answered with a non-success status.
    #[error("Fetching '{locator}' returned HTTP {status}")]
    HttpStatus { locator: String, status: u16 },

    /// The body was larger than the configured per-image limit.
    #[error("Image at '{locator}' exceeds the {limit}-byte limit")]
    TooLarge { locator: String, limit: u64 },

    /// Neither the detected codec nor the fallbacks could read the bytes.
    #[error("Image at '{locator}' could not be decoded: {detail}")]
    Undecodable { locator: String, detail: String },
}

impl ImageError {
    /// The locator this error refers to.
    pub fn locator(&self) -> &str {
        match self {
            ImageError::InvalidLocator { locator }
            | ImageError::Request { locator, .. }
            | ImageError::Timeout { locator, .. }
            | ImageError::HttpStatus { locator, .. }
            | ImageError::TooLarge { locator, .. }
            | ImageError::Undecodable { locator, .. } => locator,
        }
    }

    /// True when the image was never retrieved (as opposed to retrieved but unreadable).
    pub fn is_fetch_failure(&self) -> bool {
        !matches!(self, ImageError::Undecodable { .. })
    }
}
