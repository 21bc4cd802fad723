//! Progress-callback trait for per-image assembly events.
//!
//! Inject an [`Arc<dyn AssemblyProgressCallback>`] via
//! [`crate::config::AssemblyConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the requested images.
//!
//! The `build` CLI command drives an indicatif progress bar from these
//! events; the HTTP server runs without a callback.
//!
//! # Example
//!
//! ```rust
//! use slides_pdf::{AssemblyConfig, AssemblyProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     added: AtomicUsize,
//! }
//!
//! impl AssemblyProgressCallback for CountingCallback {
//!     fn on_slide_added(&self, input_num: usize, page_num: usize, total_inputs: usize) {
//!         self.added.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("input {input_num}/{total_inputs} → page {page_num}");
//!     }
//! }
//!
//! let config = AssemblyConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { added: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the assembly pipeline as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Input numbers are 1-indexed positions in the
/// request's locator list; page numbers are 1-indexed positions in the PDF.
pub trait AssemblyProgressCallback: Send + Sync {
    /// Called once before any image is fetched.
    fn on_assembly_start(&self, total_inputs: usize) {
        let _ = total_inputs;
    }

    /// Called when an input's image was fetched (before decoding).
    fn on_image_fetched(&self, input_num: usize, total_inputs: usize, bytes: usize) {
        let _ = (input_num, total_inputs, bytes);
    }

    /// Called when an input became a page.
    fn on_slide_added(&self, input_num: usize, page_num: usize, total_inputs: usize) {
        let _ = (input_num, page_num, total_inputs);
    }

    /// Called when an input was skipped.
    ///
    /// # Arguments
    /// * `error`: human-readable reason
    fn on_image_skipped(&self, input_num: usize, total_inputs: usize, error: &str) {
        let _ = (input_num, total_inputs, error);
    }

    /// Called once after the PDF has been serialised.
    fn on_assembly_complete(&self, total_inputs: usize, page_count: usize) {
        let _ = (total_inputs, page_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AssemblyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AssemblyConfig`].
pub type ProgressCallback = Arc<dyn AssemblyProgressCallback>;
