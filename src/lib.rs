//! # slides-pdf
//!
//! Assemble an ordered list of slide images into a single PDF download.
//!
//! ## Why this crate?
//!
//! Slide images are generated elsewhere and live behind URLs. Users want one
//! file they can hand around, not a folder of PNGs. This crate fetches each
//! image, works out whether it is PNG or JPEG, places it centred on its own
//! A4-landscape page (842 × 595 pt) without distorting it, and returns the
//! finished PDF with a filename derived from the deck title. A dead link or a
//! corrupt image costs one page, never the whole deck.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [url, url, url] + title
//!  │
//!  ├─ 1. Fetch    concurrent, order-preserving, one attempt per image
//!  ├─ 2. Detect   PNG / JPEG / unknown, decode (CPU-bound, spawn_blocking)
//!  ├─ 3. Compose  one 842 × 595 pt page per usable image, aspect-fit + centred
//!  └─ 4. Emit     PDF bytes + "{title}.pdf" + per-image report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slides_pdf::{assemble_http, AssemblyConfig, SlideRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = SlideRequest::new(
//!         vec![
//!             "https://cdn.example.com/deck/1.png".into(),
//!             "https://cdn.example.com/deck/2.jpg".into(),
//!         ],
//!         Some("Quarterly Report".into()),
//!     )?;
//!     let deck = assemble_http(&request, &AssemblyConfig::default()).await?;
//!     std::fs::write(&deck.filename, &deck.pdf)?;
//!     eprintln!("{} pages, {} skipped", deck.page_count(), deck.stats.skipped());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router for `POST /api/studio/slides/pdf` |
//! | `cli`    | on      | The `slides-pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Library-only users can drop both:
//! ```toml
//! slides-pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod auth;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{assemble, assemble_http, assemble_sync, assemble_to_file, SlideRequest};
pub use auth::{AuthError, AuthProvider, Identity, StaticTokenAuth, SupabaseAuth};
pub use config::{AssemblyConfig, AssemblyConfigBuilder, DEFAULT_TITLE};
pub use error::{ImageError, SlidesError};
pub use output::{AssemblyStats, SlideDeck, SlideResult};
pub use pipeline::compose::{fit_centered, Placement, PAGE_HEIGHT_PT, PAGE_WIDTH_PT};
pub use pipeline::detect::{detect_format, ImageFormat};
pub use pipeline::fetch::{FetchedImage, HttpFetcher, ImageFetcher};
pub use progress::{AssemblyProgressCallback, NoopProgressCallback, ProgressCallback};
