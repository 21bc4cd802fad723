//! Configuration types for slide-deck assembly.
//!
//! All assembly behaviour is controlled through [`AssemblyConfig`], built
//! via its [`AssemblyConfigBuilder`]. The same config is shared by the HTTP
//! handler (one clone in the router state) and the `build` CLI command, so
//! both entry points apply identical limits.

use crate::error::SlidesError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Filename stem used when a request has no usable title.
pub const DEFAULT_TITLE: &str = "slides";

/// Configuration for assembling a slide deck.
///
/// Built via [`AssemblyConfig::builder()`] or using
/// [`AssemblyConfig::default()`].
///
/// # Example
/// ```rust
/// use slides_pdf::AssemblyConfig;
///
/// let config = AssemblyConfig::builder()
///     .fetch_timeout_secs(10)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AssemblyConfig {
    /// Per-image fetch timeout in seconds. Default: 30.
    ///
    /// A single unreachable locator must not stall the whole request, so
    /// every fetch is bounded. A timed-out fetch is a skipped image, never a
    /// failed request.
    pub fetch_timeout_secs: u64,

    /// Number of images fetched at the same time. Default: 4.
    ///
    /// Results are always reassembled in input order, so this only affects
    /// wall-clock time.
    pub concurrency: usize,

    /// Largest accepted image body in bytes. Default: 25 MiB.
    ///
    /// Larger bodies are skipped like any other per-image failure.
    pub max_image_bytes: u64,

    /// Filename stem used when the request title is absent or blank. Default: `"slides"`.
    pub default_title: String,

    /// Accept plain filesystem paths and `file://` locators. Default: false.
    ///
    /// Only the local `build` command turns this on; the HTTP server must
    /// never read files named by a caller.
    pub allow_local_files: bool,

    /// `User-Agent` sent with every image request.
    pub user_agent: String,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            concurrency: 4,
            max_image_bytes: 25 * 1024 * 1024,
            default_title: DEFAULT_TITLE.to_string(),
            allow_local_files: false,
            user_agent: concat!("slides-pdf/", env!("CARGO_PKG_VERSION")).to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AssemblyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyConfig")
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("default_title", &self.default_title)
            .field("allow_local_files", &self.allow_local_files)
            .field("user_agent", &self.user_agent)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn AssemblyProgressCallback>"),
            )
            .finish()
    }
}

impl AssemblyConfig {
    /// Create a new builder for `AssemblyConfig`.
    pub fn builder() -> AssemblyConfigBuilder {
        AssemblyConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AssemblyConfig`].
#[derive(Debug)]
pub struct AssemblyConfigBuilder {
    config: AssemblyConfig,
}

impl AssemblyConfigBuilder {
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_image_bytes(mut self, bytes: u64) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.config.default_title = title.into();
        self
    }

    pub fn allow_local_files(mut self, v: bool) -> Self {
        self.config.allow_local_files = v;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssemblyConfig, SlidesError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 {
            return Err(SlidesError::InvalidConfig(
                "Fetch timeout must be at least 1 second".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(SlidesError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(SlidesError::InvalidConfig(
                "Maximum image size must be greater than zero".into(),
            ));
        }
        if c.default_title.trim().is_empty() {
            return Err(SlidesError::InvalidConfig(
                "Default title must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
