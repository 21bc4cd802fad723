//! Image fetching: retrieve the raw bytes behind each locator.
//!
//! Fetching sits behind the [`ImageFetcher`] trait so the HTTP handler and
//! the tests can swap the network for a fake. The production implementation,
//! [`HttpFetcher`], makes exactly one attempt per locator with a bounded
//! timeout; every failure becomes an [`ImageError`] for that locator and the
//! rest of the batch carries on.
//!
//! ## Ordering
//!
//! [`fetch_all`] runs several fetches at once but uses `buffered` (not
//! `buffer_unordered`), so the returned vector lines up index-for-index with
//! the input locators no matter which request finishes first.

use crate::config::AssemblyConfig;
use crate::error::{ImageError, SlidesError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Raw bytes retrieved for one locator, plus the declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// `Content-Type` as declared by the source; empty when absent.
    pub content_type: String,
}

impl FetchedImage {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }
}

/// Something that can turn a locator into image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch a single locator. One attempt; errors are per-image.
    async fn fetch(&self, locator: &str) -> Result<FetchedImage, ImageError>;
}

/// Check if the locator looks like an HTTP(S) URL.
pub fn is_url(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Fetch every locator with at most `concurrency` requests in flight.
///
/// The result at index `i` always belongs to `locators[i]`.
pub async fn fetch_all(
    fetcher: &dyn ImageFetcher,
    locators: &[String],
    concurrency: usize,
) -> Vec<Result<FetchedImage, ImageError>> {
    // Collected first so the returned future stays `Send` inside axum handlers.
    let fetches: Vec<_> = locators
        .iter()
        .map(|locator| fetcher.fetch(locator))
        .collect();
    stream::iter(fetches)
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Production fetcher backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
    allow_local_files: bool,
}

impl HttpFetcher {
    /// Build a fetcher from the assembly limits.
    pub fn new(config: &AssemblyConfig) -> Result<Self, SlidesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SlidesError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
            max_bytes: config.max_image_bytes,
            allow_local_files: config.allow_local_files,
        })
    }

    fn classify(&self, locator: &str, e: reqwest::Error) -> ImageError {
        if e.is_timeout() {
            ImageError::Timeout {
                locator: locator.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            ImageError::Request {
                locator: locator.to_string(),
                detail: e.to_string(),
            }
        }
    }

    async fn fetch_http(&self, locator: &str) -> Result<FetchedImage, ImageError> {
        let mut response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| self.classify(locator, e))?;

        if !response.status().is_success() {
            return Err(ImageError::HttpStatus {
                locator: locator.to_string(),
                status: response.status().as_u16(),
            });
        }

        let too_large = || ImageError::TooLarge {
            locator: locator.to_string(),
            limit: self.max_bytes,
        };

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes)
        {
            return Err(too_large());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Content-Length can be absent or wrong; enforce the cap while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.classify(locator, e))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(
            "Fetched {} ({} bytes, content-type {:?})",
            locator,
            bytes.len(),
            content_type
        );
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }

    async fn read_local(&self, locator: &str) -> Result<FetchedImage, ImageError> {
        let path = Path::new(locator.strip_prefix("file://").unwrap_or(locator));
        let io_err = |e: std::io::Error| ImageError::Request {
            locator: locator.to_string(),
            detail: e.to_string(),
        };

        let meta = tokio::fs::metadata(path).await.map_err(io_err)?;
        if meta.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                locator: locator.to_string(),
                limit: self.max_bytes,
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(io_err)?;
        debug!("Read local image {} ({} bytes)", path.display(), bytes.len());
        Ok(FetchedImage {
            bytes,
            content_type: content_type_for_path(path).to_string(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<FetchedImage, ImageError> {
        if is_url(locator) {
            self.fetch_http(locator).await
        } else if self.allow_local_files && !locator.is_empty() {
            self.read_local(locator).await
        } else {
            Err(ImageError::InvalidLocator {
                locator: locator.to_string(),
            })
        }
    }
}

/// Declared media type for a local file, from its extension.
fn content_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "",
    }
}
