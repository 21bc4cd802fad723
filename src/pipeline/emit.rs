//! Document emission: serialised PDF plus the metadata to serve it as a download.

use crate::error::SlidesError;
use crate::pipeline::compose::SlideDocument;
use tracing::debug;

/// Media type of every emitted document.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Extension appended to the suggested filename.
pub const PDF_EXTENSION: &str = ".pdf";

/// A finished document ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDownload {
    pub bytes: Vec<u8>,
    /// Percent-encoded filename, including the extension.
    pub filename: String,
    pub media_type: &'static str,
}

impl PdfDownload {
    /// `Content-Disposition` header value for this download.
    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }
}

/// Percent-encoded download name: the title when it has content, else `default_title`.
///
/// Differs from JavaScript's `encodeURIComponent` in two ways:
/// * `urlencoding` also escapes `!'()*`, so `"Deck (v2)"` becomes
///   `Deck%20%28v2%29.pdf`; browsers decode both forms to the same name.
/// * A whitespace-only title counts as missing and yields the default,
///   where `encodeURIComponent(" ")` would give `%20.pdf`.
pub fn suggested_filename(title: Option<&str>, default_title: &str) -> String {
    format!(
        "{}{}",
        urlencoding::encode(title_stem(title, default_title)),
        PDF_EXTENSION
    )
}

/// Unencoded filename for writing to the local filesystem.
///
/// Keeps the title readable (`My Deck.pdf`) and replaces only characters
/// that are path separators or otherwise invalid in common filesystems.
pub fn local_filename(title: Option<&str>, default_title: &str) -> String {
    let stem: String = title_stem(title, default_title)
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = match stem.as_str() {
        "." | ".." => default_title.to_string(),
        _ => stem,
    };
    format!("{stem}{PDF_EXTENSION}")
}

fn title_stem<'a>(title: Option<&'a str>, default_title: &'a str) -> &'a str {
    title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(default_title)
}

/// `attachment; filename="…"` for an already-encoded filename.
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

/// Serialise `doc` and attach its download metadata.
pub fn emit(
    doc: SlideDocument,
    title: Option<&str>,
    default_title: &str,
) -> Result<PdfDownload, SlidesError> {
    let pages = doc.page_count();
    let bytes = doc.save()?;
    let filename = suggested_filename(title, default_title);
    debug!("Emitted {} ({} pages, {} bytes)", filename, pages, bytes.len());

    Ok(PdfDownload {
        bytes,
        filename,
        media_type: PDF_MEDIA_TYPE,
    })
}
