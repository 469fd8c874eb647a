//! Error types for the edgequake-pdf2img library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2ImgError`] — **Fatal**: the run cannot proceed at all (missing
//!   file, unreadable PDF, invalid quality). Returned as `Err(Pdf2ImgError)`
//!   from the top-level `convert*` functions, always before any page is
//!   dispatched.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render error,
//!   renderer panic, timeout, write failure) while every other page is fine.
//!   Stored inside [`crate::output::RenderResult`] and aggregated into the
//!   post-run summary instead of halting the batch.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2img library.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page count is unknown or beyond what the renderer can address.
    #[error("Invalid page count for '{path}': {detail}")]
    InvalidPageCount { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Image quality outside 1–100.
    #[error("Quality must be 1–100, got {0}")]
    InvalidQuality(u8),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive creation failed.
    ///
    /// Never returned by `convert*` once pages are on disk; the run downgrades
    /// it to [`crate::output::ConversionOutput::archive_error`].
    #[error("Failed to create archive '{path}': {source}")]
    ArchiveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every page failed; the output directory is empty.
    ///
    /// Returned by [`crate::output::ConversionOutput::check`] for callers that
    /// treat a fully failed batch as an error.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium into the system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page. `page` is always 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The renderer returned an error for this page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The renderer panicked while working on this page.
    #[error("Page {page}: renderer panicked: {detail}")]
    Panicked { page: usize, detail: String },

    /// The page exceeded the configured per-page timeout.
    #[error("Page {page}: rendering timed out after {limit_ms}ms")]
    Timeout { page: usize, limit_ms: u64 },

    /// The run was cancelled before this page started.
    #[error("Page {page}: cancelled before rendering started")]
    Cancelled { page: usize },

    /// No result ever arrived for this page.
    #[error("Page {page}: no result was produced")]
    Lost { page: usize },

    /// The page rendered but its file could not be written.
    #[error("Page {page}: failed to write '{path}': {detail}")]
    WriteFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::Panicked { page, .. }
            | PageError::Timeout { page, .. }
            | PageError::Cancelled { page }
            | PageError::Lost { page }
            | PageError::WriteFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pages_failed_display() {
        let e = Pdf2ImgError::AllPagesFailed {
            total: 4,
            first_error: "Page 1: rasterisation failed: bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 4 pages"), "got: {msg}");
        assert!(msg.contains("bad xref"), "got: {msg}");
    }

    #[test]
    fn invalid_quality_display() {
        assert!(Pdf2ImgError::InvalidQuality(101).to_string().contains("101"));
    }

    #[test]
    fn page_error_reports_its_page() {
        let errors = [
            PageError::RenderFailed {
                page: 3,
                detail: "corrupt".into(),
            },
            PageError::Panicked {
                page: 3,
                detail: "boom".into(),
            },
            PageError::Timeout { page: 3, limit_ms: 5000 },
            PageError::Cancelled { page: 3 },
            PageError::Lost { page: 3 },
            PageError::WriteFailed {
                page: 3,
                path: PathBuf::from("out/page_003.png"),
                detail: "disk full".into(),
            },
        ];
        for e in errors {
            assert_eq!(e.page(), 3);
            assert!(e.to_string().starts_with("Page 3:"), "got: {e}");
        }
    }

    #[test]
    fn timeout_display() {
        let e = PageError::Timeout {
            page: 7,
            limit_ms: 30_000,
        };
        assert!(e.to_string().contains("30000ms"));
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::Lost { page: 2 };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
