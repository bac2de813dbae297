//! Error types for the pdf2img library.
//!
//! Two distinct error types reflect two distinct blast radii:
//!
//! * [`Pdf2ImgError`]: **Document-level**: this document cannot be
//!   converted at all (missing file, not a PDF, corrupt xref, output
//!   directory not creatable). Recorded as
//!   [`crate::output::DocumentOutcome::Failed`]; the rest of the batch
//!   carries on.
//!
//! * [`PageError`]: **Page-level**: a single page failed to render or
//!   write but its siblings are fine. Stored inside
//!   [`crate::output::ConversionResult::Failed`].
//!
//! Locked documents, wrong passwords, existing output files and oversized
//! pages are not errors at all: they are resolved through the
//! [`crate::delegate::ConversionDelegate`] and end as a retry or a skip.

use std::path::PathBuf;
use thiserror::Error;

/// All document-level errors returned by the pdf2img library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path cannot name a document (no file name to derive an output folder from).
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The per-document output folder could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure while preparing a document.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the pdf2img executable.\n\
  • Install pdfium system-wide (see https://github.com/bblanchon/pdfium-binaries).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The document keeps converting its other pages.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page index outside the document. Only reachable through a backend
    /// that misreports its page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The pixel buffer could not be turned into the target image format.
    #[error("Page {page}: {format} encoding failed: {detail}")]
    EncodeFailed {
        page: usize,
        format: String,
        detail: String,
    },

    /// The encoded image could not be written to disk.
    #[error("Page {page}: failed to write '{}': {detail}", path.display())]
    WriteFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },

    /// The worker thread panicked while converting this page.
    #[error("Page {page}: worker panicked: {detail}")]
    WorkerPanicked { page: usize, detail: String },
}

impl PageError {
    /// 1-based page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::PageOutOfRange { page, .. }
            | PageError::RenderFailed { page, .. }
            | PageError::EncodeFailed { page, .. }
            | PageError::WriteFailed { page, .. }
            | PageError::WorkerPanicked { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display_shows_magic() {
        let e = Pdf2ImgError::NotAPdf {
            path: PathBuf::from("notes.txt"),
            magic: *b"hell",
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains("104"), "got: {msg}");
    }

    #[test]
    fn output_dir_failed_keeps_source() {
        use std::error::Error as _;
        let e = Pdf2ImgError::OutputDirFailed {
            path: PathBuf::from("/ro/report"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        assert!(e.to_string().contains("/ro/report"));
        assert!(e.source().is_some());
    }

    #[test]
    fn page_error_reports_its_page() {
        let e = PageError::WriteFailed {
            page: 7,
            path: PathBuf::from("out/007.png"),
            detail: "disk full".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().contains("007.png"));
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::RenderFailed {
            page: 2,
            detail: "bad stream".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("RenderFailed"), "got: {json}");
    }
}
