//! # pdf2img
//!
//! Convert PDF documents into one image file per page.
//!
//! ## Why this crate?
//!
//! Turning a PDF into page images sounds like a loop around a renderer, but
//! real inputs bring real decisions: locked documents, 400-page scans,
//! pages too large for the chosen format, and output files left over from
//! an earlier run. This crate runs those decisions through a single
//! [`ConversionDelegate`] on the caller's thread while the pages themselves
//! render and encode in parallel on a bounded worker pool.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    check the file exists and starts with %PDF
//!  ├─ 2. Open     unlock via the delegate (retry or skip), large-job check
//!  ├─ 3. Render   rasterise each page via pdfium on the worker pool
//!  ├─ 4. Encode   jpg / png / webp / bmp / avif, png fallback when too large
//!  └─ 5. Output   <dir>/<stem>/1.png, 2.png … (or 001.png with padding)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img::{convert, ConversionConfig, OutputFormat, PolicyDelegate};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .format(OutputFormat::Webp)
//!         .pad_filenames(true)
//!         .build()?;
//!     let delegate = PolicyDelegate::new().password("s3cret");
//!     for result in convert(&["report.pdf"], config, &delegate)? {
//!         println!("{}: {} pages", result.path.display(), result.outcome.pages().len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2img = { version = "0.1", default-features = false }
//! ```
//!
//! ## Format limits
//!
//! | Format | Max px per side | Notes |
//! |--------|-----------------|-------|
//! | `png`  | none            | fallback format |
//! | `jpg`  | none            | quality from [`ConversionConfig::jpeg_quality`] |
//! | `bmp`  | none            | |
//! | `webp` | 16383           | lossless |
//! | `avif` | 65535           | |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod delegate;
pub mod error;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat, ProgressMode};
pub use convert::{convert, inspect, Converter, DocumentInfo};
pub use delegate::{ConversionDelegate, NoopDelegate, PolicyDelegate, SharedDelegate};
pub use error::{PageError, Pdf2ImgError};
pub use output::{
    BatchSummary, ConversionResult, DocumentOutcome, DocumentResult, DocumentSkipReason,
    JobProgress, PageResult, SkipReason,
};
pub use pipeline::conflict::ConflictPolicy;
pub use pipeline::document::{Document, DocumentSource, ProtectionState};
pub use pipeline::encode::FormatPolicy;
pub use pipeline::render::{PixelBufferError, RawPixelBuffer};
