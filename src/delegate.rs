//! Decision and progress callbacks the conversion core consumes.
//!
//! The core never talks to a human directly. Whenever it needs a password,
//! a yes/no decision or wants to report progress it calls a
//! [`ConversionDelegate`]. A terminal front-end answers by prompting; a batch
//! job answers from fixed settings with [`PolicyDelegate`].
//!
//! # Threading
//!
//! Every delegate method is invoked from the thread that called
//! [`crate::Converter::convert`], never from a page worker. A delegate may
//! therefore block for as long as a human takes to answer without stalling
//! the worker pool. The trait is still `Send + Sync` so one delegate can be
//! shared behind an `Arc` between several converters.
//!
//! # Example
//!
//! ```rust
//! use pdf2img::ConversionDelegate;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counting {
//!     pages: AtomicUsize,
//! }
//!
//! impl ConversionDelegate for Counting {
//!     fn on_progress(&self, _document: &Path, _count: usize, _total: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let d = Counting { pages: AtomicUsize::new(0) };
//! d.on_progress(Path::new("a.pdf"), 1, 3);
//! assert_eq!(d.pages.load(Ordering::SeqCst), 1);
//! ```

use crate::config::OutputFormat;
use crate::output::DocumentOutcome;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Answers the core's questions and receives its progress events.
///
/// All methods have defaults that never block, so implementors override only
/// what they care about. The defaults skip locked documents, keep existing
/// files, and accept large jobs and oversize fallbacks.
pub trait ConversionDelegate: Send + Sync {
    /// Ask for the password of a protected document.
    ///
    /// `None` means the user cancelled; [`Self::confirm_skip`] is asked next.
    fn prompt_password(&self, file_name: &str) -> Option<String> {
        let _ = file_name;
        None
    }

    /// After a cancelled password prompt: skip this document?
    ///
    /// Returning `false` re-opens the password prompt.
    fn confirm_skip(&self, file_name: &str) -> bool {
        let _ = file_name;
        true
    }

    /// Report a recoverable problem (wrong password, unreadable file).
    fn notify_error(&self, message: &str) {
        warn!("{message}");
    }

    /// The document has more pages than the configured threshold: convert anyway?
    fn confirm_large_job(&self, document: &Path, page_count: usize) -> bool {
        let _ = (document, page_count);
        true
    }

    /// `path` already exists: replace it?
    fn confirm_overwrite(&self, path: &Path) -> bool {
        let _ = path;
        false
    }

    /// A `width × height` page exceeds `max_dim` for `format`: write it in
    /// the fallback format instead?
    fn confirm_oversize(&self, format: OutputFormat, width: u32, height: u32, max_dim: u32) -> bool {
        let _ = (format, width, height, max_dim);
        true
    }

    /// Called once per document after it opened, before any page is submitted.
    fn on_document_start(&self, document: &Path, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// Called exactly once per page.
    ///
    /// `count` is pages finished or pages submitted depending on
    /// [`crate::ProgressMode`]; it rises by one on every call and ends at `total`.
    fn on_progress(&self, document: &Path, count: usize, total: usize) {
        let _ = (document, count, total);
    }

    /// Called once per input path with its final outcome.
    fn on_document_done(&self, document: &Path, outcome: &DocumentOutcome) {
        let _ = (document, outcome);
    }
}

/// A delegate that only uses the defaults.
pub struct NoopDelegate;

impl ConversionDelegate for NoopDelegate {}

/// Convenience alias for a shared delegate.
pub type SharedDelegate = Arc<dyn ConversionDelegate>;

/// Answers every decision from fixed settings. For unattended runs.
///
/// Candidate passwords are tried in order, once each per opening of a file;
/// when they run out the document is skipped. The count starts over once the
/// document is done, so a later file with the same name (or a later run with
/// the same delegate) gets every candidate again.
#[derive(Debug, Default)]
pub struct PolicyDelegate {
    passwords: Vec<String>,
    overwrite: bool,
    decline_large_jobs: bool,
    decline_oversize: bool,
    attempts: Mutex<HashMap<String, usize>>,
}

impl PolicyDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate password.
    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.passwords.push(pwd.into());
        self
    }

    /// Replace existing output files instead of keeping them.
    pub fn overwrite(mut self, v: bool) -> Self {
        self.overwrite = v;
        self
    }

    /// Skip documents above the large-job threshold.
    pub fn decline_large_jobs(mut self, v: bool) -> Self {
        self.decline_large_jobs = v;
        self
    }

    /// Skip oversized pages instead of falling back to png.
    pub fn decline_oversize(mut self, v: bool) -> Self {
        self.decline_oversize = v;
        self
    }

    fn reset_attempts(&self, file_name: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(file_name);
    }
}

impl ConversionDelegate for PolicyDelegate {
    fn prompt_password(&self, file_name: &str) -> Option<String> {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let n = attempts.entry(file_name.to_string()).or_insert(0);
        let pwd = self.passwords.get(*n).cloned();
        *n += 1;
        pwd
    }

    fn confirm_skip(&self, file_name: &str) -> bool {
        self.reset_attempts(file_name);
        true
    }

    fn confirm_large_job(&self, _document: &Path, _page_count: usize) -> bool {
        !self.decline_large_jobs
    }

    fn confirm_overwrite(&self, _path: &Path) -> bool {
        self.overwrite
    }

    fn confirm_oversize(&self, _format: OutputFormat, _w: u32, _h: u32, _max: u32) -> bool {
        !self.decline_oversize
    }

    fn on_document_done(&self, document: &Path, _outcome: &DocumentOutcome) {
        self.reset_attempts(&crate::pipeline::input::display_name(document));
    }
}
