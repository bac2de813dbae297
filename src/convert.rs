//! Conversion orchestration: documents in, one image per page out.
//!
//! ## Threading model
//!
//! [`Converter::convert`] runs on the caller's thread and handles documents
//! one at a time. For each document it opens (and unlocks) the file, applies
//! the large-job check, creates the output folder and then feeds page jobs
//! to the [`WorkerPool`] in ascending page order. At most one page per pool
//! thread is in flight: the next page is submitted only once an earlier one
//! reached its final result, so rendered buffers waiting on a prompt never
//! outnumber the workers.
//!
//! Page jobs never talk to the [`ConversionDelegate`]. When the encoder
//! needs a decision (existing file, oversized page) the job finishes with
//! [`EncodeStep::NeedsConfirmation`]; the calling thread asks the delegate
//! and either re-queues the request or records the skip. All delegate calls
//! therefore happen on the caller's thread, and a slow human answering a
//! prompt never ties up a pool thread.
//!
//! Progress counters live on the caller's thread too and are only touched
//! between joins.

use crate::config::{ConversionConfig, OutputFormat, ProgressMode};
use crate::delegate::ConversionDelegate;
use crate::error::{PageError, Pdf2ImgError};
use crate::output::{
    ConversionResult, DocumentOutcome, DocumentResult, DocumentSkipReason, JobProgress,
    PageResult,
};
use crate::pipeline::document::{
    Document, DocumentAccessor, DocumentSource, OpenOutcome, ProtectionState,
};
use crate::pipeline::encode::{EncodeRequest, EncodeStep, FormatPolicy, ImageEncoder, OutputTarget};
use crate::pipeline::input;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::render::{self, PdfiumSource};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Convert every document in `paths` with pdfium.
///
/// Fails only if pdfium cannot be bound or the worker pool cannot start;
/// per-document problems are reported in the returned outcomes.
pub fn convert<P: AsRef<Path>>(
    paths: &[P],
    config: ConversionConfig,
    delegate: &dyn ConversionDelegate,
) -> Result<Vec<DocumentResult>, Pdf2ImgError> {
    let converter = Converter::new(config)?;
    Ok(converter.convert(paths, delegate))
}

/// Describe a PDF without rendering it.
pub fn inspect(path: impl AsRef<Path>) -> Result<DocumentInfo, Pdf2ImgError> {
    let source = PdfiumSource::new(ConversionConfig::default().dpi)?;
    inspect_with(&DocumentAccessor::new(Arc::new(source)), path.as_ref())
}

/// What [`inspect`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    /// `None` while the document is locked.
    pub page_count: Option<usize>,
    pub protection: ProtectionState,
    /// Folder a conversion would write into.
    pub output_dir: PathBuf,
}

fn inspect_with(accessor: &DocumentAccessor, path: &Path) -> Result<DocumentInfo, Pdf2ImgError> {
    let resolved = input::resolve_local(path)?;
    let doc = accessor.open_raw(&resolved)?;
    let protection = doc.protection();
    Ok(DocumentInfo {
        output_dir: input::output_dir_for(&resolved)?,
        page_count: (protection != ProtectionState::Locked).then(|| doc.page_count()),
        protection,
        path: resolved,
    })
}

/// One page to convert. Consumed by exactly one pool job.
struct PageTask {
    document: Arc<dyn Document>,
    page: usize,
    format: OutputFormat,
    target: Arc<OutputTarget>,
}

impl PageTask {
    fn run(self, encoder: &ImageEncoder) -> EncodeStep {
        match render::render_page(self.document.as_ref(), self.page) {
            Ok(buffer) => encoder.step(EncodeRequest::new(
                self.page,
                Arc::new(buffer),
                self.target,
                self.format,
            )),
            Err(e) => EncodeStep::Done(ConversionResult::Failed(e)),
        }
    }
}

enum PageJob {
    /// Render and encode a page.
    Convert(PageTask),
    /// Continue encoding after the delegate approved something.
    Resume(EncodeRequest),
}

type PageFuture = BoxFuture<'static, (usize, Result<EncodeStep, JoinError>)>;

/// Drives documents through the pipeline on a bounded worker pool.
///
/// Holds the pool for its whole life, so build one per batch and reuse it
/// across [`Converter::convert`] calls rather than per document.
pub struct Converter {
    accessor: DocumentAccessor,
    encoder: ImageEncoder,
    pool: WorkerPool,
    config: ConversionConfig,
}

impl Converter {
    /// A converter rendering with pdfium at `config.dpi`.
    pub fn new(config: ConversionConfig) -> Result<Self, Pdf2ImgError> {
        let source = PdfiumSource::new(config.dpi)?;
        Self::with_source(Arc::new(source), config)
    }

    /// A converter over any document backend.
    pub fn with_source(
        source: Arc<dyn DocumentSource>,
        config: ConversionConfig,
    ) -> Result<Self, Pdf2ImgError> {
        Ok(Self {
            accessor: DocumentAccessor::new(source),
            encoder: ImageEncoder::new(FormatPolicy::standard(), config.jpeg_quality),
            pool: WorkerPool::new(config.workers)?,
            config,
        })
    }

    /// Replace the standard per-format size limits.
    pub fn with_format_policy(mut self, policy: Arc<FormatPolicy>) -> Self {
        self.encoder = ImageEncoder::new(policy, self.config.jpeg_quality);
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert each path in order. One document's failure never stops the batch.
    ///
    /// Returns one [`DocumentResult`] per input path, in input order.
    pub fn convert<P: AsRef<Path>>(
        &self,
        paths: &[P],
        delegate: &dyn ConversionDelegate,
    ) -> Vec<DocumentResult> {
        paths
            .iter()
            .map(|p| {
                let path = p.as_ref();
                let outcome = self.convert_document(path, delegate);
                delegate.on_document_done(path, &outcome);
                DocumentResult {
                    path: path.to_path_buf(),
                    outcome,
                }
            })
            .collect()
    }

    /// Same as [`inspect`], through this converter's backend.
    pub fn inspect(&self, path: impl AsRef<Path>) -> Result<DocumentInfo, Pdf2ImgError> {
        inspect_with(&self.accessor, path.as_ref())
    }

    fn convert_document(&self, path: &Path, delegate: &dyn ConversionDelegate) -> DocumentOutcome {
        match self.try_convert_document(path, delegate) {
            Ok(outcome) => outcome,
            Err(error) => {
                debug!("'{}' failed: {}", path.display(), error);
                delegate.notify_error(&error.to_string());
                DocumentOutcome::Failed { error }
            }
        }
    }

    fn try_convert_document(
        &self,
        path: &Path,
        delegate: &dyn ConversionDelegate,
    ) -> Result<DocumentOutcome, Pdf2ImgError> {
        let start = Instant::now();
        let resolved = input::resolve_local(path)?;

        let document = match self.accessor.open(&resolved, delegate)? {
            OpenOutcome::Opened(doc) => doc,
            OpenOutcome::Skipped => {
                return Ok(DocumentOutcome::Skipped {
                    reason: DocumentSkipReason::PasswordNotProvided,
                })
            }
        };

        let page_count = document.page_count();
        if page_count > self.config.large_job_threshold
            && !delegate.confirm_large_job(&resolved, page_count)
        {
            info!(
                "Skipping '{}': {} pages declined",
                input::display_name(&resolved),
                page_count
            );
            return Ok(DocumentOutcome::Skipped {
                reason: DocumentSkipReason::LargeJobDeclined,
            });
        }

        let output_dir = input::output_dir_for(&resolved)?;
        input::ensure_output_dir(&output_dir)?;
        info!(
            "Converting '{}': {} pages → {}",
            input::display_name(&resolved),
            page_count,
            output_dir.display()
        );

        let target = Arc::new(OutputTarget::new(&output_dir, self.config.pad_filenames));
        delegate.on_document_start(path, page_count);
        let pages = self.run_pages(path, Arc::from(document), target, delegate);

        let written = pages.iter().filter(|p| p.result.is_written()).count();
        let failed = pages
            .iter()
            .filter(|p| matches!(p.result, ConversionResult::Failed(_)))
            .count();
        info!(
            "Finished '{}': {} written, {} skipped, {} failed in {}ms",
            input::display_name(&resolved),
            written,
            pages.len() - written - failed,
            failed,
            start.elapsed().as_millis()
        );

        Ok(DocumentOutcome::Completed {
            output_dir,
            page_count,
            pages,
        })
    }

    /// Run every page of `document` and collect one result per page.
    ///
    /// Keeps at most `pool.size()` pages in flight, counting pages parked on
    /// a confirmation. Returns only after every submitted job has finished,
    /// so the last reference to `document` is dropped here.
    fn run_pages(
        &self,
        path: &Path,
        document: Arc<dyn Document>,
        target: Arc<OutputTarget>,
        delegate: &dyn ConversionDelegate,
    ) -> Vec<PageResult> {
        let total = document.page_count();
        let max_in_flight = self.pool.size();
        let mut progress = JobProgress::new(total);
        let mut pending: FuturesUnordered<PageFuture> = FuturesUnordered::new();
        let mut results = Vec::with_capacity(total);
        let mut next_page = 1;
        let mut in_flight = 0;

        loop {
            while in_flight < max_in_flight && next_page <= total {
                let task = PageTask {
                    document: Arc::clone(&document),
                    page: next_page,
                    format: self.config.format,
                    target: Arc::clone(&target),
                };
                pending.push(self.submit(next_page, PageJob::Convert(task)));
                in_flight += 1;
                next_page += 1;
                let submitted = progress.record_submitted();
                if self.config.progress_mode == ProgressMode::Submission {
                    delegate.on_progress(path, submitted, total);
                }
            }

            let Some((page, joined)) = self.pool.block_on(pending.next()) else {
                break;
            };
            let step = joined.unwrap_or_else(|e| {
                EncodeStep::Done(ConversionResult::Failed(PageError::WorkerPanicked {
                    page,
                    detail: e.to_string(),
                }))
            });

            let result = match step {
                EncodeStep::Done(result) => result,
                EncodeStep::NeedsConfirmation(confirmation, mut request) => {
                    match self.encoder.apply_decision(
                        &mut request,
                        confirmation,
                        delegate,
                        self.config.on_conflict,
                    ) {
                        Ok(()) => {
                            pending.push(self.submit(page, PageJob::Resume(request)));
                            continue;
                        }
                        Err(reason) => ConversionResult::Skipped(reason),
                    }
                }
            };

            in_flight -= 1;
            if let ConversionResult::Failed(e) = &result {
                warn!("Page {} of '{}' failed: {}", page, path.display(), e);
            }
            let completed = progress.record_completed();
            if self.config.progress_mode == ProgressMode::Completion {
                delegate.on_progress(path, completed, total);
            }
            results.push(PageResult { page, result });
        }

        debug_assert!(progress.is_finished());
        drop(document);
        debug!("Released '{}'", path.display());

        results.sort_by_key(|r| r.page);
        results
    }

    fn submit(&self, page: usize, job: PageJob) -> PageFuture {
        let encoder = self.encoder.clone();
        let handle = self.pool.submit(move || match job {
            PageJob::Convert(task) => task.run(&encoder),
            PageJob::Resume(request) => encoder.step(request),
        });
        handle.map(move |joined| (page, joined)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::RawPixelBuffer;

    struct Blank {
        pages: usize,
    }

    impl Document for Blank {
        fn page_count(&self) -> usize {
            self.pages
        }
        fn protection(&self) -> ProtectionState {
            ProtectionState::Unprotected
        }
        fn authenticate(&mut self, _password: &str) -> Result<bool, Pdf2ImgError> {
            Ok(true)
        }
        fn render_page(&self, page: usize) -> Result<RawPixelBuffer, PageError> {
            if page == 2 {
                panic!("renderer crashed");
            }
            Ok(RawPixelBuffer::solid(4, 4, [255, 255, 255]))
        }
    }

    struct BlankSource;

    impl DocumentSource for BlankSource {
        fn open(&self, _path: &Path) -> Result<Box<dyn Document>, Pdf2ImgError> {
            Ok(Box::new(Blank { pages: 3 }))
        }
    }

    fn pdf_in(dir: &Path) -> PathBuf {
        let path = dir.join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        path
    }

    #[test]
    fn panicking_page_is_recorded_and_siblings_complete() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = pdf_in(dir.path());
        let config = ConversionConfig::builder().workers(2).build().unwrap();
        let converter = Converter::with_source(Arc::new(BlankSource), config).unwrap();

        let results = converter.convert(&[&pdf], &crate::delegate::NoopDelegate);
        let pages = results[0].outcome.pages();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].result.is_written());
        assert!(matches!(
            pages[1].result,
            ConversionResult::Failed(PageError::WorkerPanicked { page: 2, .. })
        ));
        assert!(pages[2].result.is_written());
    }

    #[test]
    fn inspect_reports_page_count_and_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = pdf_in(dir.path());
        let converter =
            Converter::with_source(Arc::new(BlankSource), ConversionConfig::default()).unwrap();

        let info = converter.inspect(&pdf).unwrap();
        assert_eq!(info.page_count, Some(3));
        assert_eq!(info.protection, ProtectionState::Unprotected);
        assert!(info.output_dir.ends_with("doc"));
        assert!(!info.output_dir.exists(), "inspect must not create anything");
    }
}
