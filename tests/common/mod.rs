//! Shared fixtures: an in-memory document backend and a scripted delegate.

#![allow(dead_code)]

use pdf2img::{
    ConversionDelegate, Document, DocumentOutcome, DocumentSource, OutputFormat, PageError,
    Pdf2ImgError, ProtectionState, RawPixelBuffer,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

// ── Fake backend ─────────────────────────────────────────────────────────────

/// What a fake document looks like.
#[derive(Debug, Clone)]
pub struct FakeSpec {
    pub pages: usize,
    pub width: u32,
    pub height: u32,
    pub password: Option<String>,
    /// Pages whose render fails.
    pub broken_pages: Vec<usize>,
    pub render_delay: Duration,
}

impl FakeSpec {
    pub fn pages(pages: usize) -> Self {
        Self {
            pages,
            width: 6,
            height: 8,
            password: None,
            broken_pages: Vec::new(),
            render_delay: Duration::ZERO,
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn password(mut self, pwd: &str) -> Self {
        self.password = Some(pwd.to_string());
        self
    }

    pub fn broken(mut self, page: usize) -> Self {
        self.broken_pages.push(page);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }
}

/// Counters shared between a source and every document it opened.
#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub rendering: AtomicUsize,
    pub peak_rendering: AtomicUsize,
    /// Renders that returned a buffer.
    pub rendered: AtomicUsize,
}

/// Opens documents by file name from a fixed table.
#[derive(Default)]
pub struct FakeSource {
    docs: HashMap<String, FakeSpec>,
    pub counters: Arc<Counters>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, spec: FakeSpec) -> Self {
        self.docs.insert(file_name.to_string(), spec);
        self
    }
}

impl DocumentSource for FakeSource {
    fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2ImgError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let spec = self
            .docs
            .get(&name)
            .cloned()
            .ok_or_else(|| Pdf2ImgError::CorruptPdf {
                path: path.to_path_buf(),
                detail: "unknown test document".into(),
            })?;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let state = if spec.password.is_some() {
            ProtectionState::Locked
        } else {
            ProtectionState::Unprotected
        };
        Ok(Box::new(FakeDocument {
            spec,
            state,
            counters: Arc::clone(&self.counters),
        }))
    }
}

pub struct FakeDocument {
    spec: FakeSpec,
    state: ProtectionState,
    counters: Arc<Counters>,
}

impl Document for FakeDocument {
    fn page_count(&self) -> usize {
        self.spec.pages
    }

    fn protection(&self) -> ProtectionState {
        self.state
    }

    fn authenticate(&mut self, password: &str) -> Result<bool, Pdf2ImgError> {
        if self.spec.password.as_deref() == Some(password) {
            self.state = ProtectionState::Unlocked;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn render_page(&self, page: usize) -> Result<RawPixelBuffer, PageError> {
        assert_ne!(self.state, ProtectionState::Locked, "rendered a locked document");
        let now = self.counters.rendering.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_rendering.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.spec.render_delay);
        self.counters.rendering.fetch_sub(1, Ordering::SeqCst);

        if self.spec.broken_pages.contains(&page) {
            return Err(PageError::RenderFailed {
                page,
                detail: "damaged content stream".into(),
            });
        }
        let shade = (page % 256) as u8;
        self.counters.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(RawPixelBuffer::solid(
            self.spec.width,
            self.spec.height,
            [shade, 128, 255 - shade],
        ))
    }
}

impl Drop for FakeDocument {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Scripted delegate ────────────────────────────────────────────────────────

/// One delegate call, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Password(String),
    Skip(String),
    Error(String),
    LargeJob(usize),
    Overwrite(PathBuf),
    Oversize {
        format: OutputFormat,
        width: u32,
        height: u32,
        max_dim: u32,
    },
    Start(usize),
    Progress(usize, usize),
    Done(&'static str),
}

/// Answers from a script and records every call and the thread it came from.
pub struct RecordingDelegate {
    pub passwords: Mutex<VecDeque<Option<String>>>,
    pub skip: bool,
    pub large_job: bool,
    pub overwrite: bool,
    pub oversize: bool,
    pub events: Mutex<Vec<Event>>,
    pub threads: Mutex<Vec<ThreadId>>,
}

impl Default for RecordingDelegate {
    fn default() -> Self {
        Self {
            passwords: Mutex::new(VecDeque::new()),
            skip: true,
            large_job: true,
            overwrite: false,
            oversize: true,
            events: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for the password prompt; `None` cancels.
    pub fn passwords(self, answers: &[Option<&str>]) -> Self {
        *self.passwords.lock().unwrap() = answers.iter().map(|a| a.map(String::from)).collect();
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(c, t) => Some((c, t)),
                _ => None,
            })
            .collect()
    }

    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }

    fn record(&self, event: Event) {
        self.threads.lock().unwrap().push(std::thread::current().id());
        self.events.lock().unwrap().push(event);
    }
}

impl ConversionDelegate for RecordingDelegate {
    fn prompt_password(&self, file_name: &str) -> Option<String> {
        self.record(Event::Password(file_name.to_string()));
        self.passwords.lock().unwrap().pop_front().flatten()
    }

    fn confirm_skip(&self, file_name: &str) -> bool {
        self.record(Event::Skip(file_name.to_string()));
        self.skip
    }

    fn notify_error(&self, message: &str) {
        self.record(Event::Error(message.to_string()));
    }

    fn confirm_large_job(&self, _document: &Path, page_count: usize) -> bool {
        self.record(Event::LargeJob(page_count));
        self.large_job
    }

    fn confirm_overwrite(&self, path: &Path) -> bool {
        self.record(Event::Overwrite(path.to_path_buf()));
        self.overwrite
    }

    fn confirm_oversize(&self, format: OutputFormat, width: u32, height: u32, max_dim: u32) -> bool {
        self.record(Event::Oversize {
            format,
            width,
            height,
            max_dim,
        });
        self.oversize
    }

    fn on_document_start(&self, _document: &Path, total_pages: usize) {
        self.record(Event::Start(total_pages));
    }

    fn on_progress(&self, _document: &Path, count: usize, total: usize) {
        self.record(Event::Progress(count, total));
    }

    fn on_document_done(&self, _document: &Path, outcome: &DocumentOutcome) {
        let status = match outcome {
            DocumentOutcome::Completed { .. } => "completed",
            DocumentOutcome::Skipped { .. } => "skipped",
            DocumentOutcome::Failed { .. } => "failed",
        };
        self.record(Event::Done(status));
    }
}

/// Route library logs to the test harness; `RUST_LOG=pdf2img=debug` to see them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── File helpers ─────────────────────────────────────────────────────────────

/// Write a file that passes the `%PDF` check.
pub fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.7\n%fake\n").unwrap();
    path
}

/// Sorted file names in `dir`.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// File name → contents for every file in `dir`.
pub fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    listing(dir)
        .into_iter()
        .map(|n| {
            let bytes = std::fs::read(dir.join(&n)).unwrap();
            (n, bytes)
        })
        .collect()
}
