//! Document access: open a source, resolve password protection.
//!
//! [`DocumentSource`] and [`Document`] are the seam between the
//! orchestration logic and the rendering backend. The pdfium backend lives
//! in [`crate::pipeline::render`]; tests plug in an in-memory source.
//!
//! [`DocumentAccessor::open`] runs the unlock loop. It never prompts on its
//! own: every question goes to the [`ConversionDelegate`], and the loop has
//! no retry limit. The user either supplies the right password or chooses
//! to skip.

use crate::delegate::ConversionDelegate;
use crate::error::{PageError, Pdf2ImgError};
use crate::pipeline::input::display_name;
use crate::pipeline::render::RawPixelBuffer;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Password state of an opened document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionState {
    /// No password needed.
    Unprotected,
    /// Password needed; pages cannot be read yet.
    Locked,
    /// Was locked, a correct password has been supplied.
    Unlocked,
}

/// An opened, page-addressable document.
///
/// `render_page` takes `&self` and the trait is `Sync`: all page workers of
/// one document render from it concurrently.
pub trait Document: Send + Sync {
    /// Number of pages. Only meaningful once not [`ProtectionState::Locked`].
    fn page_count(&self) -> usize;

    fn protection(&self) -> ProtectionState;

    /// Try a password. `Ok(true)` unlocks the document, `Ok(false)` means
    /// wrong password. `Err` only for failures unrelated to the password.
    fn authenticate(&mut self, password: &str) -> Result<bool, Pdf2ImgError>;

    /// Rasterise page `page` (1-based) into an RGB buffer.
    fn render_page(&self, page: usize) -> Result<RawPixelBuffer, PageError>;
}

/// Opens documents by path.
pub trait DocumentSource: Send + Sync {
    /// Open `path`. A password-protected file opens successfully in the
    /// [`ProtectionState::Locked`] state.
    fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2ImgError>;
}

/// Result of [`DocumentAccessor::open`].
pub enum OpenOutcome {
    /// Readable document (unprotected or unlocked).
    Opened(Box<dyn Document>),
    /// Locked document the user chose to skip.
    Skipped,
}

impl std::fmt::Debug for OpenOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenOutcome::Opened(doc) => f
                .debug_struct("Opened")
                .field("page_count", &doc.page_count())
                .field("protection", &doc.protection())
                .finish(),
            OpenOutcome::Skipped => f.write_str("Skipped"),
        }
    }
}

/// Opens documents through a [`DocumentSource`] and unlocks them.
#[derive(Clone)]
pub struct DocumentAccessor {
    source: Arc<dyn DocumentSource>,
}

impl DocumentAccessor {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }

    /// Open `path`, prompting through `delegate` until it is unlocked or skipped.
    pub fn open(
        &self,
        path: &Path,
        delegate: &dyn ConversionDelegate,
    ) -> Result<OpenOutcome, Pdf2ImgError> {
        let mut doc = self.source.open(path)?;
        if doc.protection() != ProtectionState::Locked {
            return Ok(OpenOutcome::Opened(doc));
        }

        let name = display_name(path);
        info!("'{}' is password protected", name);

        loop {
            let Some(password) = delegate.prompt_password(&name) else {
                if delegate.confirm_skip(&name) {
                    info!("Skipping locked document '{}'", name);
                    return Ok(OpenOutcome::Skipped);
                }
                continue;
            };

            if doc.authenticate(&password)? {
                debug!("Unlocked '{}'", name);
                return Ok(OpenOutcome::Opened(doc));
            }
            delegate.notify_error(&format!("Incorrect password for '{name}'"));
        }
    }

    /// Open without unlocking, for inspection.
    pub fn open_raw(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2ImgError> {
        self.source.open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct LockedDoc {
        password: &'static str,
        state: ProtectionState,
    }

    impl Document for LockedDoc {
        fn page_count(&self) -> usize {
            if self.state == ProtectionState::Locked {
                0
            } else {
                4
            }
        }
        fn protection(&self) -> ProtectionState {
            self.state
        }
        fn authenticate(&mut self, password: &str) -> Result<bool, Pdf2ImgError> {
            if password == self.password {
                self.state = ProtectionState::Unlocked;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        fn render_page(&self, _page: usize) -> Result<RawPixelBuffer, PageError> {
            Ok(RawPixelBuffer::solid(1, 1, [0, 0, 0]))
        }
    }

    struct LockedSource;

    impl DocumentSource for LockedSource {
        fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2ImgError> {
            if path.ends_with("broken.pdf") {
                return Err(Pdf2ImgError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: "no xref".into(),
                });
            }
            let state = if path.ends_with("open.pdf") {
                ProtectionState::Unprotected
            } else {
                ProtectionState::Locked
            };
            Ok(Box::new(LockedDoc {
                password: "hunter2",
                state,
            }))
        }
    }

    /// Replays scripted answers and records what it was asked.
    #[derive(Default)]
    struct Script {
        passwords: Mutex<VecDeque<Option<&'static str>>>,
        skips: Mutex<VecDeque<bool>>,
        errors: Mutex<Vec<String>>,
    }

    impl ConversionDelegate for Script {
        fn prompt_password(&self, _file_name: &str) -> Option<String> {
            self.passwords
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .map(String::from)
        }
        fn confirm_skip(&self, _file_name: &str) -> bool {
            self.skips.lock().unwrap().pop_front().unwrap_or(true)
        }
        fn notify_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn accessor() -> DocumentAccessor {
        DocumentAccessor::new(Arc::new(LockedSource))
    }

    #[test]
    fn unprotected_document_opens_without_prompting() {
        let script = Script::default();
        let out = accessor()
            .open(&PathBuf::from("open.pdf"), &script)
            .unwrap();
        match out {
            OpenOutcome::Opened(doc) => assert_eq!(doc.protection(), ProtectionState::Unprotected),
            OpenOutcome::Skipped => panic!("should open"),
        }
    }

    #[test]
    fn wrong_passwords_retry_until_correct() {
        let script = Script {
            passwords: Mutex::new(VecDeque::from([Some("a"), Some("b"), Some("hunter2")])),
            ..Default::default()
        };
        let out = accessor().open(Path::new("secret.pdf"), &script).unwrap();
        match out {
            OpenOutcome::Opened(doc) => {
                assert_eq!(doc.protection(), ProtectionState::Unlocked);
                assert_eq!(doc.page_count(), 4);
            }
            OpenOutcome::Skipped => panic!("should unlock"),
        }
        let errors = script.errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("secret.pdf"));
    }

    #[test]
    fn cancel_then_confirm_skip_skips() {
        let script = Script {
            passwords: Mutex::new(VecDeque::from([None])),
            skips: Mutex::new(VecDeque::from([true])),
            ..Default::default()
        };
        let out = accessor().open(Path::new("secret.pdf"), &script).unwrap();
        assert!(matches!(out, OpenOutcome::Skipped));
    }

    #[test]
    fn declined_skip_reopens_prompt() {
        let script = Script {
            passwords: Mutex::new(VecDeque::from([None, Some("hunter2")])),
            skips: Mutex::new(VecDeque::from([false])),
            ..Default::default()
        };
        let out = accessor().open(Path::new("secret.pdf"), &script).unwrap();
        assert!(matches!(out, OpenOutcome::Opened(_)));
        assert!(script.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let script = Script::default();
        let err = accessor()
            .open(Path::new("broken.pdf"), &script)
            .unwrap_err();
        assert!(matches!(err, Pdf2ImgError::CorruptPdf { .. }));
    }
}
