//! Result types: per page, per document and per batch.

use crate::error::{PageError, Pdf2ImgError};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Why a page was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The output file existed and overwriting was declined.
    FileExists,
    /// The page exceeded the format's size limit and the fallback was declined.
    SizeLimit,
}

/// Outcome of one page. Every page ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionResult {
    /// The image was written to this path.
    Written(PathBuf),
    Skipped(SkipReason),
    Failed(PageError),
}

impl ConversionResult {
    pub fn is_written(&self) -> bool {
        matches!(self, ConversionResult::Written(_))
    }

    /// The written path, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConversionResult::Written(p) => Some(p),
            _ => None,
        }
    }
}

/// One page's result, tagged with its 1-based index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub page: usize,
    pub result: ConversionResult,
}

/// Why a whole document was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSkipReason {
    /// Password protected and the user chose to skip.
    PasswordNotProvided,
    /// More pages than the threshold and the user declined.
    LargeJobDeclined,
}

/// Final outcome of one input document.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Every page was attempted. Individual pages may still be skipped or failed.
    Completed {
        output_dir: PathBuf,
        page_count: usize,
        /// One entry per page, sorted by page number.
        pages: Vec<PageResult>,
    },
    Skipped { reason: DocumentSkipReason },
    Failed {
        #[serde(serialize_with = "serialize_display")]
        error: Pdf2ImgError,
    },
}

impl DocumentOutcome {
    /// Page results; empty unless completed.
    pub fn pages(&self) -> &[PageResult] {
        match self {
            DocumentOutcome::Completed { pages, .. } => pages,
            _ => &[],
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, DocumentOutcome::Completed { .. })
    }
}

fn serialize_display<S: Serializer>(e: &Pdf2ImgError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

/// An input path paired with its outcome.
#[derive(Debug, Serialize)]
pub struct DocumentResult {
    pub path: PathBuf,
    pub outcome: DocumentOutcome,
}

/// Per-document progress counters.
///
/// Owned and mutated only by the orchestrating thread, so no atomics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub submitted: usize,
    pub completed: usize,
    pub total: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Count one page handed to the pool. Returns the new submitted count.
    pub fn record_submitted(&mut self) -> usize {
        self.submitted = (self.submitted + 1).min(self.total);
        self.submitted
    }

    /// Count one page reaching its final result. Never exceeds `total`.
    pub fn record_completed(&mut self) -> usize {
        debug_assert!(self.completed < self.total, "more completions than pages");
        self.completed = (self.completed + 1).min(self.total);
        self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.completed == self.total
    }
}

/// Aggregate counts across a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub documents_completed: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub pages_written: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn from_results(results: &[DocumentResult], duration_ms: u64) -> Self {
        let mut s = BatchSummary {
            duration_ms,
            ..Default::default()
        };
        for r in results {
            match &r.outcome {
                DocumentOutcome::Completed { pages, .. } => {
                    s.documents_completed += 1;
                    for p in pages {
                        match p.result {
                            ConversionResult::Written(_) => s.pages_written += 1,
                            ConversionResult::Skipped(_) => s.pages_skipped += 1,
                            ConversionResult::Failed(_) => s.pages_failed += 1,
                        }
                    }
                }
                DocumentOutcome::Skipped { .. } => s.documents_skipped += 1,
                DocumentOutcome::Failed { .. } => s.documents_failed += 1,
            }
        }
        s
    }

    /// True when no document and no page failed.
    pub fn is_clean(&self) -> bool {
        self.documents_failed == 0 && self.pages_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_never_exceeds_total() {
        let mut p = JobProgress::new(2);
        assert_eq!(p.record_submitted(), 1);
        assert_eq!(p.record_submitted(), 2);
        assert_eq!(p.record_submitted(), 2);
        assert_eq!(p.record_completed(), 1);
        assert!(!p.is_finished());
        assert_eq!(p.record_completed(), 2);
        assert!(p.is_finished());
    }

    #[test]
    fn summary_counts_every_outcome() {
        let results = vec![
            DocumentResult {
                path: "a.pdf".into(),
                outcome: DocumentOutcome::Completed {
                    output_dir: "a".into(),
                    page_count: 3,
                    pages: vec![
                        PageResult {
                            page: 1,
                            result: ConversionResult::Written("a/1.png".into()),
                        },
                        PageResult {
                            page: 2,
                            result: ConversionResult::Skipped(SkipReason::FileExists),
                        },
                        PageResult {
                            page: 3,
                            result: ConversionResult::Failed(PageError::RenderFailed {
                                page: 3,
                                detail: "x".into(),
                            }),
                        },
                    ],
                },
            },
            DocumentResult {
                path: "b.pdf".into(),
                outcome: DocumentOutcome::Skipped {
                    reason: DocumentSkipReason::LargeJobDeclined,
                },
            },
            DocumentResult {
                path: "c.txt".into(),
                outcome: DocumentOutcome::Failed {
                    error: Pdf2ImgError::NotAPdf {
                        path: "c.txt".into(),
                        magic: *b"abcd",
                    },
                },
            },
        ];
        let s = BatchSummary::from_results(&results, 12);
        assert_eq!(s.documents_completed, 1);
        assert_eq!(s.documents_skipped, 1);
        assert_eq!(s.documents_failed, 1);
        assert_eq!((s.pages_written, s.pages_skipped, s.pages_failed), (1, 1, 1));
        assert!(!s.is_clean());
    }

    #[test]
    fn failed_outcome_serialises_error_as_text() {
        let r = DocumentResult {
            path: "c.txt".into(),
            outcome: DocumentOutcome::Failed {
                error: Pdf2ImgError::FileNotFound { path: "c.txt".into() },
            },
        };
        let json = serde_json::to_string(&r).expect("serialise");
        assert!(json.contains("\"status\":\"failed\""), "got: {json}");
        assert!(json.contains("not found"), "got: {json}");
    }
}
