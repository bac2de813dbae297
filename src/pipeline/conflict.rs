//! What happens when a page's output file already exists.

use crate::delegate::ConversionDelegate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Overwrite decision for an existing output path. Stateless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Ask the delegate for every conflicting path. (default)
    #[default]
    Ask,
    /// Replace existing files without asking.
    Overwrite,
    /// Keep existing files without asking.
    Skip,
}

impl ConflictPolicy {
    /// May `path` be overwritten?
    pub fn allows_overwrite(self, path: &Path, delegate: &dyn ConversionDelegate) -> bool {
        let allowed = match self {
            ConflictPolicy::Ask => delegate.confirm_overwrite(path),
            ConflictPolicy::Overwrite => true,
            ConflictPolicy::Skip => false,
        };
        debug!(
            "Existing {}: {}",
            path.display(),
            if allowed { "overwrite" } else { "keep" }
        );
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Asked {
        calls: AtomicUsize,
        answer: bool,
    }

    impl ConversionDelegate for Asked {
        fn confirm_overwrite(&self, _path: &Path) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    #[test]
    fn ask_delegates_the_decision() {
        for answer in [true, false] {
            let d = Asked {
                calls: AtomicUsize::new(0),
                answer,
            };
            assert_eq!(ConflictPolicy::Ask.allows_overwrite(Path::new("1.png"), &d), answer);
            assert_eq!(d.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn fixed_policies_never_ask() {
        let d = Asked {
            calls: AtomicUsize::new(0),
            answer: false,
        };
        assert!(ConflictPolicy::Overwrite.allows_overwrite(Path::new("1.png"), &d));
        assert!(!ConflictPolicy::Skip.allows_overwrite(Path::new("1.png"), &d));
        assert_eq!(d.calls.load(Ordering::SeqCst), 0);
    }
}
