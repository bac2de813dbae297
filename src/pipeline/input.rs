//! Input validation and output-location derivation.
//!
//! pdfium's own error for "this is a JPEG, not a PDF" is an opaque format
//! error. Checking existence, permissions and the `%PDF` magic up front
//! turns those into specific, actionable [`Pdf2ImgError`] variants before
//! any library work starts.

use crate::error::Pdf2ImgError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local file path: exists, readable, starts with `%PDF`.
///
/// Returns the absolute path so output folders are derived consistently
/// regardless of the caller's working directory.
pub fn resolve_local(path: &Path) -> Result<PathBuf, Pdf2ImgError> {
    if !path.exists() {
        return Err(Pdf2ImgError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => check_magic(path, &mut f)?,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2ImgError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Pdf2ImgError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let abs = std::path::absolute(path).map_err(|source| Pdf2ImgError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Resolved local PDF: {}", abs.display());
    Ok(abs)
}

/// Require the first four bytes of `reader` to be `%PDF`. Shorter inputs
/// are not PDFs.
fn check_magic<R: Read>(path: &Path, reader: &mut R) -> Result<(), Pdf2ImgError> {
    let mut magic = [0u8; 4];
    match reader.read_exact(&mut magic) {
        Ok(()) if &magic == b"%PDF" => Ok(()),
        Ok(()) => Err(Pdf2ImgError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Pdf2ImgError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        }),
        Err(source) => Err(Pdf2ImgError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The folder a document's pages are written to: a sibling of the document
/// named after its base name without extension.
///
/// `/scans/report.pdf` → `/scans/report/`
pub fn output_dir_for(document: &Path) -> Result<PathBuf, Pdf2ImgError> {
    let stem = document
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Pdf2ImgError::InvalidInput {
            path: document.to_path_buf(),
            reason: "path has no file name".into(),
        })?;
    let parent = document.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(stem))
}

/// Base name shown to the user in prompts.
pub fn display_name(document: &Path) -> String {
    document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.display().to_string())
}

/// Create the output folder if absent.
pub fn ensure_output_dir(dir: &Path) -> Result<(), Pdf2ImgError> {
    std::fs::create_dir_all(dir).map_err(|source| Pdf2ImgError::OutputDirFailed {
        path: dir.to_path_buf(),
        source,
    })
}
