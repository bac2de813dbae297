//! Locate and bind the pdfium shared library, once per process.
//!
//! Search order (first hit wins):
//!
//! 1. `PDFIUM_LIB_PATH`: explicit path to the library file
//! 2. the per-user cache dir, e.g. `~/.cache/pdf2img/libpdfium.so`
//! 3. the directory containing the running executable
//! 4. the current working directory
//! 5. the system library search path

use crate::error::Pdf2ImgError;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// The process-wide pdfium instance, binding it on first use.
///
/// The `sync` feature of `pdfium-render` makes the instance `Send + Sync`;
/// `thread_safe` serialises the calls into the C library. Concurrent first
/// callers wait for a single bind; a failed bind is retried on the next call.
pub fn pdfium() -> Result<&'static Pdfium, Pdf2ImgError> {
    PDFIUM.get_or_try_init(bind)
}

/// Directories searched for the platform library file, in order.
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::new();
    if let Some(cache) = dirs::cache_dir() {
        dirs_out.push(cache.join("pdf2img"));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
    {
        dirs_out.push(exe_dir);
    }
    dirs_out.push(PathBuf::from("./"));
    dirs_out
}

fn bind() -> Result<Pdfium, Pdf2ImgError> {
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(&env_path);
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| {
                Pdf2ImgError::PdfiumBindingFailed(format!("PDFIUM_LIB_PATH='{env_path}': {e}"))
            });
    }

    for dir in candidate_dirs() {
        let lib = Pdfium::pdfium_platform_library_name_at_path(&dir);
        if !lib.exists() {
            continue;
        }
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => debug!("Could not bind {}: {}", lib.display(), e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| Pdf2ImgError::PdfiumBindingFailed(e.to_string()))
}
