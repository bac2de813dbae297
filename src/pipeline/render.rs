//! Page rasterisation: the pdfium document backend and the pixel buffer it produces.
//!
//! ## One pdfium handle per render call
//!
//! A `pdfium_render::PdfDocument` borrows the library bindings and wraps a
//! raw C handle, so it is neither `Send` nor `Sync`. [`PdfiumDocument`]
//! instead keeps the file bytes in memory and every [`Document::render_page`]
//! call loads its own short-lived handle from them. Page workers can then
//! share one `Arc<dyn Document>` safely. The `sync` and `thread_safe`
//! features make the bindings shareable and serialise the actual FFI calls;
//! encoding (the expensive part for webp/avif) still runs fully in parallel.

use crate::error::{PageError, Pdf2ImgError};
use crate::pipeline::document::{Document, DocumentSource, ProtectionState};
use crate::pipeline::library;
use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Bytes per pixel of [`RawPixelBuffer`] (packed RGB).
pub const BYTES_PER_PIXEL: usize = 3;

/// A pixel buffer whose layout does not match its dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelBufferError {
    #[error("stride {stride} is shorter than a {width}px row")]
    StrideTooShort { stride: usize, width: u32 },

    #[error("{len} bytes cannot hold {width}x{height} at stride {stride}")]
    DataTooShort {
        len: usize,
        width: u32,
        height: u32,
        stride: usize,
    },
}

/// A rendered page: packed 8-bit RGB rows, `stride` bytes apart.
#[derive(Clone, PartialEq, Eq)]
pub struct RawPixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl std::fmt::Debug for RawPixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RawPixelBuffer {
    /// Wrap `data`, checking that `stride` and length cover every row.
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self, PixelBufferError> {
        let row = width as usize * BYTES_PER_PIXEL;
        if stride < row {
            return Err(PixelBufferError::StrideTooShort { stride, width });
        }
        let needed = if height == 0 {
            0
        } else {
            stride * (height as usize - 1) + row
        };
        if data.len() < needed {
            return Err(PixelBufferError::DataTooShort {
                len: data.len(),
                width,
                height,
                stride,
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// A single-colour buffer with tightly packed rows.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * BYTES_PER_PIXEL)
            .collect();
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            data,
        }
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            data: img.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Copy into an `image` buffer, dropping row padding.
    pub fn to_image(&self) -> Result<DynamicImage, PixelBufferError> {
        let row = self.width as usize * BYTES_PER_PIXEL;
        let packed = if self.stride == row {
            self.data[..row * self.height as usize].to_vec()
        } else {
            let mut out = Vec::with_capacity(row * self.height as usize);
            for y in 0..self.height as usize {
                let start = y * self.stride;
                out.extend_from_slice(&self.data[start..start + row]);
            }
            out
        };
        let len = packed.len();
        RgbImage::from_raw(self.width, self.height, packed)
            .map(DynamicImage::ImageRgb8)
            .ok_or(PixelBufferError::DataTooShort {
                len,
                width: self.width,
                height: self.height,
                stride: row,
            })
    }
}

/// Render page `page` (1-based) of `doc`, checking the index first.
pub fn render_page(doc: &dyn Document, page: usize) -> Result<RawPixelBuffer, PageError> {
    let total = doc.page_count();
    if page == 0 || page > total {
        return Err(PageError::PageOutOfRange { page, total });
    }
    let buffer = doc.render_page(page)?;
    debug!(
        "Rendered page {} → {}x{} px",
        page,
        buffer.width(),
        buffer.height()
    );
    Ok(buffer)
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// Opens PDFs with pdfium at a fixed DPI.
pub struct PdfiumSource {
    pdfium: &'static Pdfium,
    dpi: u32,
}

impl PdfiumSource {
    /// Bind pdfium (once per process) and render at `dpi`.
    pub fn new(dpi: u32) -> Result<Self, Pdf2ImgError> {
        Ok(Self {
            pdfium: library::pdfium()?,
            dpi,
        })
    }
}

impl DocumentSource for PdfiumSource {
    fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2ImgError> {
        let bytes = std::fs::read(path).map_err(|source| Pdf2ImgError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc = PdfiumDocument {
            pdfium: self.pdfium,
            path: path.to_path_buf(),
            bytes: Arc::from(bytes),
            password: None,
            state: ProtectionState::Unprotected,
            page_count: 0,
            scale: self.dpi as f32 / 72.0,
        };

        match doc.load(None) {
            Ok(count) => doc.page_count = count,
            Err(LoadError::Password) => doc.state = ProtectionState::Locked,
            Err(LoadError::Other(detail)) => {
                return Err(Pdf2ImgError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail,
                })
            }
        }
        info!(
            "PDF loaded: {} ({} pages, {:?})",
            path.display(),
            doc.page_count,
            doc.state
        );
        Ok(Box::new(doc))
    }
}

enum LoadError {
    Password,
    Other(String),
}

fn classify(e: PdfiumError) -> LoadError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        LoadError::Password
    } else {
        LoadError::Other(err_str)
    }
}

/// A PDF held in memory, rendered through pdfium.
pub struct PdfiumDocument {
    pdfium: &'static Pdfium,
    path: PathBuf,
    bytes: Arc<[u8]>,
    password: Option<String>,
    state: ProtectionState,
    page_count: usize,
    scale: f32,
}

impl PdfiumDocument {
    /// Load a handle with `password` and return the page count.
    fn load(&self, password: Option<&str>) -> Result<usize, LoadError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, password)
            .map_err(classify)?;
        Ok(document.pages().len() as usize)
    }
}

impl Document for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn protection(&self) -> ProtectionState {
        self.state
    }

    fn authenticate(&mut self, password: &str) -> Result<bool, Pdf2ImgError> {
        match self.load(Some(password)) {
            Ok(count) => {
                self.page_count = count;
                self.password = Some(password.to_string());
                self.state = ProtectionState::Unlocked;
                Ok(true)
            }
            Err(LoadError::Password) => Ok(false),
            Err(LoadError::Other(detail)) => Err(Pdf2ImgError::CorruptPdf {
                path: self.path.clone(),
                detail,
            }),
        }
    }

    fn render_page(&self, page: usize) -> Result<RawPixelBuffer, PageError> {
        let render_failed = |detail: String| PageError::RenderFailed { page, detail };

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, self.password.as_deref())
            .map_err(|e| render_failed(format!("{:?}", e)))?;

        let pdf_page = document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| render_failed(format!("{:?}", e)))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.scale);
        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| render_failed(format!("{:?}", e)))?;

        Ok(RawPixelBuffer::from_rgb_image(bitmap.as_image().to_rgb8()))
    }
}
