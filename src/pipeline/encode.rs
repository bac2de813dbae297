//! Image encoding: `RawPixelBuffer` → image file, with format size limits.
//!
//! Encoding is a small state machine so the decisions it needs can be made
//! on a different thread from the one doing the work:
//!
//! ```text
//! EncodeRequest ──step──▶ Done(ConversionResult)
//!       ▲                 NeedsConfirmation(Overwrite | Oversize, request)
//!       │                          │
//!       └──── apply_decision ◀─────┘   (accepted; declined → Skipped)
//! ```
//!
//! A page worker calls [`ImageEncoder::step`]; when it needs a decision it
//! hands the request back to the orchestrator, which asks the delegate and
//! re-queues the request. [`ImageEncoder::encode`] runs the same loop inline
//! for callers that are fine blocking on the delegate.
//!
//! Files are encoded into a temp file in the output folder and renamed into
//! place, so a failed write never leaves a truncated image behind.

use crate::config::OutputFormat;
use crate::delegate::ConversionDelegate;
use crate::error::PageError;
use crate::output::{ConversionResult, SkipReason};
use crate::pipeline::conflict::ConflictPolicy;
use crate::pipeline::render::RawPixelBuffer;
use image::codecs::avif::AvifEncoder;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

// ── Format policy ────────────────────────────────────────────────────────

static STANDARD_POLICY: Lazy<Arc<FormatPolicy>> = Lazy::new(|| {
    Arc::new(
        FormatPolicy::new(OutputFormat::Png)
            .with_limit(OutputFormat::Webp, 16383)
            .with_limit(OutputFormat::Avif, 65535),
    )
});

/// Maximum pixel dimension per format, plus the uncapped fallback format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    limits: BTreeMap<OutputFormat, u32>,
    fallback: OutputFormat,
}

impl FormatPolicy {
    /// webp ≤ 16383 px, avif ≤ 65535 px, everything else uncapped; fallback png.
    pub fn standard() -> Arc<FormatPolicy> {
        Arc::clone(&STANDARD_POLICY)
    }

    /// A policy with no limits yet.
    pub fn new(fallback: OutputFormat) -> Self {
        Self {
            limits: BTreeMap::new(),
            fallback,
        }
    }

    /// Cap `format` at `max` px per side. A limit on the fallback format is ignored.
    pub fn with_limit(mut self, format: OutputFormat, max: u32) -> Self {
        self.limits.insert(format, max);
        self
    }

    pub fn max_dimension(&self, format: OutputFormat) -> Option<u32> {
        if format == self.fallback {
            return None;
        }
        self.limits.get(&format).copied()
    }

    pub fn fallback(&self) -> OutputFormat {
        self.fallback
    }
}

// ── Requests and steps ───────────────────────────────────────────────────

/// Where a document's pages go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub pad_filenames: bool,
}

impl OutputTarget {
    pub fn new(dir: impl Into<PathBuf>, pad_filenames: bool) -> Self {
        Self {
            dir: dir.into(),
            pad_filenames,
        }
    }

    /// `dir/7.png`, or `dir/007.png` when padding.
    pub fn path_for(&self, page: usize, format: OutputFormat) -> PathBuf {
        let stem = if self.pad_filenames {
            format!("{page:03}")
        } else {
            page.to_string()
        };
        self.dir.join(format!("{stem}.{}", format.extension()))
    }
}

/// One page waiting to be encoded.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub page: usize,
    pub buffer: Arc<RawPixelBuffer>,
    pub target: Arc<OutputTarget>,
    /// Current format; becomes the fallback after an accepted oversize.
    pub format: OutputFormat,
    /// The one existing path the user agreed to replace.
    overwrite_approved: Option<PathBuf>,
}

impl EncodeRequest {
    pub fn new(
        page: usize,
        buffer: Arc<RawPixelBuffer>,
        target: Arc<OutputTarget>,
        format: OutputFormat,
    ) -> Self {
        Self {
            page,
            buffer,
            target,
            format,
            overwrite_approved: None,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.target.path_for(self.page, self.format)
    }
}

/// A decision the encoder cannot make alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Overwrite {
        path: PathBuf,
    },
    Oversize {
        format: OutputFormat,
        width: u32,
        height: u32,
        max_dim: u32,
    },
}

/// Result of one [`ImageEncoder::step`].
#[derive(Debug)]
pub enum EncodeStep {
    Done(ConversionResult),
    NeedsConfirmation(Confirmation, EncodeRequest),
}

// ── Encoder ──────────────────────────────────────────────────────────────

/// How a write ended when it did not fail.
#[derive(Debug, PartialEq, Eq)]
enum Persisted {
    Written,
    /// Something appeared at the target after the existence check and the
    /// write was not allowed to replace it.
    TargetExists,
}

/// Writes pixel buffers as image files under a [`FormatPolicy`].
#[derive(Debug, Clone)]
pub struct ImageEncoder {
    policy: Arc<FormatPolicy>,
    jpeg_quality: u8,
}

impl ImageEncoder {
    pub fn new(policy: Arc<FormatPolicy>, jpeg_quality: u8) -> Self {
        Self {
            policy,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn policy(&self) -> &FormatPolicy {
        &self.policy
    }

    /// Advance `req` as far as possible without asking anyone.
    pub fn step(&self, req: EncodeRequest) -> EncodeStep {
        let path = req.output_path();

        if path.exists() && req.overwrite_approved.as_deref() != Some(path.as_path()) {
            return EncodeStep::NeedsConfirmation(Confirmation::Overwrite { path }, req);
        }

        let (width, height) = (req.buffer.width(), req.buffer.height());
        if let Some(max_dim) = self.policy.max_dimension(req.format) {
            if width > max_dim || height > max_dim {
                let confirmation = Confirmation::Oversize {
                    format: req.format,
                    width,
                    height,
                    max_dim,
                };
                return EncodeStep::NeedsConfirmation(confirmation, req);
            }
        }

        let replace = req.overwrite_approved.as_deref() == Some(path.as_path());
        match self.write(&req.buffer, req.format, &path, req.page, replace) {
            Ok(Persisted::Written) => {
                debug!("Wrote page {} → {}", req.page, path.display());
                EncodeStep::Done(ConversionResult::Written(path))
            }
            Ok(Persisted::TargetExists) => {
                debug!("Page {}: {} appeared while encoding", req.page, path.display());
                EncodeStep::NeedsConfirmation(Confirmation::Overwrite { path }, req)
            }
            Err(e) => EncodeStep::Done(ConversionResult::Failed(e)),
        }
    }

    /// Resolve `confirmation` through the delegate. `Ok` updates `req` so
    /// the next [`Self::step`] moves past it; `Err` is the skip reason.
    pub fn apply_decision(
        &self,
        req: &mut EncodeRequest,
        confirmation: Confirmation,
        delegate: &dyn ConversionDelegate,
        conflict: ConflictPolicy,
    ) -> Result<(), SkipReason> {
        match confirmation {
            Confirmation::Overwrite { path } => {
                if conflict.allows_overwrite(&path, delegate) {
                    req.overwrite_approved = Some(path);
                    Ok(())
                } else {
                    info!("Page {}: keeping existing {}", req.page, path.display());
                    Err(SkipReason::FileExists)
                }
            }
            Confirmation::Oversize {
                format,
                width,
                height,
                max_dim,
            } => {
                if delegate.confirm_oversize(format, width, height, max_dim) {
                    let fallback = self.policy.fallback();
                    info!(
                        "Page {}: {}x{} exceeds {} limit {}, writing {} instead",
                        req.page, width, height, format, max_dim, fallback
                    );
                    req.format = fallback;
                    Ok(())
                } else {
                    info!("Page {}: {}x{} too large for {}, skipped", req.page, width, height, format);
                    Err(SkipReason::SizeLimit)
                }
            }
        }
    }

    /// Encode one page to completion, asking `delegate` inline.
    pub fn encode(
        &self,
        mut req: EncodeRequest,
        delegate: &dyn ConversionDelegate,
        conflict: ConflictPolicy,
    ) -> ConversionResult {
        loop {
            match self.step(req) {
                EncodeStep::Done(result) => return result,
                EncodeStep::NeedsConfirmation(confirmation, mut pending) => {
                    if let Err(reason) =
                        self.apply_decision(&mut pending, confirmation, delegate, conflict)
                    {
                        return ConversionResult::Skipped(reason);
                    }
                    req = pending;
                }
            }
        }
    }

    /// Encode into a temp file next to `path`, then move it into place.
    /// Without `replace` an existing target is left untouched.
    fn write(
        &self,
        buffer: &RawPixelBuffer,
        format: OutputFormat,
        path: &Path,
        page: usize,
        replace: bool,
    ) -> Result<Persisted, PageError> {
        let write_failed = |e: std::io::Error| PageError::WriteFailed {
            page,
            path: path.to_path_buf(),
            detail: e.to_string(),
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".pdf2img-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(write_failed)?;

        let encode_failed = |detail: String| PageError::EncodeFailed {
            page,
            format: format.to_string(),
            detail,
        };
        let img = buffer.to_image().map_err(|e| encode_failed(e.to_string()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.encode_into(&img, format, &mut writer)
                .map_err(|e| encode_failed(e.to_string()))?;
            writer.flush().map_err(write_failed)?;
        }

        if replace {
            tmp.persist(path).map_err(|e| write_failed(e.error))?;
            return Ok(Persisted::Written);
        }
        match tmp.persist_noclobber(path) {
            Ok(_) => Ok(Persisted::Written),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(Persisted::TargetExists)
            }
            Err(e) => Err(write_failed(e.error)),
        }
    }

    fn encode_into<W: Write>(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        w: &mut W,
    ) -> Result<(), image::ImageError> {
        match format {
            OutputFormat::Png => img.write_with_encoder(PngEncoder::new(w)),
            OutputFormat::Jpg => {
                img.write_with_encoder(JpegEncoder::new_with_quality(w, self.jpeg_quality))
            }
            OutputFormat::Webp => img.write_with_encoder(WebPEncoder::new_lossless(w)),
            OutputFormat::Bmp => img.write_with_encoder(BmpEncoder::new(w)),
            OutputFormat::Avif => img.write_with_encoder(AvifEncoder::new(w)),
        }
    }
}
