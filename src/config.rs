//! Configuration types for PDF-to-image conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is plain data: every
//! human decision (passwords, overwrites, oversized pages) goes through the
//! [`crate::delegate::ConversionDelegate`] instead, so one config can drive
//! an interactive terminal session and an unattended batch alike.

use crate::error::Pdf2ImgError;
use crate::pipeline::conflict::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pages above this count trigger the large-job confirmation.
pub const DEFAULT_LARGE_JOB_THRESHOLD: usize = 50;

/// Configuration for a PDF-to-image conversion.
///
/// # Example
/// ```rust
/// use pdf2img::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .format(OutputFormat::Webp)
///     .pad_filenames(true)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.format, OutputFormat::Webp);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Requested output format. Default: [`OutputFormat::Png`].
    ///
    /// A page may still be written in the fallback format when it exceeds
    /// the format's dimension limit and the delegate accepts the fallback.
    pub format: OutputFormat,

    /// Name files `001.png` instead of `1.png`. Default: false.
    ///
    /// Padded names sort correctly in file browsers that compare names
    /// lexically.
    pub pad_filenames: bool,

    /// Rendering DPI. Range: 18–1200. Default: 72.
    ///
    /// At 72 DPI one PDF point maps to one pixel, so an A4 page renders at
    /// 595 × 842 px. Large physical page sizes at high DPI are what push a
    /// page over the webp/avif dimension limits.
    pub dpi: u32,

    /// Worker threads rendering and encoding pages. Default: available parallelism.
    pub workers: usize,

    /// Documents with more pages than this ask for confirmation first. Default: 50.
    pub large_job_threshold: usize,

    /// When `on_progress` fires. Default: [`ProgressMode::Completion`].
    pub progress_mode: ProgressMode,

    /// What to do when a page's output file already exists. Default: [`ConflictPolicy::Ask`].
    pub on_conflict: ConflictPolicy,

    /// JPEG quality 1–100. Default: 90. Ignored by the lossless formats.
    pub jpeg_quality: u8,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pad_filenames: false,
            dpi: 72,
            workers: default_workers(),
            large_job_threshold: DEFAULT_LARGE_JOB_THRESHOLD,
            progress_mode: ProgressMode::default(),
            on_conflict: ConflictPolicy::default(),
            jpeg_quality: 90,
        }
    }
}

/// Number of processing units, falling back to 1 when unknown.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn pad_filenames(mut self, v: bool) -> Self {
        self.config.pad_filenames = v;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn large_job_threshold(mut self, pages: usize) -> Self {
        self.config.large_job_threshold = pages;
        self
    }

    pub fn progress_mode(mut self, mode: ProgressMode) -> Self {
        self.config.progress_mode = mode;
        self
    }

    pub fn on_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.config.on_conflict = policy;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        let c = &self.config;
        if !(18..=1200).contains(&c.dpi) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "DPI must be 18–1200, got {}",
                c.dpi
            )));
        }
        if c.workers == 0 {
            return Err(Pdf2ImgError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Image formats a page can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpg,
    /// Lossless and uncapped; the fallback for oversized pages. (default)
    #[default]
    Png,
    /// Lossless WebP, capped at 16383 px per side.
    Webp,
    Bmp,
    /// AVIF, capped at 65535 px per side.
    Avif,
}

impl OutputFormat {
    /// Every supported format, in menu order.
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Jpg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Bmp,
        OutputFormat::Avif,
    ];

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Avif => "avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            "bmp" => Ok(OutputFormat::Bmp),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(Pdf2ImgError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected jpg, png, webp, bmp or avif)"
            ))),
        }
    }
}

/// When the per-document progress callback fires.
///
/// Pages run concurrently, so "submitted" and "finished" drift apart on
/// large documents. Completion counts reflect real work; submission counts
/// reach the total as soon as every page is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Fire as each page reaches its final result. (default)
    #[default]
    Completion,
    /// Fire as each page is handed to the worker pool.
    Submission,
}
