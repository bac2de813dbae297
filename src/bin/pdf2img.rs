//! CLI binary for pdf2img.
//!
//! A thin shim over the library crate: maps flags to `ConversionConfig`,
//! answers the library's questions on the terminal and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2img::config::default_workers;
use pdf2img::{
    inspect, BatchSummary, ConflictPolicy, ConversionConfig, ConversionDelegate, Converter,
    DocumentOutcome, DocumentResult, DocumentSkipReason, OutputFormat, PolicyDelegate,
    ProgressMode,
};
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal delegate ────────────────────────────────────────────────────────

/// Answers the library's questions on the terminal and drives the progress bar.
///
/// `--password` candidates are tried before asking. Without a terminal on
/// stdin (or with `--no-input`) every question gets the library default,
/// except that `--yes` accepts large jobs and oversize fallbacks.
struct TerminalDelegate {
    bar: Option<ProgressBar>,
    policy: PolicyDelegate,
    interactive: bool,
    assume_yes: bool,
    quiet: bool,
}

impl TerminalDelegate {
    fn new(cli: &Cli, show_progress: bool) -> Self {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {pos:>3}/{len} pages  \
                     ⏱ {elapsed_precise}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });

        let policy = cli
            .password
            .iter()
            .fold(PolicyDelegate::new(), |p, pwd| p.password(pwd.clone()));

        Self {
            bar,
            policy,
            interactive: !cli.no_input && io::stdin().is_terminal(),
            assume_yes: cli.yes,
            quiet: cli.quiet,
        }
    }

    /// Print above the bar, or straight to stderr without one.
    fn say(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None if !self.quiet => eprintln!("{line}"),
            None => {}
        }
    }

    /// Read one line from stdin with the bar hidden. `None` on EOF or error.
    fn read_line(&self, prompt: &str) -> Option<String> {
        let ask = || {
            eprint!("{prompt}");
            io::stderr().flush().ok();
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            }
        };
        match &self.bar {
            Some(bar) => bar.suspend(ask),
            None => ask(),
        }
    }

    /// Yes/no question; an empty answer picks `default`.
    fn confirm(&self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        match self.read_line(&format!("{} {question} {hint} ", cyan("?"))) {
            Some(answer) => match answer.trim().to_ascii_lowercase().as_str() {
                "" => default,
                "y" | "yes" => true,
                _ => false,
            },
            None => default,
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ConversionDelegate for TerminalDelegate {
    fn prompt_password(&self, file_name: &str) -> Option<String> {
        if let Some(pwd) = self.policy.prompt_password(file_name) {
            return Some(pwd);
        }
        if !self.interactive {
            return None;
        }
        // Typed input is echoed; pass --password to keep it off the screen.
        self.read_line(&format!(
            "{} Password for '{}' (empty to cancel): ",
            cyan("?"),
            file_name
        ))
        .filter(|p| !p.is_empty())
    }

    fn confirm_skip(&self, file_name: &str) -> bool {
        !self.interactive || self.confirm(&format!("Skip '{file_name}'?"), true)
    }

    fn notify_error(&self, message: &str) {
        self.say(format!("{} {}", red("✘"), message));
    }

    fn confirm_large_job(&self, document: &Path, page_count: usize) -> bool {
        if self.assume_yes || !self.interactive {
            return true;
        }
        self.confirm(
            &format!(
                "'{}' has {} pages. Convert all of them?",
                document.display(),
                page_count
            ),
            true,
        )
    }

    fn confirm_overwrite(&self, path: &Path) -> bool {
        self.interactive && self.confirm(&format!("'{}' exists. Overwrite?", path.display()), false)
    }

    fn confirm_oversize(&self, format: OutputFormat, width: u32, height: u32, max_dim: u32) -> bool {
        if self.assume_yes || !self.interactive {
            return true;
        }
        self.confirm(
            &format!(
                "A {width}x{height} page exceeds the {format} limit of {max_dim} px. Save it as png?"
            ),
            true,
        )
    }

    fn on_document_start(&self, document: &Path, total_pages: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total_pages as u64);
            bar.set_position(0);
            bar.set_prefix(short_name(document));
            bar.reset_eta();
        }
    }

    fn on_progress(&self, _document: &Path, count: usize, _total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(count as u64);
        }
    }

    fn on_document_done(&self, document: &Path, outcome: &DocumentOutcome) {
        self.policy.on_document_done(document, outcome);
        let name = bold(&short_name(document));
        let line = match outcome {
            DocumentOutcome::Completed {
                output_dir, pages, ..
            } => {
                let written = pages.iter().filter(|p| p.result.is_written()).count();
                let mark = if written == pages.len() {
                    green("✔")
                } else {
                    cyan("⚠")
                };
                format!(
                    "{mark} {name}  {written}/{} pages  →  {}",
                    pages.len(),
                    dim(&output_dir.display().to_string())
                )
            }
            DocumentOutcome::Skipped { reason } => {
                let why = match reason {
                    DocumentSkipReason::PasswordNotProvided => "no password",
                    DocumentSkipReason::LargeJobDeclined => "too many pages",
                };
                format!("{} {name}  skipped ({why})", dim("–"))
            }
            DocumentOutcome::Failed { .. } => format!("{} {name}  failed", red("✘")),
        };
        self.say(line);
    }
}

fn short_name(document: &Path) -> String {
    document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.display().to_string())
}

// ── Command line ─────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # One PNG per page, next to the PDF in ./report/1.png, 2.png, ...
  pdf2img report.pdf

  # WebP, zero-padded names (001.webp), 300 DPI
  pdf2img --format webp --pad --dpi 300 scans/*.pdf

  # Unattended: known passwords, replace old output, never prompt
  pdf2img --password s3cret --password other --overwrite --yes --no-input *.pdf

  # Machine-readable report
  pdf2img --json --no-progress report.pdf > report.json

  # Page count and protection without rendering
  pdf2img --inspect-only report.pdf

FORMAT LIMITS:
  webp  16383 px per side     avif  65535 px per side
  jpg, png, bmp               no limit
  Pages over the limit are written as png after confirmation.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to the pdfium shared library to load
  RUST_LOG          Log filter, overrides --verbose / --quiet
"#;

/// Convert PDF files to one image per page.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Convert PDF files to one image per page (jpg, png, webp, bmp, avif)",
    long_about = "Convert PDF documents to one image file per page. Each document's pages \
are written to a folder next to it, named after the document. Password-protected files, \
very long documents, oversized pages and existing output files are confirmed interactively \
or answered by flags.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to convert.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output image format.
    #[arg(short, long, env = "PDF2IMG_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Zero-pad file names to three digits (001.png).
    #[arg(long, env = "PDF2IMG_PAD")]
    pad: bool,

    /// Rendering DPI (18–1200). 72 renders one pixel per PDF point.
    #[arg(long, env = "PDF2IMG_DPI", default_value_t = 72,
          value_parser = clap::value_parser!(u32).range(18..=1200))]
    dpi: u32,

    /// Pages rendered concurrently. Default: number of CPUs.
    #[arg(short, long, env = "PDF2IMG_WORKERS")]
    workers: Option<usize>,

    /// Password to try on protected files (repeatable, tried in order).
    #[arg(long, env = "PDF2IMG_PASSWORD")]
    password: Vec<String>,

    /// Replace existing output files without asking.
    #[arg(long, conflicts_with = "skip_existing")]
    overwrite: bool,

    /// Keep existing output files without asking.
    #[arg(long)]
    skip_existing: bool,

    /// Ask before converting documents with more pages than this.
    #[arg(long, env = "PDF2IMG_LARGE_JOB", default_value_t = pdf2img::config::DEFAULT_LARGE_JOB_THRESHOLD)]
    large_job_threshold: usize,

    /// Accept large documents and oversize fallbacks without asking.
    #[arg(short, long)]
    yes: bool,

    /// Never read from stdin; every question gets its default answer.
    #[arg(long)]
    no_input: bool,

    /// JPEG quality (1–100).
    #[arg(long, env = "PDF2IMG_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Advance the progress bar when pages are queued, not when they finish.
    #[arg(long)]
    progress_on_submit: bool,

    /// Print a JSON report instead of the summary line.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Print page count and protection only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    #[value(alias = "jpeg")]
    Jpg,
    Png,
    Webp,
    Bmp,
    Avif,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpg => OutputFormat::Jpg,
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Webp => OutputFormat::Webp,
            FormatArg::Bmp => OutputFormat::Bmp,
            FormatArg::Avif => OutputFormat::Avif,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a BatchSummary,
    documents: &'a [DocumentResult],
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight the progress bar; the bar and the
    // per-document lines carry what the user needs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.inspect_only {
        return run_inspect(&cli);
    }

    let config = build_config(&cli)?;
    let converter = Converter::new(config).context("Failed to start the PDF engine")?;
    let delegate = TerminalDelegate::new(&cli, show_progress);

    let start = Instant::now();
    let results = converter.convert(&cli.files, &delegate);
    delegate.finish();
    let summary = BatchSummary::from_results(&results, start.elapsed().as_millis() as u64);

    if cli.json {
        let report = Report {
            summary: &summary,
            documents: &results,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} written, {} skipped, {} failed  ({} documents, {}ms)",
            if summary.is_clean() {
                green("✔")
            } else {
                red("✘")
            },
            bold(&summary.pages_written.to_string()),
            summary.pages_skipped,
            summary.pages_failed,
            results.len(),
            summary.duration_ms,
        );
    }

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_inspect(cli: &Cli) -> Result<ExitCode> {
    let mut failed = false;
    let mut reports = Vec::new();

    for file in &cli.files {
        match inspect(file) {
            Ok(info) => {
                if cli.json {
                    reports.push(serde_json::to_value(&info).context("Failed to serialise info")?);
                } else {
                    println!("File:         {}", info.path.display());
                    match info.page_count {
                        Some(n) => println!("Pages:        {n}"),
                        None => println!("Pages:        (locked)"),
                    }
                    println!("Protection:   {:?}", info.protection);
                    println!("Output dir:   {}", info.output_dir.display());
                    println!();
                }
            }
            Err(e) => {
                failed = true;
                if cli.json {
                    reports.push(serde_json::json!({
                        "path": file,
                        "error": e.to_string(),
                    }));
                } else {
                    eprintln!("{} {}", red("✘"), e);
                }
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise metadata")?
        );
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let on_conflict = if cli.overwrite {
        ConflictPolicy::Overwrite
    } else if cli.skip_existing {
        ConflictPolicy::Skip
    } else {
        ConflictPolicy::Ask
    };
    let progress_mode = if cli.progress_on_submit {
        ProgressMode::Submission
    } else {
        ProgressMode::Completion
    };

    ConversionConfig::builder()
        .format(cli.format.into())
        .pad_filenames(cli.pad)
        .dpi(cli.dpi)
        .workers(cli.workers.unwrap_or_else(default_workers))
        .large_job_threshold(cli.large_job_threshold)
        .progress_mode(progress_mode)
        .on_conflict(on_conflict)
        .jpeg_quality(cli.jpeg_quality)
        .build()
        .context("Invalid options")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "pdf2img",
            "--format",
            "jpeg",
            "--pad",
            "--dpi",
            "150",
            "--workers",
            "3",
            "--skip-existing",
            "--progress-on-submit",
            "a.pdf",
            "b.pdf",
        ])
        .unwrap();
        assert_eq!(cli.files.len(), 2);

        let config = build_config(&cli).unwrap();
        assert_eq!(config.format, OutputFormat::Jpg);
        assert!(config.pad_filenames);
        assert_eq!(config.dpi, 150);
        assert_eq!(config.workers, 3);
        assert_eq!(config.on_conflict, ConflictPolicy::Skip);
        assert_eq!(config.progress_mode, ProgressMode::Submission);
    }

    #[test]
    fn overwrite_and_skip_existing_conflict() {
        let err = Cli::try_parse_from(["pdf2img", "--overwrite", "--skip-existing", "a.pdf"]);
        assert!(err.is_err());
    }
}
