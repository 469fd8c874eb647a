//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.
//!
//! Exit status: `0` when the run completed and at least one page was written
//! (or the document has no pages), `1` on a fatal error or when every page
//! failed, `2` on a usage error.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2img::{
    convert, inspect_with, ConversionConfig, ConversionProgressCallback, ImageFormat,
    PdfiumRenderer, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback. Pages complete out of order, so the bar only
/// counts; per-page lines carry the page number.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed(&self) -> String {
        dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages…"))
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, bytes: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:>6} KiB", bytes / 1024)),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages written",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages written  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }

    fn on_archive_complete(&self, archive_path: &Path, members: usize) {
        eprintln!(
            "{} archived {} files → {}",
            green("✔"),
            members,
            bold(&archive_path.display().to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # JPEG pages at 150 DPI into ./report_images/, plus report_images.tar.gz
  pdf2img report.pdf

  # Lossless PNG at print resolution, no archive
  pdf2img --format png --dpi 300 --no-archive report.pdf

  # Custom output directory and 4 workers
  pdf2img -o /tmp/pages -w 4 report.pdf

  # Inspect PDF metadata only
  pdf2img --inspect-only report.pdf

  # Machine-readable result
  pdf2img --json report.pdf > result.json

OUTPUT:
  <output>/page_001.jpg, page_002.jpg, …   one file per page, 1-based, 3-digit padded
  <pdf_dir>/<stem>_images.tar.gz           all pages in page order (unless --no-archive)

  Pages that fail to render are skipped and listed at the end; the other
  pages are still written. Exit status is 1 only when every page failed.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to an existing libpdfium
  PDF2IMG_*         Fallback for every long flag (e.g. PDF2IMG_DPI=300)
  RUST_LOG          Override the log filter (e.g. RUST_LOG=edgequake_pdf2img=debug)
"#;

/// Render every page of a PDF into an image file.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Render every page of a PDF into JPEG or PNG files, in parallel",
    long_about = "Render every page of a PDF document into one image file per page \
(page_001.jpg, page_002.jpg, …) using a pool of parallel workers. A page that fails \
to render is reported and skipped without aborting the others. Output is identical \
for any worker count.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Output directory (default: <stem>_images next to the PDF).
    #[arg(short, long, env = "PDF2IMG_OUTPUT")]
    output: Option<PathBuf>,

    /// Image format.
    #[arg(short, long, env = "PDF2IMG_FORMAT", value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// Rendering resolution in dots per inch (72–600 recommended).
    #[arg(short, long, env = "PDF2IMG_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(1..))]
    dpi: u32,

    /// JPEG quality 1–100 (ignored for PNG).
    #[arg(short, long, env = "PDF2IMG_QUALITY", default_value_t = 85)]
    quality: u8,

    /// Do not create the .tar.gz archive.
    #[arg(long, env = "PDF2IMG_NO_ARCHIVE")]
    no_archive: bool,

    /// Number of parallel workers (default: number of CPUs).
    #[arg(short, long, env = "PDF2IMG_WORKERS")]
    workers: Option<usize>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2IMG_PASSWORD")]
    password: Option<String>,

    /// Give up on a single page after this many seconds.
    #[arg(long, env = "PDF2IMG_PAGE_TIMEOUT")]
    page_timeout: Option<u64>,

    /// Cap on the longest rendered edge in pixels.
    #[arg(long, env = "PDF2IMG_MAX_PIXELS")]
    max_pixels: Option<u32>,

    /// Print the result (ConversionOutput) as JSON on stdout.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no rendering.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    #[value(alias = "jpg")]
    Jpeg,
    Png,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => ImageFormat::Jpeg,
            FormatArg::Png => ImageFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect_with(
            &cli.input,
            cli.password.as_deref(),
            Arc::new(PdfiumRenderer::new()),
        )
        .await
        .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    if !cli.quiet && !cli.json {
        for warning in config.warnings() {
            eprintln!("{} {}", yellow("⚠"), warning);
        }
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Wrote {}/{} pages in {}ms",
                output.stats.processed_pages, output.stats.total_pages, output.stats.total_duration_ms
            );
            if let Some(ref archive) = output.archive {
                eprintln!("Archive: {}", archive.display());
            }
        }
        eprintln!(
            "   {}  —  {} workers, {}ms total",
            bold(&output.output_dir.display().to_string()),
            output.stats.workers,
            output.stats.total_duration_ms,
        );
        if !output.failures.is_empty() {
            let pages: Vec<String> = output.failed_pages().iter().map(usize::to_string).collect();
            eprintln!("   {} failed pages: {}", red("✗"), pages.join(", "));
        }
        if let Some(ref e) = output.archive_error {
            eprintln!("   {} archive not created: {}", yellow("⚠"), e);
        }
    }

    output.check().context("Conversion failed")?;
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .format(cli.format.into())
        .dpi(cli.dpi)
        .quality(cli.quality)
        .create_archive(!cli.no_archive);

    if let Some(ref dir) = cli.output {
        builder = builder.output_dir(dir);
    }
    if let Some(n) = cli.workers {
        builder = builder.workers(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(secs) = cli.page_timeout {
        builder = builder.page_timeout_secs(secs);
    }
    if let Some(px) = cli.max_pixels {
        builder = builder.max_rendered_pixels(px);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
