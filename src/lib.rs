//! # edgequake-pdf2img
//!
//! Rasterise every page of a PDF into an image file, in parallel, with
//! per-page failure isolation and deterministic output.
//!
//! ## Why this crate?
//!
//! Turning a long document into page images is embarrassingly parallel, but
//! a naive parallel loop gives you nondeterministic file order, and one
//! malformed page takes the whole run down with it. This crate renders pages
//! on a bounded worker pool, turns any per-page fault (error, panic,
//! timeout) into a tagged [`PageError`], restores page order in one place,
//! and only then writes `page_NNN.<ext>` files and an optional archive. Same
//! input and settings give the same file names and bytes for any worker
//! count.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path + %PDF magic, open once for page count
//!  ├─ 2. Tasks     one immutable RenderTask per page
//!  ├─ 3. Pool      W workers, pdfium render + encode (spawn_blocking)
//!  ├─ 4. Sequence  collect out-of-order results, sort by page index
//!  ├─ 5. Write     page_001.jpg, page_002.jpg, … (atomic, page order)
//!  └─ 6. Archive   <stem>_images.tar.gz beside the source (optional)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{convert, ConversionConfig, ImageFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .format(ImageFormat::Png)
//!         .dpi(200)
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     output.check()?;
//!     println!("{} pages in {}", output.files.len(), output.output_dir.display());
//!     if !output.failures.is_empty() {
//!         eprintln!("failed pages: {:?}", output.failed_pages());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```
//!
//! ## Pdfium
//!
//! [`PdfiumRenderer`] binds to `$PDFIUM_LIB_PATH` when set, otherwise to a
//! pdfium library in the working directory, otherwise to the system one.
//! Any other backend can be plugged in through [`PageRenderer`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConfigWarning, ConversionConfig, ConversionConfigBuilder, ImageFormat};
pub use convert::{convert, convert_sync, convert_with, inspect, inspect_with};
pub use error::{PageError, Pdf2ImgError};
pub use output::{
    ConversionOutput, ConversionStats, DocumentMetadata, OutputFile, RenderResult, RenderedPage,
    RunState,
};
pub use pipeline::pool::{CancelHandle, WorkerPool};
pub use pipeline::render::{PageRenderer, PdfiumRenderer, RenderError};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_with, PageStream};
