//! Result and report types produced by the pipeline.

use crate::config::{ConfigWarning, ImageFormat};
use crate::error::{PageError, Pdf2ImgError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One page rendered and encoded in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Format the bytes are actually encoded in; drives the file extension.
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Outcome of exactly one render task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    /// 0-indexed page within the document.
    pub page_index: usize,
    pub outcome: Result<RenderedPage, PageError>,
}

impl RenderResult {
    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A page image persisted in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: PathBuf,
    /// 0-indexed page within the document.
    pub page_index: usize,
}

impl OutputFile {
    /// Base name used as the archive member name.
    pub fn file_name(&self) -> &Path {
        self.path
            .file_name()
            .map(Path::new)
            .unwrap_or(self.path.as_path())
    }
}

/// PDF document metadata, read without rendering any page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Lifecycle of a single conversion run.
///
/// ```text
/// Init → MetadataLoaded → Dispatched → Collecting → Sequenced → Written
///      → (Archived | ArchiveSkipped) → Done
/// ```
///
/// `Failed` is reachable only from `Init` and `MetadataLoaded`: once pages
/// are dispatched, failures are per page and the run always reaches `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Init,
    MetadataLoaded,
    Dispatched,
    Collecting,
    Sequenced,
    Written,
    Archived,
    ArchiveSkipped,
    Done,
    Failed,
}

impl RunState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, MetadataLoaded)
                | (Init, Failed)
                | (MetadataLoaded, Dispatched)
                | (MetadataLoaded, Failed)
                | (Dispatched, Collecting)
                | (Collecting, Sequenced)
                | (Sequenced, Written)
                | (Written, Archived)
                | (Written, ArchiveSkipped)
                | (Archived, Done)
                | (ArchiveSkipped, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document (`P`).
    pub total_pages: usize,
    /// Pages whose image file was written.
    pub processed_pages: usize,
    /// Pages that failed to render or to write.
    pub failed_pages: usize,
    /// Worker count the pool ran with.
    pub workers: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub write_duration_ms: u64,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Written pages in ascending page order.
    pub files: Vec<OutputFile>,
    /// Per-page failures in ascending page order.
    pub failures: Vec<PageError>,
    /// Archive path, when one was created.
    pub archive: Option<PathBuf>,
    /// Why archive creation failed; the per-page files are still valid.
    pub archive_error: Option<String>,
    pub warnings: Vec<ConfigWarning>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
    /// How the archive stage ended: `Archived` or `ArchiveSkipped`.
    pub archive_state: RunState,
    /// Final run state; `Done` for every run that returns.
    pub state: RunState,
}

impl ConversionOutput {
    /// 1-indexed numbers of every failed page, ascending.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.failures.iter().map(PageError::page).collect()
    }

    /// Treat a document whose every page failed as an error.
    ///
    /// An empty document (`P = 0`) is a success.
    pub fn check(&self) -> Result<(), Pdf2ImgError> {
        if self.stats.total_pages > 0 && self.files.is_empty() {
            let first_error = self
                .failures
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(Pdf2ImgError::AllPagesFailed {
                total: self.stats.total_pages,
                first_error,
            });
        }
        Ok(())
    }
}
