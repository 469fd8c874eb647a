//! Output writer: persist each successful page as `page_NNN.<ext>`.
//!
//! Every file goes through a [`tempfile::NamedTempFile`] in the target
//! directory and is renamed into place, so a crash or a full disk never
//! leaves a truncated `page_NNN` behind. One failed write is recorded and
//! the remaining pages are still written.

use crate::config::ImageFormat;
use crate::error::PageError;
use crate::output::{OutputFile, RenderedPage};
use crate::pipeline::sequence::OrderedResults;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// `page_{page_index + 1:03}.{ext}`
pub fn page_file_name(page_index: usize, format: ImageFormat) -> String {
    format!("page_{:03}.{}", page_index + 1, format.extension())
}

/// What the writer produced.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Written files in ascending page order.
    pub files: Vec<OutputFile>,
    /// Render and write failures in ascending page order.
    pub failures: Vec<PageError>,
}

/// Atomically write one page into `dir`.
pub fn write_page(
    dir: &Path,
    page_index: usize,
    page: &RenderedPage,
) -> Result<OutputFile, PageError> {
    let path = dir.join(page_file_name(page_index, page.format));
    let fail = |path: &PathBuf, e: std::io::Error| PageError::WriteFailed {
        page: page_index + 1,
        path: path.clone(),
        detail: e.to_string(),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| fail(&path, e))?;
    tmp.write_all(&page.bytes).map_err(|e| fail(&path, e))?;
    tmp.as_file().sync_all().map_err(|e| fail(&path, e))?;
    tmp.persist(&path).map_err(|e| fail(&path, e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), page.bytes.len());
    Ok(OutputFile { path, page_index })
}

/// Write every successful page of `results` into `dir`, in page order.
///
/// Render failures are carried over into the report untouched.
pub fn write_pages(dir: &Path, results: OrderedResults) -> WriteReport {
    let mut report = WriteReport::default();

    for result in results {
        match result.outcome {
            Ok(ref page) => match write_page(dir, result.page_index, page) {
                Ok(file) => report.files.push(file),
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push(e);
                }
            },
            Err(e) => report.failures.push(e),
        }
    }

    report
}
