//! Archiver: bundle the written pages into one `.tar.gz`.
//!
//! Members are appended in page order under their base name, with fixed
//! headers (mode 0644, mtime 0, uid/gid 0) and a gzip header without a
//! timestamp, so the same pages always produce the same archive bytes.
//!
//! The archive is built in a `.partial` sibling and renamed into place only
//! when complete. On failure the partial file is removed and the per-page
//! files are left untouched; they are never deleted after archiving either.

use crate::error::Pdf2ImgError;
use crate::output::OutputFile;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::{debug, info};

/// Build `archive_path` from `files` (already in page order).
pub fn create_archive(archive_path: &Path, files: &[OutputFile]) -> Result<PathBuf, Pdf2ImgError> {
    let partial = partial_path(archive_path);

    let result = write_archive(&partial, files).and_then(|()| std::fs::rename(&partial, archive_path));
    if let Err(source) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(Pdf2ImgError::ArchiveFailed {
            path: archive_path.to_path_buf(),
            source,
        });
    }

    info!(
        "Archive created: {} ({} files)",
        archive_path.display(),
        files.len()
    );
    Ok(archive_path.to_path_buf())
}

/// Async wrapper running [`create_archive`] on the blocking pool.
pub async fn archive_pages(
    archive_path: PathBuf,
    files: Vec<OutputFile>,
) -> Result<PathBuf, Pdf2ImgError> {
    tokio::task::spawn_blocking(move || create_archive(&archive_path, &files))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Archive task panicked: {}", e)))?
}

fn partial_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    archive_path.with_file_name(name)
}

fn write_archive(path: &Path, files: &[OutputFile]) -> io::Result<()> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);

    for output in files {
        let data = std::fs::read(&output.path)?;
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        builder.append_data(&mut header, output.file_name(), data.as_slice())?;
        debug!("Archived {}", output.file_name().display());
    }

    let encoder = builder.into_inner()?;
    let writer = encoder.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
