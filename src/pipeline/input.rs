//! Input resolution: validate the source PDF and derive default output paths.
//!
//! We check existence, read permission and the PDF magic bytes (`%PDF`)
//! before dispatch so callers get a meaningful fatal error instead of one
//! renderer failure per page.

use crate::error::Pdf2ImgError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the source stem for both the directory and the archive.
const IMAGES_SUFFIX: &str = "_images";

/// Extension of the archive written beside the source.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Validate that `path` is an existing, readable PDF.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<PathBuf, Pdf2ImgError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(Pdf2ImgError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(Pdf2ImgError::NotAPdf {
            path,
            magic: [0; 4],
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let read = f.read(&mut magic).unwrap_or(0);
            if read < magic.len() || &magic != b"%PDF" {
                return Err(Pdf2ImgError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2ImgError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2ImgError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn source_parent(source: &Path) -> &Path {
    match source.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// `<parent>/<stem>_images`
pub fn default_output_dir(source: &Path) -> PathBuf {
    source_parent(source).join(format!("{}{}", source_stem(source), IMAGES_SUFFIX))
}

/// `<parent>/<stem>_images.tar.gz`
pub fn default_archive_path(source: &Path) -> PathBuf {
    source_parent(source).join(format!(
        "{}{}.{}",
        source_stem(source),
        IMAGES_SUFFIX,
        ARCHIVE_EXTENSION
    ))
}
