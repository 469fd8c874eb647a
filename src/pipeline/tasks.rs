//! Task generation: one immutable [`RenderTask`] per page.

use crate::config::{ConversionConfig, ImageFormat};
use crate::error::Pdf2ImgError;
use std::path::Path;
use std::sync::Arc;

/// Largest page count the renderer can address (pdfium uses a `u16` index).
pub const MAX_PAGE_COUNT: usize = u16::MAX as usize;

/// Parameters shared by every task of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderParams {
    pub dpi: u32,
    pub format: ImageFormat,
    pub quality: u8,
    pub password: Option<String>,
    pub max_rendered_pixels: Option<u32>,
}

impl RenderParams {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            dpi: config.dpi,
            format: config.format,
            quality: config.quality,
            password: config.password.clone(),
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    /// Scale factor from PDF points (72 per inch) to pixels.
    pub fn zoom(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// "Render page `page_index` of `source` with `params`."
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub source: Arc<Path>,
    pub page_index: usize,
    pub params: Arc<RenderParams>,
}

impl RenderTask {
    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }
}

/// Produce exactly `page_count` tasks, indices `0..page_count`.
pub fn generate_tasks(
    source: &Path,
    page_count: usize,
    params: RenderParams,
) -> Result<Vec<RenderTask>, Pdf2ImgError> {
    if page_count > MAX_PAGE_COUNT {
        return Err(Pdf2ImgError::InvalidPageCount {
            path: source.to_path_buf(),
            detail: format!("{page_count} pages exceeds the limit of {MAX_PAGE_COUNT}"),
        });
    }

    let source: Arc<Path> = Arc::from(source);
    let params = Arc::new(params);

    Ok((0..page_count)
        .map(|page_index| RenderTask {
            source: Arc::clone(&source),
            page_index,
            params: Arc::clone(&params),
        })
        .collect())
}
