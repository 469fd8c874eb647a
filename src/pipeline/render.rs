//! PDF rasterisation: the [`PageRenderer`] seam and its pdfium implementation.
//!
//! ## Why one document handle per task?
//!
//! pdfium keeps mutable per-document state and is not reentrant across
//! threads sharing a handle. Every [`PageRenderer::render_page`] call opens
//! its own handle, renders one page and drops the handle before returning,
//! so the only thing workers share is the read-only file on disk. Because
//! the handle lives on the stack of the blocking closure, it is released on
//! success, error and panic unwind alike.
//!
//! ## Why a trait?
//!
//! The pool, sequencer, writer and archiver never touch pdfium directly.
//! Tests drive the whole pipeline with in-memory renderers, and a
//! different rendering backend only needs to implement two methods.

use crate::error::Pdf2ImgError;
use crate::output::{DocumentMetadata, RenderedPage};
use crate::pipeline::encode;
use crate::pipeline::tasks::RenderTask;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable pointing at an existing pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Errors raised by a [`PageRenderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rendering library itself could not be loaded.
    #[error("failed to bind pdfium: {0}")]
    Binding(String),

    #[error("failed to open document: {0}")]
    Open(String),

    #[error("document is encrypted and requires a password")]
    PasswordRequired,

    #[error("wrong password")]
    WrongPassword,

    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("{0}")]
    Page(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl RenderError {
    /// Map a failure while opening the document for metadata to a fatal error.
    pub fn into_fatal(self, path: &Path) -> Pdf2ImgError {
        let path = path.to_path_buf();
        match self {
            RenderError::Binding(detail) => Pdf2ImgError::PdfiumBindingFailed(detail),
            RenderError::PasswordRequired => Pdf2ImgError::PasswordRequired { path },
            RenderError::WrongPassword => Pdf2ImgError::WrongPassword { path },
            other => Pdf2ImgError::CorruptPdf {
                path,
                detail: other.to_string(),
            },
        }
    }
}

/// Turns a document page into encoded image bytes.
///
/// Implementations are shared across worker threads (`Send + Sync`) but must
/// not share a document handle between concurrent calls.
pub trait PageRenderer: Send + Sync + 'static {
    /// Open the document once and read its metadata, including the page count.
    fn open_metadata(
        &self,
        source: &Path,
        password: Option<&str>,
    ) -> Result<DocumentMetadata, RenderError>;

    /// Render and encode a single page. Blocking; called from the blocking pool.
    fn render_page(&self, task: &RenderTask) -> Result<RenderedPage, RenderError>;
}

/// [`PageRenderer`] backed by the pdfium C++ library.
///
/// The library is located, in order, at `$PDFIUM_LIB_PATH`, next to the
/// current working directory, then in the system library path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Locate pdfium using `$PDFIUM_LIB_PATH` or the default search order.
    pub fn new() -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_LIB_PATH_ENV)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Use the pdfium library at an explicit path.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, RenderError> {
        let bindings = match self.library_path {
            Some(ref path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| RenderError::Binding(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

fn open_error(err: PdfiumError, password: Option<&str>) -> RenderError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            RenderError::WrongPassword
        } else {
            RenderError::PasswordRequired
        }
    } else {
        RenderError::Open(err_str)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn open_metadata(
        &self,
        source: &Path,
        password: Option<&str>,
    ) -> Result<DocumentMetadata, RenderError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(source, password)
            .map_err(|e| open_error(e, password))?;

        let metadata = document.metadata();
        let pages = document.pages();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
            modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
            page_count: pages.len() as usize,
            pdf_version: format!("{:?}", document.version()),
        })
    }

    fn render_page(&self, task: &RenderTask) -> Result<RenderedPage, RenderError> {
        let params = &task.params;
        let password = params.password.as_deref();

        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(&*task.source, password)
            .map_err(|e| open_error(e, password))?;

        let pages = document.pages();
        let total = pages.len() as usize;
        if task.page_index >= total {
            return Err(RenderError::PageOutOfRange {
                page: task.page_num(),
                total,
            });
        }

        let page = pages
            .get(task.page_index as u16)
            .map_err(|e| RenderError::Page(format!("{:?}", e)))?;

        let mut render_config = PdfRenderConfig::new().scale_page_by_factor(params.zoom());
        if let Some(max) = params.max_rendered_pixels {
            let max = i32::try_from(max).unwrap_or(i32::MAX);
            render_config = render_config
                .set_maximum_width(max)
                .set_maximum_height(max);
        }

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RenderError::Page(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        let bytes = encode::encode_page(&image, params.format, params.quality)?;
        debug!(
            "Rendered page {} → {}x{} px, {} bytes",
            task.page_num(),
            image.width(),
            image.height(),
            bytes.len()
        );

        Ok(RenderedPage {
            bytes,
            format: params.format,
            width: image.width(),
            height: image.height(),
        })
    }
}
