//! Configuration types for PDF-to-image conversion.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Validation happens in one place
//! ([`ConversionConfig::validate`]) so a config assembled by hand is checked
//! exactly like one produced by the builder, before any page is dispatched.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Below this DPI text becomes hard to read; a warning is emitted.
pub const MIN_RECOMMENDED_DPI: u32 = 72;

/// Above this DPI files get very large; a warning is emitted.
pub const MAX_RECOMMENDED_DPI: u32 = 600;

/// Configuration for a PDF-to-image conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{ConversionConfig, ImageFormat};
///
/// let config = ConversionConfig::builder()
///     .format(ImageFormat::Png)
///     .dpi(200)
///     .workers(4)
///     .create_archive(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.resolved_workers(), 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory receiving `page_NNN.<ext>` files.
    /// Default: `<source_stem>_images` beside the source file.
    pub output_dir: Option<PathBuf>,

    /// Encoded image format. Default: [`ImageFormat::Jpeg`].
    pub format: ImageFormat,

    /// Rendering resolution in dots per inch. Must be ≥ 1. Default: 150.
    ///
    /// PDF user space is 72 points per inch, so the page is scaled by
    /// `dpi / 72`. Values outside 72–600 are accepted with a warning.
    pub dpi: u32,

    /// JPEG quality, 1–100. Ignored for PNG but still validated. Default: 85.
    pub quality: u8,

    /// Bundle the written pages into `<source_stem>_images.tar.gz`. Default: true.
    pub create_archive: bool,

    /// Number of pages rendered concurrently. `None` means host parallelism,
    /// resolved once by [`ConversionConfig::resolved_workers`].
    pub workers: Option<usize>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-page render timeout in seconds. `None` (default) waits for the renderer.
    pub page_timeout_secs: Option<u64>,

    /// Cap on the rendered width and height in pixels. `None` (default) keeps
    /// the exact DPI scale.
    ///
    /// An A0 poster at 600 DPI is roughly 20 000 × 28 000 px; this cap keeps
    /// memory bounded on such pages by scaling them down proportionally.
    pub max_rendered_pixels: Option<u32>,

    /// Receives one event per completed page. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            format: ImageFormat::default(),
            dpi: 150,
            quality: 85,
            create_archive: true,
            workers: None,
            password: None,
            page_timeout_secs: None,
            max_rendered_pixels: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("dpi", &self.dpi)
            .field("quality", &self.quality)
            .field("create_archive", &self.create_archive)
            .field("workers", &self.workers)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every fatal constraint.
    pub fn validate(&self) -> Result<(), Pdf2ImgError> {
        if !(1..=100).contains(&self.quality) {
            return Err(Pdf2ImgError::InvalidQuality(self.quality));
        }
        if self.dpi == 0 {
            return Err(Pdf2ImgError::InvalidConfig("DPI must be ≥ 1, got 0".into()));
        }
        if self.workers == Some(0) {
            return Err(Pdf2ImgError::InvalidConfig(
                "Worker count must be ≥ 1".into(),
            ));
        }
        if self.page_timeout_secs == Some(0) {
            return Err(Pdf2ImgError::InvalidConfig(
                "Page timeout must be ≥ 1 second".into(),
            ));
        }
        if self.max_rendered_pixels == Some(0) {
            return Err(Pdf2ImgError::InvalidConfig(
                "Maximum rendered pixels must be ≥ 1".into(),
            ));
        }
        if let Some(ref dir) = self.output_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(Pdf2ImgError::InvalidConfig(format!(
                    "Output path '{}' exists and is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Non-blocking issues worth telling the user about.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.dpi < MIN_RECOMMENDED_DPI {
            warnings.push(ConfigWarning::LowDpi(self.dpi));
        } else if self.dpi > MAX_RECOMMENDED_DPI {
            warnings.push(ConfigWarning::HighDpi(self.dpi));
        }
        warnings
    }

    /// Worker count with the host-parallelism default applied. Always ≥ 1.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn create_archive(mut self, v: bool) -> Self {
        self.config.create_archive = v;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = Some(n);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = Some(secs);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = Some(px);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Encoded output format of each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossy, honours [`ConversionConfig::quality`]. (default)
    #[default]
    Jpeg,
    /// Lossless; quality is ignored.
    Png,
}

impl ImageFormat {
    /// File extension used for page files.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => f.write_str("JPEG"),
            ImageFormat::Png => f.write_str("PNG"),
        }
    }
}

/// A configuration value that is allowed but probably not what the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigWarning {
    /// DPI below [`MIN_RECOMMENDED_DPI`].
    LowDpi(u32),
    /// DPI above [`MAX_RECOMMENDED_DPI`].
    HighDpi(u32),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::LowDpi(dpi) => write!(
                f,
                "DPI {dpi} is very low; at least {MIN_RECOMMENDED_DPI} is recommended"
            ),
            ConfigWarning::HighDpi(dpi) => write!(
                f,
                "DPI {dpi} is above {MAX_RECOMMENDED_DPI}; output files will be very large"
            ),
        }
    }
}
