//! Page rasterization
//!
//! lopdf cannot draw pages, so rendering goes through the `Rasterizer` trait.
//! The `pdfium` feature provides an implementation backed by pdfium-render;
//! tests and other callers can plug in their own.

use crate::constants::JPEG_QUALITY;
use crate::options::{RasterFormat, RasterOptions};
use crate::transform::images::flatten_on_white;
use crate::types::*;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// How large a rendered page should be
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderSize {
    /// Multiple of the page size in points
    Scale(f32),
    /// Longer side in pixels
    MaxDimension(u32),
}

pub trait Rasterizer: Send + Sync {
    fn page_count(&self, source: &SourceFile) -> Result<usize>;

    /// Render one page (0-based). Transparent areas may be left transparent.
    fn render_page(&self, source: &SourceFile, index: usize, size: RenderSize) -> Result<RgbaImage>;
}

/// Render every page to PNG or JPEG at `options.dpi`, on a white background
pub fn pdf_to_images(
    rasterizer: &dyn Rasterizer,
    source: &SourceFile,
    options: &RasterOptions,
) -> Result<Vec<OutputFile>> {
    options.validate()?;
    let page_count = rasterizer.page_count(source)?;
    let base = source.base_name();

    (0..page_count)
        .map(|index| {
            let page = rasterizer.render_page(source, index, RenderSize::Scale(options.scale()))?;
            let bytes = encode_on_white(&page, options.format)?;
            let name = format!("{}_page_{}.{}", base, index + 1, options.format.extension());
            Ok(OutputFile::new(name, bytes))
        })
        .collect()
}

/// Flatten onto white and encode
pub fn encode_on_white(page: &RgbaImage, format: RasterFormat) -> Result<Vec<u8>> {
    let rgb = RgbImage::from_raw(page.width(), page.height(), flatten_on_white(page))
        .ok_or_else(|| PagesError::Render("Rendered buffer has the wrong size".to_string()))?;

    let mut bytes = Cursor::new(Vec::new());
    match format {
        RasterFormat::Png => rgb.write_to(&mut bytes, ImageFormat::Png)?,
        RasterFormat::Jpg => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
    }
    Ok(bytes.into_inner())
}

/// Directories searched for a bundled pdfium library, most specific first.
///
/// An explicitly configured directory comes before `vendor/pdfium/lib` under
/// the working directory. Directories that do not exist are skipped.
pub fn pdfium_library_dirs(configured: Option<&Path>, working_dir: Option<&Path>) -> Vec<PathBuf> {
    let vendored = working_dir.map(|dir| dir.join("vendor").join("pdfium").join("lib"));
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(vendored)
        .filter(|dir| dir.is_dir())
        .collect()
}

#[cfg(feature = "pdfium")]
pub use pdfium::{PdfiumRasterizer, bind_pdfium};

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::*;
    use pdfium_render::prelude::*;

    /// Bind the first pdfium found in `dirs`, then the system library
    pub fn bind_pdfium(dirs: &[PathBuf]) -> Result<Pdfium> {
        for dir in dirs {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => log::debug!("No usable pdfium in {}: {}", dir.display(), e),
            }
        }

        Pdfium::bind_to_system_library().map(Pdfium::new).map_err(|e| {
            let searched: Vec<String> = dirs.iter().map(|dir| dir.display().to_string()).collect();
            let location = if searched.is_empty() {
                "the system library path".to_string()
            } else {
                format!("{} or the system library path", searched.join(", "))
            };
            PagesError::Render(format!("Pdfium library not found in {}: {}", location, e))
        })
    }

    fn render_error(e: PdfiumError) -> PagesError {
        PagesError::Render(e.to_string())
    }

    /// Binds pdfium on each call; callers run it inside `spawn_blocking`
    #[derive(Debug, Default, Clone)]
    pub struct PdfiumRasterizer {
        library_dir: Option<PathBuf>,
    }

    impl PdfiumRasterizer {
        /// Look for the pdfium library in `dir` before the default locations
        pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
            Self {
                library_dir: Some(dir.into()),
            }
        }

        fn bind(&self) -> Result<Pdfium> {
            let working_dir = std::env::current_dir().ok();
            bind_pdfium(&pdfium_library_dirs(self.library_dir.as_deref(), working_dir.as_deref()))
        }
    }

    impl Rasterizer for PdfiumRasterizer {
        fn page_count(&self, source: &SourceFile) -> Result<usize> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(&source.bytes, None)
                .map_err(render_error)?;
            Ok(document.pages().len() as usize)
        }

        fn render_page(&self, source: &SourceFile, index: usize, size: RenderSize) -> Result<RgbaImage> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(&source.bytes, None)
                .map_err(render_error)?;
            let page = document.pages().get(index as u16).map_err(render_error)?;

            let scale = match size {
                RenderSize::Scale(scale) => scale,
                RenderSize::MaxDimension(max) => {
                    let longest = page.width().value.max(page.height().value);
                    if longest <= 0.0 { 1.0 } else { max as f32 / longest }
                }
            };
            let config = PdfRenderConfig::new().scale_page_by_factor(scale);

            let bitmap = page.render_with_config(&config).map_err(render_error)?;
            let width = bitmap.width() as u32;
            let height = bitmap.height() as u32;
            RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec())
                .ok_or_else(|| PagesError::Render("Bitmap has the wrong size".to_string()))
        }
    }
}
