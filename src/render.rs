//! Page rasterization
//!
//! The batch processor only talks to the [`Rasterizer`] trait. The production
//! implementation, [`PdfiumRasterizer`], binds the PDFium shared library
//! through `pdfium-render`.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::export::encode::check_size;

/// One rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Zero-based page index
    pub index: usize,
    /// Opaque page raster at the requested resolution
    pub image: RgbaImage,
    /// Page width in PDF points (1/72 inch)
    pub width_pt: f32,
    /// Page height in PDF points
    pub height_pt: f32,
}

/// Convert a length in points to pixels at `dpi`, never less than one pixel
pub fn points_to_pixels(points: f32, dpi: u32) -> u32 {
    ((points * dpi as f32 / 72.0).round() as u32).max(1)
}

/// Source of page rasters
///
/// Implementations must not modify the document they read.
pub trait Rasterizer: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self, path: &Path) -> Result<usize>;

    /// Render a single page
    fn render_page(&self, path: &Path, index: usize, dpi: u32) -> Result<RenderedPage>;

    /// Render every page in order, handing each one to `sink` together with
    /// the page total
    ///
    /// The default implementation reopens the document per page; backends
    /// that can keep a document open should override it.
    fn render_pages(
        &self,
        path: &Path,
        dpi: u32,
        sink: &mut dyn FnMut(RenderedPage, usize) -> Result<()>,
    ) -> Result<()> {
        let total = self.page_count(path)?;
        for index in 0..total {
            let page = self.render_page(path, index, dpi)?;
            sink(page, total)?;
        }
        Ok(())
    }
}

/// Rasterizer backed by PDFium
///
/// PDFium is bound on each call, so the struct holds no library state and can
/// be shared between worker threads. A bound `Pdfium` holds a process-wide
/// lock until dropped, so no call keeps it bound while caller code runs.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Use the PDFium library from the system library search path
    pub fn system() -> Self {
        Self { library_dir: None }
    }

    /// Use the PDFium library found in `dir`
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    /// Fail early if PDFium cannot be loaded
    pub fn check(&self) -> Result<()> {
        self.bind().map(|_| ())
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| Error::Render(format!("pdfium bind failed: {e}")))?;

        Ok(Pdfium::new(bindings))
    }

    fn open<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>> {
        if !path.exists() {
            return Err(Error::not_found(path));
        }
        pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Error::open(path, e))
    }
}

/// Render one PDFium page, including form fields and annotations
fn render_pdfium_page(page: &PdfPage, index: usize, dpi: u32) -> Result<RenderedPage> {
    let width_pt = page.width().value;
    let height_pt = page.height().value;
    let width = points_to_pixels(width_pt, dpi);
    let height = points_to_pixels(height_pt, dpi);
    check_size(width, height)?;

    let bitmap = page
        .render_with_config(
            &PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32)
                .render_form_data(true),
        )
        .map_err(|e| Error::Render(format!("render page {} failed: {e}", index + 1)))?;

    // PDFium may round one side differently from the requested size
    let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
    let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
        Error::Render(format!("page {} bitmap has an unexpected size", index + 1))
    })?;

    debug!(page = index + 1, width, height, "rendered page");

    Ok(RenderedPage {
        index,
        image,
        width_pt,
        height_pt,
    })
}

impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self, path: &Path) -> Result<usize> {
        let pdfium = self.bind()?;
        let document = Self::open(&pdfium, path)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(&self, path: &Path, index: usize, dpi: u32) -> Result<RenderedPage> {
        let pdfium = self.bind()?;
        let document = Self::open(&pdfium, path)?;
        let total = document.pages().len() as usize;

        let page = document.pages().iter().nth(index).ok_or_else(|| {
            Error::open(
                path,
                format!("page {} out of range (document has {} pages)", index + 1, total),
            )
        })?;

        render_pdfium_page(&page, index, dpi)
    }

    /// Renders the whole document while PDFium is bound, then releases it
    /// before `sink` runs
    ///
    /// The sink does the watermarking and encoding, so other workers can
    /// render in the meantime. The price is holding every page raster of one
    /// document in memory at once.
    fn render_pages(
        &self,
        path: &Path,
        dpi: u32,
        sink: &mut dyn FnMut(RenderedPage, usize) -> Result<()>,
    ) -> Result<()> {
        let pages = {
            let pdfium = self.bind()?;
            let document = Self::open(&pdfium, path)?;
            let pages = document
                .pages()
                .iter()
                .enumerate()
                .map(|(index, page)| render_pdfium_page(&page, index, dpi))
                .collect::<Result<Vec<_>>>()?;
            pages
        };

        let total = pages.len();
        debug!(document = %path.display(), pages = total, "pdfium released");
        for page in pages {
            sink(page, total)?;
        }

        Ok(())
    }
}
