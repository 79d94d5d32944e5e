//! Shared helpers for integration tests
//!
//! PDFs are generated in-process with lopdf. `TestRasterizer` stands in for
//! PDFium: it reads each page's MediaBox with lopdf and paints a simple,
//! deterministic page of that size.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use tempfile::TempDir;

use pdf_flattener::config::{ImageMark, WatermarkConfig, WatermarkSource};
use pdf_flattener::pdf::{load_document, page_box};
use pdf_flattener::render::{points_to_pixels, Rasterizer, RenderedPage};
use pdf_flattener::{Error, Result};

/// Renders a white (or transparent) page with a dark band across the top
#[derive(Debug, Default, Clone)]
pub struct TestRasterizer {
    pub transparent: bool,
}

impl TestRasterizer {
    fn paint(&self, index: usize, width_pt: f32, height_pt: f32, dpi: u32) -> RenderedPage {
        let width = points_to_pixels(width_pt, dpi);
        let height = points_to_pixels(height_pt, dpi);
        let background = if self.transparent {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 255, 255, 255])
        };

        let band = (height / 10).max(1);
        let image = RgbaImage::from_fn(width, height, |_, y| {
            if y < band {
                Rgba([40, 40, 40, 255])
            } else {
                background
            }
        });

        RenderedPage {
            index,
            image,
            width_pt,
            height_pt,
        }
    }
}

impl Rasterizer for TestRasterizer {
    fn page_count(&self, path: &Path) -> Result<usize> {
        let doc = load_document(path)?;
        match doc.get_pages().len() {
            0 => Err(Error::open(path, "document has no pages")),
            n => Ok(n),
        }
    }

    fn render_page(&self, path: &Path, index: usize, dpi: u32) -> Result<RenderedPage> {
        let doc = load_document(path)?;
        let page_id = doc
            .get_pages()
            .values()
            .nth(index)
            .copied()
            .ok_or_else(|| Error::open(path, format!("page {} out of range", index + 1)))?;
        let page = page_box(&doc, page_id);
        Ok(self.paint(index, page.width, page.height, dpi))
    }

    fn render_pages(
        &self,
        path: &Path,
        dpi: u32,
        sink: &mut dyn FnMut(RenderedPage, usize) -> Result<()>,
    ) -> Result<()> {
        let doc = load_document(path)?;
        let pages = doc.get_pages();
        for (index, page_id) in pages.values().enumerate() {
            let page = page_box(&doc, *page_id);
            sink(self.paint(index, page.width, page.height, dpi), pages.len())?;
        }
        Ok(())
    }
}

/// Write a PDF with one page per `(width, height)` entry, in points
pub fn write_pdf(path: &Path, sizes: &[(i64, i64)]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (number, (width, height)) in sizes.iter().enumerate() {
        let text = format!("BT /F1 12 Tf 10 10 Td (Page {}) Tj ET", number + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), text.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(*width),
                Object::Integer(*height),
            ],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => sizes.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).expect("failed to write test PDF");
}

/// Create `name` in `dir` with small pages and return its path
pub fn sample_pdf(dir: &TempDir, name: &str, pages: usize) -> PathBuf {
    let path = dir.path().join(name);
    write_pdf(&path, &vec![(144, 96); pages]);
    path
}

/// Write a small opaque red logo and return its path
pub fn write_logo(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("logo.png");
    RgbaImage::from_pixel(24, 12, Rgba([200, 0, 0, 255]))
        .save(&path)
        .expect("failed to write logo");
    path
}

/// Image watermark with the given opacity
pub fn logo_watermark(logo: PathBuf, opacity: f32) -> WatermarkConfig {
    WatermarkConfig {
        source: WatermarkSource::Image(ImageMark {
            path: logo,
            scale_pct: 25.0,
        }),
        opacity,
        ..WatermarkConfig::default()
    }
}
