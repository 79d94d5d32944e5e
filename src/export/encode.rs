//! PNG and JPEG encoding of page rasters

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageError, Rgb, RgbImage, RgbaImage};

use crate::config::{ExportConfig, OutputFormat, PngCompression};
use crate::error::{Error, Result};
use crate::pdf::JpegPage;

/// Largest side the JPEG encoder accepts
pub const MAX_JPEG_DIMENSION: u32 = 65535;

/// Reject rasters that no output format can hold
pub fn check_dimensions(image: &RgbaImage) -> Result<()> {
    let (width, height) = image.dimensions();
    check_size(width, height)
}

/// Same check as [`check_dimensions`], before any pixels are allocated
pub fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedFormat(format!(
            "page rendered to an empty {}x{} image",
            width, height
        )));
    }
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(Error::UnsupportedFormat(format!(
            "page is {}x{} pixels, the limit is {} per side; lower the dpi",
            width, height, MAX_JPEG_DIMENSION
        )));
    }
    Ok(())
}

/// Composite onto opaque white, dropping the alpha channel
pub fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = a as u32;
        let mix = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([mix(r), mix(g), mix(b)])
    })
}

fn is_opaque(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p[3] == 255)
}

/// Encode as PNG, keeping the alpha channel only when it is used
pub fn encode_png(image: &RgbaImage, compression: PngCompression) -> Result<Vec<u8>> {
    check_dimensions(image)?;
    let compression = match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    };

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, FilterType::Adaptive);
    let (width, height) = image.dimensions();
    if is_opaque(image) {
        let rgb = flatten_onto_white(image);
        encoder
            .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| encode_error("png", e))?;
    } else {
        encoder
            .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| encode_error("png", e))?;
    }
    Ok(buffer)
}

/// Encode as baseline JPEG; transparency is flattened onto white first
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    check_dimensions(image)?;
    let rgb = flatten_onto_white(image);

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| encode_error("jpeg", e))?;
    Ok(buffer)
}

/// The encoders only write to memory, so a failure means the page cannot be
/// represented in `format`
fn encode_error(format: &str, error: ImageError) -> Error {
    Error::UnsupportedFormat(format!("cannot encode page as {}: {}", format, error))
}

/// Encode one page for a per-page image format
pub fn encode_image(image: &RgbaImage, export: &ExportConfig) -> Result<Vec<u8>> {
    match export.format {
        OutputFormat::Png => encode_png(image, export.png_compression),
        OutputFormat::Jpeg => encode_jpeg(image, export.quality),
        OutputFormat::Pdf => Err(Error::UnsupportedFormat(
            "pdf pages are assembled into a document, not encoded one by one".to_string(),
        )),
    }
}

/// Prepare a page raster for an image-only PDF
///
/// The page keeps the size it was rendered from: pixels x 72 / dpi.
pub fn jpeg_page(image: &RgbaImage, dpi: u32, quality: u8) -> Result<JpegPage> {
    let data = encode_jpeg(image, quality)?;
    let (width_px, height_px) = image.dimensions();
    let scale = 72.0 / dpi as f32;

    Ok(JpegPage {
        data,
        width_px,
        height_px,
        width_pt: width_px as f32 * scale,
        height_pt: height_px as f32 * scale,
    })
}
