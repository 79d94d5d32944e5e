//! Text mark rendering with `ab_glyph`

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use crate::config::Color;
use crate::error::{Error, Result};

/// Sans-serif fonts tried, in order, when no font file is configured
const SYSTEM_FONTS: &[&str] = &[
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/System/Library/Fonts/SFNS.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
];

/// First installed font from the built-in list
pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Load the configured font, or the first system font found
pub fn load_font(configured: Option<&Path>) -> Result<FontVec> {
    let path = match configured {
        Some(path) => path.to_path_buf(),
        None => find_system_font().ok_or_else(|| {
            Error::WatermarkAsset(
                "no system font found for the text watermark; pass a font file".to_string(),
            )
        })?,
    };

    let data = std::fs::read(&path).map_err(|e| {
        Error::WatermarkAsset(format!("cannot read font {}: {}", path.display(), e))
    })?;

    FontVec::try_from_vec(data).map_err(|_| {
        Error::WatermarkAsset(format!("{} is not a usable font file", path.display()))
    })
}

/// Width and height in pixels of `text` set at `font_px`
pub fn measure_text(font: &FontVec, text: &str, font_px: f32) -> (u32, u32) {
    let scaled = font.as_scaled(PxScale::from(font_px));

    let mut width = 0.0f32;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }

    (
        (width.ceil() as u32).max(1),
        (scaled.height().ceil() as u32).max(1),
    )
}

/// Render `text` onto a transparent canvas that fits it exactly
///
/// Glyph coverage becomes the alpha channel; opacity is applied later when
/// the mark is blended onto a page.
pub fn render_text(font: &FontVec, text: &str, font_px: f32, color: Color) -> RgbaImage {
    let scale = PxScale::from(font_px);
    let scaled = font.as_scaled(scale);
    let (width, height) = measure_text(font, text, font_px);
    let mut canvas = RgbaImage::new(width, height);

    let baseline = scaled.ascent();
    let mut cursor = 0.0f32;
    let mut prev: Option<GlyphId> = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            cursor += scaled.kern(prev, id);
        }

        let glyph = id.with_scale_and_position(scale, point(cursor, baseline));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = gx as i32 + bounds.min.x as i32;
                let y = gy as i32 + bounds.min.y as i32;
                if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                // Overlapping glyph edges keep the stronger coverage
                if alpha > pixel[3] {
                    *pixel = Rgba([color.r, color.g, color.b, alpha]);
                }
            });
        }

        cursor += scaled.h_advance(id);
        prev = Some(id);
    }

    canvas
}
