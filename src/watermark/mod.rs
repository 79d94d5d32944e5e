//! Watermark preparation and application
//!
//! A [`PreparedWatermark`] is built once per batch from a
//! [`WatermarkConfig`]: the font is loaded or the image asset decoded up
//! front, so a bad asset is reported before any page is rendered.
//!
//! Applying a watermark to a page happens in three steps:
//!
//! 1. The mark (rendered text or scaled image) is sized from the page width.
//! 2. Marks are laid out on a transparent layer, tiled or anchored. Rotated
//!    layers are enlarged to the page diagonal, then rotated and cropped back
//!    to the page size.
//! 3. The layer is blended onto the page with the configured opacity.

pub mod compositor;
pub mod layout;
pub mod text;

use ab_glyph::FontVec;
use image::imageops::FilterType;
use image::RgbaImage;

use crate::config::{TextMark, Tiling, WatermarkConfig, WatermarkSource};
use crate::error::{Error, Result};
use layout::Size;

pub use compositor::{blend_layer, paste, rotate_into, scale_alpha};
pub use text::{find_system_font, load_font, measure_text, render_text};

/// Smallest text size in pixels
const MIN_FONT_PX: f32 = 4.0;

enum Mark {
    Text { font: FontVec, style: TextMark },
    Image { image: RgbaImage, scale_pct: f32 },
}

/// A watermark whose assets are loaded and ready to apply
pub struct PreparedWatermark {
    config: WatermarkConfig,
    mark: Mark,
}

impl std::fmt::Debug for PreparedWatermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.mark {
            Mark::Text { .. } => "text",
            Mark::Image { .. } => "image",
        };
        f.debug_struct("PreparedWatermark")
            .field("kind", &kind)
            .field("config", &self.config)
            .finish()
    }
}

impl PreparedWatermark {
    /// Load the assets a configuration needs
    ///
    /// Returns `Ok(None)` when the watermark would not change any pixel
    /// (disabled, zero opacity, or empty text).
    pub fn prepare(config: &WatermarkConfig) -> Result<Option<Self>> {
        if !config.is_active() {
            return Ok(None);
        }

        let mark = match &config.source {
            WatermarkSource::Text(text) => Mark::Text {
                font: load_font(text.font.as_deref())?,
                style: text.clone(),
            },
            WatermarkSource::Image(image) => {
                if !image.path.is_file() {
                    return Err(Error::WatermarkAsset(format!(
                        "watermark image not found: {}",
                        image.path.display()
                    )));
                }
                let decoded = image::open(&image.path).map_err(|e| {
                    Error::WatermarkAsset(format!(
                        "cannot decode watermark image {}: {}",
                        image.path.display(),
                        e
                    ))
                })?;
                Mark::Image {
                    image: decoded.to_rgba8(),
                    scale_pct: image.scale_pct,
                }
            }
        };

        Ok(Some(Self {
            config: config.clone(),
            mark,
        }))
    }

    /// The configuration this watermark was prepared from
    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// Render the mark for a page `page_width` pixels wide
    pub fn mark_for_width(&self, page_width: u32) -> RgbaImage {
        match &self.mark {
            Mark::Text { font, style } => {
                render_text(font, style.text.trim(), font_px(style, page_width), style.color)
            }
            Mark::Image { image, scale_pct } => {
                let width = ((page_width as f32 * scale_pct / 100.0).round() as u32).max(1);
                let height = ((image.height() as f32 * width as f32 / image.width().max(1) as f32)
                    .round() as u32)
                    .max(1);
                image::imageops::resize(image, width, height, FilterType::Lanczos3)
            }
        }
    }

    /// Padding in pixels around `mark`, rendered for a page `page_width` wide
    ///
    /// Relative padding is a share of the font size for text and of the
    /// scaled image height for images.
    pub fn padding_px(&self, page_width: u32, mark: &RgbaImage) -> u32 {
        let basis = match &self.mark {
            Mark::Text { style, .. } => font_px(style, page_width) as u32,
            Mark::Image { .. } => mark.height(),
        };
        self.config.padding.resolve(basis)
    }

    /// Build the full-page watermark layer for a `width` x `height` page
    ///
    /// The layer is transparent except for the marks; opacity is not applied.
    pub fn render_layer(&self, width: u32, height: u32) -> RgbaImage {
        let page = Size::new(width, height);
        let mark = self.mark_for_width(width);
        let mark_size = Size::new(mark.width(), mark.height());
        let padding = self.padding_px(width, &mark);

        let rotation = self.config.rotation;
        let layer_size = layout::layer_size(page, rotation);
        let mut layer = RgbaImage::new(layer_size.width, layer_size.height);

        match self.config.tiling {
            Tiling::Tiled => {
                for (x, y) in layout::tile_positions(layer_size, mark_size, padding) {
                    paste(&mut layer, &mark, x, y);
                }
            }
            Tiling::Single => {
                // Anchor relative to the page, which sits centred in the layer
                let (x, y) = layout::anchor_position(self.config.placement, page, mark_size, padding);
                let offset_x = ((layer_size.width - width) / 2) as i32;
                let offset_y = ((layer_size.height - height) / 2) as i32;
                paste(&mut layer, &mark, x.saturating_add(offset_x), y.saturating_add(offset_y));
            }
        }

        if layout::is_upright(rotation) {
            layer
        } else {
            rotate_into(&layer, rotation, width, height)
        }
    }

    /// Composite the watermark onto a page raster
    pub fn apply(&self, page: &mut RgbaImage) {
        let layer = self.render_layer(page.width(), page.height());
        blend_layer(page, &layer, self.config.opacity);
    }

    /// Watermark layer with opacity baked into its alpha, for stamping over
    /// vector pages
    pub fn overlay(&self, width: u32, height: u32) -> RgbaImage {
        let mut layer = self.render_layer(width, height);
        scale_alpha(&mut layer, self.config.opacity);
        layer
    }
}

fn font_px(style: &TextMark, page_width: u32) -> f32 {
    (page_width as f32 * style.size_pct / 100.0)
        .floor()
        .max(MIN_FONT_PX)
}
