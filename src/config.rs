//! Per-run configuration
//!
//! Configuration values are plain data built by the caller (the CLI) before a
//! run starts. [`crate::batch::BatchJob::new`] validates them once; after that
//! they are only read.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lowest accepted rendering resolution (a quarter of 72 dpi)
pub const MIN_DPI: u32 = 18;
/// Highest accepted rendering resolution
pub const MAX_DPI: u32 = 1200;
/// Largest absolute padding; no raster side can be longer than this
pub const MAX_PADDING_PX: u32 = 65535;

/// RGB colour of a text watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Light grey used by default
    pub const fn watermark_grey() -> Self {
        Self::new(180, 180, 180)
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse `#rgb` or `#rrggbb` (the leading `#` is optional)
    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(format!("invalid hex colour: {}", s));
        }
        let digit = |part: &str| {
            u8::from_str_radix(part, 16).map_err(|_| format!("invalid hex colour: {}", s))
        };

        match hex.len() {
            3 => {
                let r = digit(&hex[0..1])?;
                let g = digit(&hex[1..2])?;
                let b = digit(&hex[2..3])?;
                Ok(Color::new(r * 17, g * 17, b * 17))
            }
            6 => Ok(Color::new(
                digit(&hex[0..2])?,
                digit(&hex[2..4])?,
                digit(&hex[4..6])?,
            )),
            _ => Err(format!("colour must be #rgb or #rrggbb, got {}", s)),
        }
    }
}

/// Text watermark settings
#[derive(Debug, Clone, PartialEq)]
pub struct TextMark {
    /// Text to draw
    pub text: String,
    /// Font size as a percentage of the page width
    pub size_pct: f32,
    /// Fill colour
    pub color: Color,
    /// TrueType/OpenType font file; a system sans font is used when unset
    pub font: Option<PathBuf>,
}

/// Image watermark settings
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMark {
    /// Image file (PNG, JPEG, WebP, GIF, BMP)
    pub path: PathBuf,
    /// Width of the mark as a percentage of the page width
    pub scale_pct: f32,
}

/// What the watermark is made of
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkSource {
    Text(TextMark),
    Image(ImageMark),
}

/// Single centred-or-anchored mark, or a repeating pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tiling {
    Single,
    Tiled,
}

impl FromStr for Tiling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Tiling::Single),
            "tiled" | "tile" => Ok(Tiling::Tiled),
            _ => Err(format!("tiling must be single or tiled, got {}", s)),
        }
    }
}

/// Gap between tiles, or margin from the page edge in single mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Padding {
    /// Absolute pixels at the rendering resolution
    Pixels(u32),
    /// Percentage of the font size (text) or mark height (image), so it
    /// scales with DPI
    Relative(f32),
}

impl Padding {
    /// Resolve to pixels; `basis` is what relative padding is a share of
    pub fn resolve(&self, basis: u32) -> u32 {
        match *self {
            Padding::Pixels(px) => px,
            Padding::Relative(pct) => (basis as f32 * pct / 100.0).round().max(0.0) as u32,
        }
    }
}

impl FromStr for Padding {
    type Err = String;

    /// Accepts `24px`, `24` (pixels) or `50%` (relative)
    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            return pct
                .trim()
                .parse::<f32>()
                .map(Padding::Relative)
                .map_err(|_| format!("invalid padding: {}", s));
        }
        s.trim_end_matches("px")
            .trim()
            .parse::<u32>()
            .map(Padding::Pixels)
            .map_err(|_| format!("invalid padding: {}", s))
    }
}

/// Nine-grid anchor for single watermarks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let normalized = s.to_ascii_lowercase().replace(['_', ' '], "-");
        let placement = match normalized.as_str() {
            "top-left" | "tl" => Placement::TopLeft,
            "top-center" | "top" | "tc" => Placement::TopCenter,
            "top-right" | "tr" => Placement::TopRight,
            "center-left" | "left" | "cl" => Placement::CenterLeft,
            "center" | "c" => Placement::Center,
            "center-right" | "right" | "cr" => Placement::CenterRight,
            "bottom-left" | "bl" => Placement::BottomLeft,
            "bottom-center" | "bottom" | "bc" => Placement::BottomCenter,
            "bottom-right" | "br" => Placement::BottomRight,
            _ => return Err(format!("unknown placement: {}", s)),
        };
        Ok(placement)
    }
}

/// Watermark configuration, shared by every document of a job
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    pub enabled: bool,
    pub source: WatermarkSource,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f32,
    /// Counter-clockwise rotation of the whole watermark layer, in degrees
    pub rotation: f32,
    pub tiling: Tiling,
    pub padding: Padding,
    /// Anchor used when `tiling` is [`Tiling::Single`]
    pub placement: Placement,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: WatermarkSource::Text(TextMark {
                text: "CONFIDENTIAL".to_string(),
                size_pct: 10.0,
                color: Color::watermark_grey(),
                font: None,
            }),
            opacity: 120.0 / 255.0,
            rotation: 0.0,
            tiling: Tiling::Tiled,
            padding: Padding::Relative(50.0),
            placement: Placement::Center,
        }
    }
}

impl WatermarkConfig {
    /// A configuration that draws nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether compositing would change any pixel
    ///
    /// Zero opacity and empty text both leave pages untouched.
    pub fn is_active(&self) -> bool {
        if !self.enabled || self.opacity <= 0.0 {
            return false;
        }
        match &self.source {
            WatermarkSource::Text(mark) => !mark.text.trim().is_empty(),
            WatermarkSource::Image(_) => true,
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::InvalidConfig(format!(
                "opacity must be between 0.0 and 1.0, got {}",
                self.opacity
            )));
        }
        if !self.rotation.is_finite() {
            return Err(Error::InvalidConfig("rotation must be a finite angle".to_string()));
        }
        match self.padding {
            Padding::Relative(pct) if !(0.0..=1000.0).contains(&pct) => {
                return Err(Error::InvalidConfig(format!(
                    "relative padding must be between 0% and 1000%, got {}%",
                    pct
                )));
            }
            Padding::Pixels(px) if px > MAX_PADDING_PX => {
                return Err(Error::InvalidConfig(format!(
                    "padding must be at most {}px, got {}px",
                    MAX_PADDING_PX, px
                )));
            }
            _ => {}
        }
        let size = match &self.source {
            WatermarkSource::Text(mark) => mark.size_pct,
            WatermarkSource::Image(mark) => mark.scale_pct,
        };
        if !(size > 0.0 && size <= 100.0) {
            return Err(Error::InvalidConfig(format!(
                "watermark size must be in (0, 100] percent of page width, got {}",
                size
            )));
        }
        Ok(())
    }
}

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    /// Whether each page becomes its own file
    pub fn is_per_page(&self) -> bool {
        !matches!(self, OutputFormat::Pdf)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(Error::UnsupportedFormat(format!(
                "{} (expected pdf, png or jpeg)",
                other
            ))
            .to_string()),
        }
    }
}

/// PNG deflate effort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

impl FromStr for PngCompression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PngCompression::Fast),
            "default" => Ok(PngCompression::Default),
            "best" => Ok(PngCompression::Best),
            _ => Err(format!("png compression must be fast, default or best, got {}", s)),
        }
    }
}

/// Export configuration, shared by every document of a job
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub format: OutputFormat,
    /// Rasterization resolution
    pub dpi: u32,
    /// JPEG quality (1-100) for JPEG files and for page images inside PDF output
    pub quality: u8,
    pub png_compression: PngCompression,
    /// Rasterize pages; when false, PDF output keeps vector content and the
    /// watermark is stamped on top
    pub flatten: bool,
    /// Replace existing files instead of picking a free name
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pdf,
            dpi: 150,
            quality: 85,
            png_compression: PngCompression::Default,
            flatten: true,
            overwrite: false,
        }
    }
}

impl ExportConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return Err(Error::InvalidConfig(format!(
                "dpi must be between {} and {}, got {}",
                MIN_DPI, MAX_DPI, self.dpi
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(Error::InvalidConfig(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        Ok(())
    }

    /// Image exports are always raster, whatever `flatten` says
    pub fn rasterizes(&self) -> bool {
        self.flatten || self.format.is_per_page()
    }
}
