//! Error types for the PDF flattener library

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF flattener library
#[derive(Error, Debug)]
pub enum Error {
    /// Input is missing, unreadable, corrupt or has no pages
    #[error("cannot open {}: {reason}", .path.display())]
    FileOpen { path: PathBuf, reason: String },

    /// Requested export format cannot represent the content
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Destination could not be written
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Watermark image or font is missing or invalid
    #[error("watermark asset error: {0}")]
    WatermarkAsset(String),

    /// PDFium binding or page rendering failed
    #[error("render error: {0}")]
    Render(String),

    /// Configuration rejected before the run starts
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Image codec error while producing output
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Input file does not exist
    pub fn not_found(path: &Path) -> Self {
        Error::FileOpen {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        }
    }

    /// Input file exists but could not be opened or parsed
    pub fn open(path: &Path, reason: impl fmt::Display) -> Self {
        Error::FileOpen {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Destination write failed
    pub fn write(path: &Path, source: std::io::Error) -> Self {
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classify this error into the user-facing failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::FileOpen { .. } | Error::Pdf(_) => FailureKind::FileOpen,
            Error::UnsupportedFormat(_) | Error::InvalidConfig(_) | Error::Image(_) => {
                FailureKind::UnsupportedFormat
            }
            Error::Write { .. } | Error::Io(_) => FailureKind::Write,
            Error::WatermarkAsset(_) => FailureKind::WatermarkAsset,
            Error::Render(_) => FailureKind::Render,
        }
    }
}

/// Category of a per-document failure, as shown next to each file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    FileOpen,
    UnsupportedFormat,
    Write,
    WatermarkAsset,
    Render,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::FileOpen => "open failed",
            FailureKind::UnsupportedFormat => "unsupported format",
            FailureKind::Write => "write failed",
            FailureKind::WatermarkAsset => "watermark asset",
            FailureKind::Render => "render failed",
        };
        f.write_str(label)
    }
}
