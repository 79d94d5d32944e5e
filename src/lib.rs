//! PDF Flattener Library
//!
//! A cross-platform library for flattening and watermarking PDF documents in
//! batches. This library provides functionality to:
//! - Rasterize PDF pages (forms and annotations included) through PDFium
//! - Composite text or image watermarks with opacity, rotation and tiling
//! - Export the result as an image-only PDF or as PNG/JPEG page images
//! - Stamp a watermark over vector pages without flattening them
//! - Process many documents sequentially or on a bounded worker pool
//!
//! # Example
//!
//! ```no_run
//! use pdf_flattener::batch::{BatchJob, BatchProcessor};
//! use pdf_flattener::config::{ExportConfig, WatermarkConfig};
//! use pdf_flattener::render::PdfiumRasterizer;
//! use std::path::PathBuf;
//!
//! let job = BatchJob::new(
//!     vec![PathBuf::from("report.pdf"), PathBuf::from("invoice.pdf")],
//!     WatermarkConfig::default(),
//!     ExportConfig::default(),
//!     "flattened",
//! )
//! .expect("invalid configuration");
//!
//! let processor = BatchProcessor::new(PdfiumRasterizer::system());
//! for result in processor.process(&job) {
//!     println!("{}: {:?}", result.input.display(), result.outcome);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod pdf;
pub mod progress;
pub mod render;
pub mod watermark;

// Re-export commonly used items
pub use batch::{BatchJob, BatchProcessor, DocumentResult, Outcome};
pub use config::{ExportConfig, OutputFormat, WatermarkConfig};
pub use error::{Error, FailureKind, Result};
pub use render::{PdfiumRasterizer, Rasterizer, RenderedPage};
