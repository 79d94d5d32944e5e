//! PDF manipulation module

pub mod build;
pub mod geometry;
pub mod metadata;
pub mod stamp;

// Re-export commonly used items
pub use build::{build_image_pdf, JpegPage};
pub use geometry::{page_box, PageBox};
pub use metadata::{count_pages, extract_metadata, load_document, PdfMetadata};
pub use stamp::stamp_overlay;
