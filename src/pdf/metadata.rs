//! PDF metadata extraction

use std::path::Path;
use lopdf::{Document, Object};
use crate::error::{Error, Result};
use super::geometry::{page_box, resolve, PageBox};

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> Option<usize> {
    let catalog = match doc.trailer.get(b"Root").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        _ => return None,
    };

    let pages = match catalog.get(b"Pages").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        _ => return None,
    };

    match pages.get(b"Count").ok()? {
        Object::Integer(n) if *n >= 0 => Some(*n as usize),
        _ => None,
    }
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// MediaBox of each page, in page order
    pub page_boxes: Vec<PageBox>,
}

/// Load a PDF, mapping every failure to a per-file open error
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(Error::not_found(path));
    }
    Document::load(path).map_err(|e| Error::open(path, e))
}

/// Read an Info dictionary text entry
fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = resolve(doc, doc.trailer.get(b"Info").ok()?)?;
    let Object::Dictionary(info) = info else {
        return None;
    };
    let bytes = resolve(doc, info.get(key).ok()?)?.as_str().ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    let doc = load_document(path)?;

    let pages = doc.get_pages();
    // Prefer the catalog count, fall back to walking the tree
    let page_count = count_pages_from_catalog(&doc).unwrap_or(pages.len());

    if page_count == 0 {
        return Err(Error::open(path, "document has no pages"));
    }

    let page_boxes = pages.values().map(|id| page_box(&doc, *id)).collect();

    Ok(PdfMetadata {
        page_count,
        title: info_string(&doc, b"Title"),
        author: info_string(&doc, b"Author"),
        page_boxes,
    })
}

/// Count the number of pages in a PDF file
///
/// This is a quick operation that reads the Count field from the Pages dictionary.
pub fn count_pages(path: &Path) -> Result<usize> {
    let doc = load_document(path)?;
    let page_count = count_pages_from_catalog(&doc).unwrap_or_else(|| doc.get_pages().len());

    if page_count == 0 {
        return Err(Error::open(path, "document has no pages"));
    }

    Ok(page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result, Err(Error::FileOpen { ref reason, .. }) if reason == "file not found"));
    }

    #[test]
    fn test_extract_metadata_nonexistent_file() {
        let result = extract_metadata(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileOpen { .. }));
    }

    #[test]
    fn test_corrupt_file_is_open_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.5\nthis is not really a pdf").unwrap();

        let err = count_pages(&path).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }), "got {:?}", err);
    }

    // Metadata of generated PDFs is covered in tests/
}
