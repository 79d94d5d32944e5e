//! Page boxes and inherited page attributes

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Deepest page tree we follow when looking up inherited attributes
const MAX_TREE_DEPTH: usize = 32;

/// A page's MediaBox in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    /// US Letter (8.5" x 11"), used when a page declares no MediaBox
    pub fn letter() -> Self {
        Self {
            left: 0.0,
            bottom: 0.0,
            width: 612.0,
            height: 792.0,
        }
    }

    /// Build from a `[x0 y0 x1 y1]` rectangle in any corner order
    pub fn from_rect(rect: [f32; 4]) -> Self {
        let [x0, y0, x1, y1] = rect;
        Self {
            left: x0.min(x1),
            bottom: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }
}

/// Follow a reference to the object it points to
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Numeric value of an Integer or Real object
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Look up `key` on a page, walking up the page tree for inheritable entries
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        current = parent_of(doc, current)?;
    }

    None
}

fn parent_of<'a>(doc: &'a Document, dict: &Dictionary) -> Option<&'a Dictionary> {
    match dict.get(b"Parent").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

/// The page's MediaBox, inherited if necessary, or US Letter if absent or malformed
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let rect = inherited(doc, page_id, b"MediaBox").and_then(|object| match object {
        Object::Array(items) if items.len() == 4 => {
            let values: Vec<f32> = items
                .iter()
                .filter_map(|item| resolve(doc, item).and_then(number))
                .collect();
            match values.as_slice() {
                [x0, y0, x1, y1] => Some([*x0, *y0, *x1, *y1]),
                _ => None,
            }
        }
        _ => None,
    });

    match rect.map(PageBox::from_rect) {
        Some(page) if page.width > 0.0 && page.height > 0.0 => page,
        _ => PageBox::letter(),
    }
}

/// The page's resources dictionary, following references and inheritance
///
/// Returns a copy so callers can extend it and store it on the page itself.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}
