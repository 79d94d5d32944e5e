//! Building image-only PDFs from flattened pages

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// A flattened page ready to be placed in a PDF
#[derive(Debug, Clone)]
pub struct JpegPage {
    /// Baseline JPEG data
    pub data: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    /// Page size in points
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Assemble a PDF with one full-page JPEG image per page
///
/// Object layout follows the usual catalog -> pages -> page chain. Nothing
/// time- or randomness-dependent is written, so equal input gives equal bytes.
pub fn build_image_pdf(pages: &[JpegPage]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let page_id = add_jpeg_page(&mut doc, pages_id, page);
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => pages.len() as i64,
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    // Content streams get Flate; the JPEG streams opt out
    doc.compress();
    doc
}

fn add_jpeg_page(doc: &mut Document, pages_id: ObjectId, page: &JpegPage) -> ObjectId {
    let image = Stream {
        dict: dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => page.width_px as i64,
            "Height" => page.height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
            "Length" => page.data.len() as i64,
        },
        content: page.data.clone(),
        allows_compression: false,
        start_position: None,
    };
    let image_id = doc.add_object(Object::Stream(image));

    let draw = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", page.width_pt, page.height_pt);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), draw.into_bytes()));

    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page.width_pt),
            Object::Real(page.height_pt),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    })
}
