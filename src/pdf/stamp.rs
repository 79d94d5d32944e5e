//! Stamping a raster watermark over vector PDF pages
//!
//! The original page content is kept. Each page gets:
//! - its existing content streams wrapped in `q`/`Q`, so transformations
//!   left active by the page cannot move the stamp
//! - an image XObject (RGB samples plus a soft mask carrying the alpha)
//! - a trailing content stream that draws the image over the MediaBox

use std::collections::HashMap;

use image::RgbaImage;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::Result;
use crate::export::encode::check_size;
use crate::render::points_to_pixels;
use super::geometry::{page_box, page_resources, PageBox};

/// Resource name of the stamped watermark image
pub const STAMP_NAME: &str = "PdfFlattenerWatermark";

/// Stamp every page of `doc` with an overlay rendered by `render`
///
/// `render` receives the overlay size in pixels (the page's MediaBox at
/// `dpi`) and returns an RGBA image of that size. Pages of the same size share
/// one image object. Returns the number of pages stamped.
///
/// Every page size is checked before `render` is first called; a page too
/// large for a raster leaves `doc` unchanged.
pub fn stamp_overlay<F>(doc: &mut Document, dpi: u32, mut render: F) -> Result<usize>
where
    F: FnMut(u32, u32) -> RgbaImage,
{
    let mut pages = Vec::new();
    for page_id in doc.get_pages().into_values() {
        let page = page_box(doc, page_id);
        let size = (points_to_pixels(page.width, dpi), points_to_pixels(page.height, dpi));
        check_size(size.0, size.1)?;
        pages.push((page_id, page, size));
    }
    let mut images: HashMap<(u32, u32), ObjectId> = HashMap::new();

    for &(page_id, ref page, size) in &pages {
        let image_id = match images.get(&size) {
            Some(id) => *id,
            None => {
                let overlay = render(size.0, size.1);
                let id = add_rgba_image(doc, &overlay);
                images.insert(size, id);
                id
            }
        };

        isolate_page_content(doc, page_id)?;
        add_xobject_to_page_resources(doc, page_id, image_id)?;

        let draw = stamp_content(page);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), draw.into_bytes()));
        append_content_to_page(doc, page_id, content_id)?;
    }

    debug!(pages = pages.len(), images = images.len(), "stamped watermark overlay");
    Ok(pages.len())
}

/// Content stream drawing the stamp over the whole page box
fn stamp_content(page: &PageBox) -> String {
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        page.width, page.height, page.left, page.bottom, STAMP_NAME
    )
}

/// Add an RGBA raster as an RGB image XObject with an alpha soft mask
fn add_rgba_image(doc: &mut Document, image: &RgbaImage) -> ObjectId {
    let (width, height) = image.dimensions();
    let pixels = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let mask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    ));

    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => mask_id,
        },
        rgb,
    ))
}

/// Wrap the page's existing content streams in a q/Q pair
///
/// Adds two tiny streams around the existing ones instead of rewriting them,
/// so binary or compressed content is never touched.
fn isolate_page_content(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let page_dict = doc.get_dictionary_mut(page_id)?;
    let mut contents = match page_dict.get(b"Contents").ok().cloned() {
        Some(Object::Reference(id)) => vec![Object::Reference(id)],
        Some(Object::Array(items)) => items,
        _ => Vec::new(),
    };

    contents.insert(0, Object::Reference(save_id));
    contents.push(Object::Reference(restore_id));
    page_dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// Add the stamp XObject to the page's Resources dictionary
///
/// Inherited or referenced resources are copied onto the page so the page
/// keeps access to its fonts and images after the change.
fn add_xobject_to_page_resources(doc: &mut Document, page_id: ObjectId, xobject_id: ObjectId) -> Result<()> {
    let mut resources = page_resources(doc, page_id);

    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    };
    xobjects.set(STAMP_NAME, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// Append a content stream to a page's Contents
///
/// We append our content after the original content so the watermark is
/// drawn on top (not covered by background fills).
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let page_dict = doc.get_dictionary_mut(page_id)?;

    match page_dict.get(b"Contents").ok().cloned() {
        Some(Object::Reference(content_id)) => {
            page_dict.set(
                "Contents",
                Object::Array(vec![
                    Object::Reference(content_id),
                    Object::Reference(new_content_id),
                ]),
            );
        }
        Some(Object::Array(mut content_array)) => {
            content_array.push(Object::Reference(new_content_id));
            page_dict.set("Contents", Object::Array(content_array));
        }
        _ => {
            page_dict.set("Contents", Object::Array(vec![Object::Reference(new_content_id)]));
        }
    }

    Ok(())
}
