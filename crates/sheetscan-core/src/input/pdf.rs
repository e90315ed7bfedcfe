//! Page images embedded in scanned PDFs, via lopdf.
//!
//! Only documents that carry the scan as an image XObject are supported;
//! vector-only pages have nothing to OCR here.

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::InputError;

/// Decode the largest image drawn on the first page.
pub fn first_page_image(data: &[u8]) -> Result<DynamicImage, InputError> {
    let mut doc = Document::load_mem(data).map_err(|e| InputError::Pdf(e.to_string()))?;
    if doc.is_encrypted() && doc.decrypt("").is_err() {
        return Err(InputError::Pdf("document is encrypted".to_string()));
    }

    let pages = doc.get_pages();
    let (_, &page_id) = pages
        .iter()
        .next()
        .ok_or_else(|| InputError::Pdf("document has no pages".to_string()))?;

    let mut images: Vec<DynamicImage> = page_xobjects(&doc, page_id)
        .into_iter()
        .filter_map(|obj| decode_image_object(&doc, obj))
        .collect();

    if images.is_empty() {
        debug!("No XObject image on page 1, scanning all objects");
        images = doc
            .objects
            .values()
            .filter_map(|obj| decode_image_object(&doc, obj))
            .collect();
    }

    images
        .into_iter()
        .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
        .ok_or_else(|| InputError::Pdf("no decodable page image (vector-only PDF?)".to_string()))
}

fn page_xobjects(doc: &Document, page_id: ObjectId) -> Vec<&Object> {
    let Some(resources) = resources_of(doc, page_id) else {
        return Vec::new();
    };
    let Ok(xobjects) = resources.get(b"XObject") else {
        return Vec::new();
    };
    match doc.dereference(xobjects) {
        Ok((_, Object::Dictionary(dict))) => dict
            .iter()
            .filter_map(|(_, r)| doc.dereference(r).ok().map(|(_, obj)| obj))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resources of a page node, walking up `Parent` for inherited ones.
fn resources_of(doc: &Document, node_id: ObjectId) -> Option<&Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };
    if let Ok(res) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(res) {
            return Some(res_dict);
        }
    }
    match dict.get(b"Parent") {
        Ok(Object::Reference(parent)) => resources_of(doc, *parent),
        _ => None,
    }
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Image object {}x{}", width, height);

    let filter = dict.get(b"Filter").ok().and_then(|f| match f {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
        _ => None,
    });

    match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Skipping image with unsupported filter");
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let color_space: &[u8] = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    raw_to_image(data, width, height, color_space)
}

fn raw_to_image(mut data: Vec<u8>, width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = width as usize * height as usize;
    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            data.truncate(pixels * 3);
            RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            data.truncate(pixels);
            GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
        }
        _ => {
            trace!("Unsupported raw image layout ({} bytes)", data.len());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_gray_and_rgb() {
        let gray = raw_to_image(vec![10; 6], 3, 2, b"DeviceGray").unwrap();
        assert_eq!((gray.width(), gray.height()), (3, 2));

        let rgb = raw_to_image(vec![10; 18 + 4], 3, 2, b"DeviceRGB").unwrap();
        assert_eq!(rgb.to_rgb8().get_pixel(2, 1).0, [10, 10, 10]);

        assert!(raw_to_image(vec![0; 5], 3, 2, b"DeviceGray").is_none());
        assert!(raw_to_image(vec![0; 100], 3, 2, b"DeviceCMYK").is_none());
    }

    #[test]
    fn test_garbage_is_pdf_error() {
        assert!(matches!(first_page_image(b"%PDF-garbage"), Err(InputError::Pdf(_))));
    }
}
