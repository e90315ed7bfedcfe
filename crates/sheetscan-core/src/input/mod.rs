//! Loading the source document as a raster image.

mod pdf;

pub use pdf::first_page_image;

use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::error::InputError;

/// Raster extensions decoded directly by the `image` crate.
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "gif", "webp"];

/// True when `path` has an extension [`load_image`] accepts.
pub fn is_supported(path: &Path) -> bool {
    match extension(path) {
        Some(ext) => ext == "pdf" || RASTER_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Load an image file, or the first embedded page image of a scanned PDF.
pub fn load_image(path: &Path) -> Result<DynamicImage, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    let ext = extension(path).unwrap_or_default();
    let image = if ext == "pdf" {
        let data = std::fs::read(path).map_err(|e| InputError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        first_page_image(&data)?
    } else if RASTER_EXTENSIONS.contains(&ext.as_str()) {
        image::open(path).map_err(|e| InputError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    } else {
        return Err(InputError::UnsupportedFormat(if ext.is_empty() {
            path.display().to_string()
        } else {
            format!(".{}", ext)
        }));
    };

    debug!("Loaded {} ({}x{})", path.display(), image.width(), image.height());
    Ok(image)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
