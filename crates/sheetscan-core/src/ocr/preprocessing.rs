//! Per-cell image cleanup before OCR.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use tracing::trace;

use crate::error::OcrError;
use crate::models::config::GridConfig;

/// Grayscale, smooth, binarize and upscale a single cell crop.
///
/// Small isolated crops are where recognition fails most, so the output is
/// never smaller than `min_cell_side` on either axis.
#[derive(Debug, Clone)]
pub struct CellPreprocessor {
    blur_sigma: f32,
    block_size: u32,
    offset: i32,
    min_side: u32,
}

impl CellPreprocessor {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            block_size: config.threshold_block.max(3) | 1,
            offset: config.threshold_offset,
            min_side: config.min_cell_side,
        }
    }

    pub fn prepare(&self, image: &DynamicImage) -> Result<DynamicImage, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImage(format!(
                "empty crop {}x{}",
                image.width(),
                image.height()
            )));
        }

        let gray = image.to_luma8();
        let smoothed = if self.blur_sigma > 0.0 {
            imageops::blur(&gray, self.blur_sigma)
        } else {
            gray
        };
        let binary = adaptive_threshold(&smoothed, self.block_size, self.offset);

        Ok(DynamicImage::ImageLuma8(self.upscale_small(binary)))
    }

    fn upscale_small(&self, image: GrayImage) -> GrayImage {
        let (w, h) = image.dimensions();
        if w >= self.min_side && h >= self.min_side {
            return image;
        }
        let (new_w, new_h) = upscaled_size(w, h, self.min_side);
        trace!("Upscaling cell {}x{} -> {}x{}", w, h, new_w, new_h);
        imageops::resize(&image, new_w, new_h, FilterType::CatmullRom)
    }
}

/// Size with the short side raised to `min_side`, aspect ratio kept.
pub(crate) fn upscaled_size(w: u32, h: u32, min_side: u32) -> (u32, u32) {
    let scale = (min_side as f32 / w as f32).max(min_side as f32 / h as f32);
    (
        ((w as f32 * scale).round() as u32).max(min_side),
        ((h as f32 * scale).round() as u32).max(min_side),
    )
}

/// Mean adaptive threshold: a pixel is background (255) when it is brighter
/// than its local mean minus `offset`, otherwise ink (0).
pub(crate) fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);

    // Summed-area table with a zero row and column.
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * (w + 1) + x + 1] = integral[y * (w + 1) + x + 1] + row_sum;
        }
    }

    let half = (block_size / 2) as usize;
    let mut result = GrayImage::new(width, height);
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(half), (y + half + 1).min(h));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(half), (x + half + 1).min(w));
            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let count = ((y1 - y0) * (x1 - x0)) as u64;
            let threshold = (sum / count) as i32 - offset;

            let value = image.get_pixel(x as u32, y as u32)[0] as i32;
            let out = if value > threshold { 255 } else { 0 };
            result.put_pixel(x as u32, y as u32, Luma([out]));
        }
    }

    result
}
