//! Cropping template cells out of an aligned image.

use image::DynamicImage;
use tracing::trace;

use super::aligner::AlignedImage;
use crate::template::{Cell, GridSpec};

/// Half-open pixel rectangle `[x1, x2) x [y1, y2)` inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelBounds {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Pixel bounds of a cell, grown by `pad` on every side and clamped to the image.
///
/// Always satisfies `0 <= x1 <= x2 <= width` and `0 <= y1 <= y2 <= height`.
pub fn pixel_bounds(cell: &Cell, normalized: bool, width: u32, height: u32, pad: u32) -> PixelBounds {
    let (sx, sy) = if normalized {
        (width as f64, height as f64)
    } else {
        (1.0, 1.0)
    };
    let pad = i64::from(pad);

    // `as` truncates toward zero and maps NaN to 0, like an int() cast.
    let x1 = ((cell.x * sx) as i64).saturating_sub(pad);
    let y1 = ((cell.y * sy) as i64).saturating_sub(pad);
    let x2 = (((cell.x + cell.w) * sx) as i64).saturating_add(pad);
    let y2 = (((cell.y + cell.h) * sy) as i64).saturating_add(pad);

    let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max)) as u32;
    let (x1, x2) = (clamp(x1, width), clamp(x2, width));
    let (y1, y2) = (clamp(y1, height), clamp(y2, height));

    PixelBounds {
        x1,
        y1,
        x2: x2.max(x1),
        y2: y2.max(y1),
    }
}

/// One template cell and its padded crop.
#[derive(Debug, Clone)]
pub struct CellCrop<'a> {
    pub cell: &'a Cell,
    pub bounds: PixelBounds,
    pub image: DynamicImage,
}

/// Crops every declared cell of a template.
#[derive(Debug, Clone, Copy)]
pub struct GridExtractor<'a> {
    spec: &'a GridSpec,
    pad: u32,
}

impl<'a> GridExtractor<'a> {
    pub fn new(spec: &'a GridSpec, pad: u32) -> Self {
        Self { spec, pad }
    }

    /// Crops in template declaration order. Zero-area crops are left out.
    pub fn crop_cells(&self, aligned: &AlignedImage) -> Vec<CellCrop<'a>> {
        let crops: Vec<CellCrop<'a>> = self
            .spec
            .cells
            .iter()
            .filter_map(|cell| {
                let bounds = self.bounds(aligned, cell);
                if bounds.is_empty() {
                    trace!("Cell ({}, {}) falls outside the image", cell.row, cell.col);
                    return None;
                }
                Some(CellCrop {
                    cell,
                    bounds,
                    image: crop(aligned, bounds),
                })
            })
            .collect();

        trace!("Cropped {} of {} cells", crops.len(), self.spec.cells.len());
        crops
    }

    /// Crop a single cell, or `None` when it has no area inside the image.
    pub fn extract_single_cell(&self, aligned: &AlignedImage, cell: &Cell) -> Option<DynamicImage> {
        let bounds = self.bounds(aligned, cell);
        (!bounds.is_empty()).then(|| crop(aligned, bounds))
    }

    fn bounds(&self, aligned: &AlignedImage, cell: &Cell) -> PixelBounds {
        pixel_bounds(cell, self.spec.normalized, aligned.width(), aligned.height(), self.pad)
    }
}

fn crop(aligned: &AlignedImage, b: PixelBounds) -> DynamicImage {
    aligned.image().crop_imm(b.x1, b.y1, b.width(), b.height())
}
