//! Bringing an input image to a template's canonical resolution.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::template::GridSpec;

/// An image resampled to a template's canonical size.
#[derive(Debug, Clone)]
pub struct AlignedImage(DynamicImage);

impl AlignedImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    pub fn into_inner(self) -> DynamicImage {
        self.0
    }
}

/// Maps an input image onto template coordinates.
///
/// `reference` is a sample of the blank form; registration-based aligners
/// use it to correct rotation and perspective. Implementations that cannot
/// register an image must still return one at the canonical size.
pub trait Aligner {
    fn align(&self, image: &DynamicImage, reference: Option<&DynamicImage>) -> AlignedImage;
}

/// Stretches the input to exactly the canonical size, ignoring aspect ratio.
///
/// No skew or perspective correction is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeAligner {
    width: u32,
    height: u32,
}

impl ResizeAligner {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn for_spec(spec: &GridSpec) -> Self {
        Self::new(spec.width, spec.height)
    }
}

impl Aligner for ResizeAligner {
    fn align(&self, image: &DynamicImage, _reference: Option<&DynamicImage>) -> AlignedImage {
        if image.width() == self.width && image.height() == self.height {
            return AlignedImage(image.clone());
        }
        debug!(
            "Aligning {}x{} -> {}x{}",
            image.width(),
            image.height(),
            self.width,
            self.height
        );
        AlignedImage(image.resize_exact(self.width, self.height, FilterType::Triangle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_ignores_aspect_ratio() {
        let aligner = ResizeAligner::new(1280, 720);
        let aligned = aligner.align(&DynamicImage::new_rgb8(300, 400), None);
        assert_eq!((aligned.width(), aligned.height()), (1280, 720));
    }

    #[test]
    fn test_for_spec_uses_canonical_size() {
        let spec = GridSpec::builtin_default();
        let aligned = ResizeAligner::for_spec(&spec).align(&DynamicImage::new_luma8(64, 64), None);
        assert_eq!((aligned.width(), aligned.height()), (spec.width, spec.height));
    }
}
