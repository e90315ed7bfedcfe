//! Upside-down text detection for cell crops (PaddleOCR `cls` model).

use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::Array4;
use tracing::debug;

use crate::error::OcrError;
use sheetscan_inference::{InferenceBackend, InputTensor};

const INPUT_WIDTH: u32 = 192;
const INPUT_HEIGHT: u32 = 48;

/// Two-class orientation classifier: 0° or 180°.
pub struct AngleClassifier<B: InferenceBackend> {
    backend: B,
    threshold: f32,
}

impl<B: InferenceBackend> AngleClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            threshold: 0.9,
        }
    }

    /// Minimum 180° probability before a crop is flipped.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns (angle, confidence) where angle is 0 or 180.
    pub fn classify(&self, image: &DynamicImage) -> Result<(i32, f32), OcrError> {
        let input = InputTensor::Float32(to_tensor(image).into_dyn());
        let outputs = self.backend.run(&[(self.backend.primary_input(), input)])?;

        let (_, output) = outputs
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Recognition("no output from angle classifier".to_string()))?;
        let probs: Vec<f32> = output
            .as_f32()
            .ok_or_else(|| OcrError::Recognition("angle classifier returned non-float output".to_string()))?
            .iter()
            .copied()
            .collect();

        let result = match probs.as_slice() {
            [up, down, ..] if down > up => (180, *down),
            [up, _, ..] => (0, *up),
            _ => (0, 1.0),
        };
        debug!("Classified angle: {}° (confidence: {:.3})", result.0, result.1);
        Ok(result)
    }

    /// Rotate the image by 180° when it is confidently upside down.
    pub fn auto_rotate(&self, image: DynamicImage) -> Result<DynamicImage, OcrError> {
        let (angle, confidence) = self.classify(&image)?;
        if angle == 180 && confidence > self.threshold {
            Ok(image.rotate180())
        } else {
            Ok(image)
        }
    }
}

/// NCHW tensor normalized to [-1, 1].
fn to_tensor(image: &DynamicImage) -> Array4<f32> {
    let rgb = image
        .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 127.5 - 1.0;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};
    use ndarray::{ArrayD, IxDyn};
    use sheetscan_inference::{InferenceError, OutputTensor};

    struct FixedProbs {
        probs: Vec<f32>,
        names: Vec<String>,
    }

    impl FixedProbs {
        fn new(probs: Vec<f32>) -> Self {
            Self {
                probs,
                names: vec!["x".to_string()],
            }
        }
    }

    impl InferenceBackend for FixedProbs {
        fn run(
            &self,
            inputs: &[(&str, InputTensor)],
        ) -> Result<Vec<(String, OutputTensor)>, InferenceError> {
            assert_eq!(inputs[0].1.shape(), &[1, 3, 48, 192]);
            let arr = ArrayD::from_shape_vec(IxDyn(&[1, self.probs.len()]), self.probs.clone()).unwrap();
            Ok(vec![("out".to_string(), OutputTensor::Float32(arr))])
        }

        fn input_names(&self) -> &[String] {
            &self.names
        }

        fn output_names(&self) -> &[String] {
            &self.names
        }
    }

    fn marked_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(20, 10, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_upright_is_kept() {
        let classifier = AngleClassifier::new(FixedProbs::new(vec![0.97, 0.03]));
        assert_eq!(classifier.classify(&marked_image()).unwrap(), (0, 0.97));
        let out = classifier.auto_rotate(marked_image()).unwrap();
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_upside_down_is_rotated() {
        let classifier = AngleClassifier::new(FixedProbs::new(vec![0.02, 0.98]));
        let out = classifier.auto_rotate(marked_image()).unwrap();
        assert_eq!(out.to_luma8().get_pixel(19, 9)[0], 0);
    }

    #[test]
    fn test_low_confidence_flip_is_ignored() {
        let classifier = AngleClassifier::new(FixedProbs::new(vec![0.4, 0.6]));
        let out = classifier.auto_rotate(marked_image()).unwrap();
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 0);
    }
}
