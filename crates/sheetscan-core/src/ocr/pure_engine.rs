//! OCR backend using `pure-onnx-ocr` (PaddleOCR det + rec, no system ONNX Runtime).

use image::DynamicImage;
use tracing::{debug, info, warn};

use sheetscan_inference::OrtBackend;

use super::classifier::AngleClassifier;
use super::{OcrBackend, RecognizeOptions, TextBox};
use crate::error::OcrError;
use crate::models::config::{ModelConfig, OcrConfig};

/// PaddleOCR detection and recognition for one language family.
pub struct PureOcrBackend {
    engine: pure_onnx_ocr::engine::OcrEngine,
    classifier: Option<AngleClassifier<OrtBackend>>,
    family: String,
    min_confidence: f32,
    keep_unknown: bool,
}

impl PureOcrBackend {
    /// Load det/rec/dictionary for `ocr.language` from the model directory.
    ///
    /// The angle classifier is optional: when `cls.onnx` is missing or fails
    /// to load, recognition proceeds without orientation correction.
    pub fn from_models(models: &ModelConfig, ocr: &OcrConfig) -> Result<Self, OcrError> {
        let det_path = models.detection_path();
        let rec_path = models.recognition_path(&ocr.language);
        let dict_path = models.dictionary_path(&ocr.language);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!("missing model file {}", path.display())));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        let classifier = if ocr.classify_angle {
            let cls_path = models.classification_path();
            match OrtBackend::from_file(&cls_path) {
                Ok(backend) => Some(AngleClassifier::new(backend)),
                Err(e) => {
                    warn!("Angle classifier unavailable ({}): {}", cls_path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let family = ModelConfig::language_family(&ocr.language);
        info!(
            "Loaded OCR models for '{}' from {} (angle classifier: {})",
            family,
            models.model_dir.display(),
            classifier.is_some()
        );

        Ok(Self {
            engine,
            classifier,
            family,
            min_confidence: ocr.min_confidence,
            keep_unknown: ocr.keep_unknown,
        })
    }
}

impl OcrBackend for PureOcrBackend {
    fn recognize(&self, image: &DynamicImage, options: &RecognizeOptions) -> Result<Vec<TextBox>, OcrError> {
        check_family(&options.language, &self.family)?;

        let oriented;
        let input = match (&self.classifier, options.classify_angle) {
            (Some(classifier), true) => {
                oriented = classifier.auto_rotate(image.clone())?;
                &oriented
            }
            _ => image,
        };

        let results = self
            .engine
            .run_from_image(input)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        let boxes: Vec<TextBox> = results
            .iter()
            .filter(|r| r.confidence >= self.min_confidence)
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: if self.keep_unknown {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ").trim().to_string()
                },
                confidence: r.confidence,
            })
            .filter(|b| !b.text.is_empty())
            .collect();

        debug!("pure-onnx-ocr: {} of {} regions kept", boxes.len(), results.len());
        Ok(boxes)
    }

    fn name(&self) -> &str {
        "pure-onnx-ocr"
    }
}

/// Recognition models only read the script they were trained on.
fn check_family(language: &str, loaded: &str) -> Result<(), OcrError> {
    let requested = ModelConfig::language_family(language);
    if requested != loaded {
        return Err(OcrError::Unavailable(format!(
            "language '{}' needs '{}' models but '{}' models are loaded",
            language, requested, loaded
        )));
    }
    Ok(())
}

/// First four exterior points of the detection polygon.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_family() {
        assert!(check_family("es", "latin").is_ok());
        assert!(check_family("PT", "latin").is_ok());
        assert!(check_family("", "en").is_ok());
        assert!(matches!(check_family("en", "latin"), Err(OcrError::Unavailable(_))));
        assert!(matches!(check_family("ja", "latin"), Err(OcrError::Unavailable(_))));
    }
}
