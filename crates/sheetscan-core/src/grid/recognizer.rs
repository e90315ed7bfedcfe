//! Reading the text of one cell crop.

use std::panic::{catch_unwind, AssertUnwindSafe};

use image::DynamicImage;
use tracing::{trace, warn};

use crate::error::OcrError;
use crate::models::config::GridConfig;
use crate::ocr::{CellPreprocessor, LazyOcr, RecognizeOptions};

/// Preprocesses a crop and runs OCR on it.
#[derive(Debug, Clone)]
pub struct CellRecognizer {
    preprocessor: CellPreprocessor,
    options: RecognizeOptions,
}

impl CellRecognizer {
    pub fn new(config: &GridConfig, options: RecognizeOptions) -> Self {
        Self {
            preprocessor: CellPreprocessor::new(config),
            options,
        }
    }

    pub fn options(&self) -> &RecognizeOptions {
        &self.options
    }

    /// All detected fragments of the crop joined by single spaces.
    pub fn try_read_cell(&self, ocr: &LazyOcr, crop: &DynamicImage) -> Result<String, OcrError> {
        let prepared = self.preprocessor.prepare(crop)?;
        let backend = ocr.get()?;
        let boxes = backend.recognize(&prepared, &self.options)?;

        let text = boxes
            .iter()
            .map(|b| b.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text)
    }

    /// Like [`try_read_cell`](Self::try_read_cell), but a failure yields an
    /// empty string. The error is logged with the cell position.
    ///
    /// A panicking backend counts as a failure too; the run carries on with
    /// the next cell.
    pub fn read_cell(&self, ocr: &LazyOcr, crop: &DynamicImage, row: u32, col: u32) -> String {
        match catch_unwind(AssertUnwindSafe(|| self.try_read_cell(ocr, crop))) {
            Ok(Ok(text)) => {
                trace!("Cell ({}, {}): {:?}", row, col, text);
                text
            }
            Ok(Err(e)) => {
                warn!("OCR failed for cell row {} col {}: {}", row, col, e);
                String::new()
            }
            Err(payload) => {
                warn!(
                    "OCR panicked for cell row {} col {}: {}",
                    row,
                    col,
                    panic_message(payload.as_ref())
                );
                String::new()
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::{FailingOcr, ScriptedOcr};
    use crate::ocr::{OcrBackend, TextBox};
    use pretty_assertions::assert_eq;

    fn recognizer() -> CellRecognizer {
        CellRecognizer::new(&GridConfig::default(), RecognizeOptions::default())
    }

    fn crop() -> DynamicImage {
        DynamicImage::new_rgb8(40, 12)
    }

    #[test]
    fn test_fragments_joined_with_space() {
        let ocr = LazyOcr::ready(Box::new(ScriptedOcr::new(vec![Ok(vec![
            TextBox::from_rect("John", 0.0, 0.0, 10.0, 8.0, 0.9),
            TextBox::from_rect(" ", 12.0, 0.0, 2.0, 8.0, 0.9),
            TextBox::from_rect("Deere ", 16.0, 0.0, 10.0, 8.0, 0.8),
        ])])));
        assert_eq!(recognizer().read_cell(&ocr, &crop(), 1, 1), "John Deere");
    }

    #[test]
    fn test_backend_error_degrades_to_empty() {
        let ocr = LazyOcr::ready(Box::new(FailingOcr));
        let r = recognizer();
        assert!(r.try_read_cell(&ocr, &crop()).is_err());
        assert_eq!(r.read_cell(&ocr, &crop(), 2, 3), "");
    }

    struct PanicOcr;

    impl OcrBackend for PanicOcr {
        fn recognize(&self, _image: &DynamicImage, _options: &RecognizeOptions) -> Result<Vec<TextBox>, OcrError> {
            panic!("decoder index out of range");
        }

        fn name(&self) -> &str {
            "panic"
        }
    }

    #[test]
    fn test_panicking_backend_degrades_to_empty() {
        let ocr = LazyOcr::ready(Box::new(PanicOcr));
        let r = recognizer();
        assert_eq!(r.read_cell(&ocr, &crop(), 2, 3), "");
        // the backend stays usable for the next cell
        assert_eq!(r.read_cell(&ocr, &crop(), 2, 4), "");
    }

    #[test]
    fn test_unavailable_backend_degrades_to_empty() {
        let ocr = LazyOcr::new(|| Err(OcrError::ModelLoad("det.onnx not found".to_string())));
        assert_eq!(recognizer().read_cell(&ocr, &crop(), 1, 4), "");
        assert!(!ocr.is_initialized());
    }

    #[test]
    fn test_empty_crop_degrades_to_empty() {
        let backend = ScriptedOcr::texts(&["never read"]);
        let calls = backend.calls.clone();
        let ocr = LazyOcr::ready(Box::new(backend) as Box<dyn OcrBackend>);

        assert_eq!(recognizer().read_cell(&ocr, &DynamicImage::new_rgb8(0, 5), 1, 1), "");
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
