//! The external OCR capability and the table-structure detectors.
//!
//! Everything downstream talks to [`OcrBackend`]; the concrete engine is
//! picked once when a pipeline is built and created lazily on first use.

mod classifier;
mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;
mod ruled;
mod table;

pub use classifier::AngleClassifier;
pub use preprocessing::CellPreprocessor;
#[cfg(feature = "native")]
pub use pure_engine::PureOcrBackend;
pub use ruled::RuledTableDetector;
pub use table::{SlanetDetector, StructureDetector, TableCell, TableStructure};

use image::DynamicImage;
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OcrError;

/// A detected text region with its quadrilateral and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Corner coordinates (x1, y1, x2, y2, x3, y3, x4, y4), clockwise from top-left.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Axis-aligned box from its top-left corner and size.
    pub fn from_rect(text: impl Into<String>, x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Self {
        Self {
            bbox: [x, y, x + w, y, x + w, y + h, x, y + h],
            text: text.into(),
            confidence,
        }
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        let x = (self.bbox[0] + self.bbox[2] + self.bbox[4] + self.bbox[6]) / 4.0;
        let y = (self.bbox[1] + self.bbox[3] + self.bbox[5] + self.bbox[7]) / 4.0;
        (x, y)
    }

    /// Length of the top edge.
    pub fn width(&self) -> f32 {
        let dx = self.bbox[2] - self.bbox[0];
        let dy = self.bbox[3] - self.bbox[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Length of the left edge.
    pub fn height(&self) -> f32 {
        let dx = self.bbox[6] - self.bbox[0];
        let dy = self.bbox[7] - self.bbox[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Axis-aligned bounding rectangle as (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Per-call OCR options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeOptions {
    /// Language code, e.g. "es".
    pub language: String,
    /// Correct upside-down text before recognition.
    pub classify_angle: bool,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            classify_angle: true,
        }
    }
}

/// An OCR engine: image in, text detections out.
///
/// Implementations need not be `Sync`; a pipeline owns exactly one and
/// calls it from a single thread.
pub trait OcrBackend: Send {
    /// Detect and recognize all text in `image`.
    fn recognize(&self, image: &DynamicImage, options: &RecognizeOptions) -> Result<Vec<TextBox>, OcrError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Builds an OCR backend on demand.
pub type OcrFactory = Box<dyn Fn() -> Result<Box<dyn OcrBackend>, OcrError> + Send>;

/// An OCR backend created on first use and reused afterwards.
///
/// A failed construction is not cached: the error goes back to the caller
/// and the next `get` tries again.
pub struct LazyOcr {
    factory: OcrFactory,
    slot: OnceCell<Box<dyn OcrBackend>>,
}

impl LazyOcr {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn OcrBackend>, OcrError> + Send + 'static,
    {
        Self {
            factory: Box::new(factory),
            slot: OnceCell::new(),
        }
    }

    /// Wrap an already constructed backend.
    pub fn ready(backend: Box<dyn OcrBackend>) -> Self {
        let slot = OnceCell::new();
        let _ = slot.set(backend);
        Self {
            factory: Box::new(|| Err(OcrError::Unavailable("backend already provided".to_string()))),
            slot,
        }
    }

    pub fn get(&self) -> Result<&dyn OcrBackend, OcrError> {
        self.slot
            .get_or_try_init(|| {
                debug!("Initializing OCR backend");
                (self.factory)()
            })
            .map(|backend| backend.as_ref())
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl std::fmt::Debug for LazyOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyOcr")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted OCR backends shared by the unit tests.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Returns queued responses in order, then an empty result.
    pub struct ScriptedOcr {
        pub responses: Mutex<VecDeque<Result<Vec<TextBox>, OcrError>>>,
        pub calls: Arc<Mutex<usize>>,
    }

    impl ScriptedOcr {
        pub fn new(responses: Vec<Result<Vec<TextBox>, OcrError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Arc::new(Mutex::new(0)),
            }
        }

        /// One single-word response per text, in call order.
        pub fn texts(texts: &[&str]) -> Self {
            Self::new(
                texts
                    .iter()
                    .map(|t| Ok(vec![TextBox::from_rect(*t, 0.0, 0.0, 10.0, 10.0, 0.9)]))
                    .collect(),
            )
        }
    }

    impl OcrBackend for ScriptedOcr {
        fn recognize(&self, _image: &DynamicImage, _options: &RecognizeOptions) -> Result<Vec<TextBox>, OcrError> {
            *self.calls.lock().unwrap() += 1;
            self.responses.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Always fails.
    pub struct FailingOcr;

    impl OcrBackend for FailingOcr {
        fn recognize(&self, _image: &DynamicImage, _options: &RecognizeOptions) -> Result<Vec<TextBox>, OcrError> {
            Err(OcrError::Recognition("engine crashed".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedOcr;
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_text_box_geometry() {
        let b = TextBox::from_rect("x", 10.0, 20.0, 30.0, 8.0, 0.5);
        assert_eq!(b.center(), (25.0, 24.0));
        assert_eq!(b.width(), 30.0);
        assert_eq!(b.height(), 8.0);
        assert_eq!(b.rect(), (10.0, 20.0, 40.0, 28.0));
    }

    #[test]
    fn test_lazy_ocr_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let lazy = LazyOcr::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedOcr::texts(&[])) as Box<dyn OcrBackend>)
        });

        assert!(!lazy.is_initialized());
        assert_eq!(lazy.get().unwrap().name(), "scripted");
        assert_eq!(lazy.get().unwrap().name(), "scripted");
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_ocr_retries_after_failure() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let lazy = LazyOcr::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(OcrError::ModelLoad("missing det.onnx".to_string()))
        });

        assert!(lazy.get().is_err());
        assert!(lazy.get().is_err());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(!lazy.is_initialized());
    }
}
