//! Running one extraction at a time off the caller's thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, info};

use super::{GridPipeline, RunOutcome, RunRequest};
use crate::error::{ExtractError, Result};

/// Cooperative cancellation flag shared between a run and its caller.
///
/// Checked between cells and between strategies, never inside an OCR call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> std::result::Result<(), ExtractError> {
        if self.is_cancelled() {
            Err(ExtractError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A strategy is about to run.
    StrategyStarted { name: String },
    /// A cell was read; `done` of `total` for the current strategy.
    CellRead { done: usize, total: usize },
    /// A strategy ended; `success` when its grid was accepted.
    StrategyFinished { name: String, success: bool },
}

/// Receiver for [`RunEvent`]s. Called on the run's thread.
pub type EventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Clears the busy flag when the run thread ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns a pipeline and runs requests on a dedicated thread, one at a time.
pub struct RunWorker {
    pipeline: Arc<Mutex<GridPipeline>>,
    busy: Arc<AtomicBool>,
}

impl RunWorker {
    pub fn new(pipeline: GridPipeline) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start `request` on a new thread.
    ///
    /// Fails with [`ExtractError::Busy`] while an earlier run is still going.
    pub fn submit(&self, request: RunRequest) -> std::result::Result<RunHandle, ExtractError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejecting run for {}: worker busy", request.image_path.display());
            return Err(ExtractError::Busy);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let cancel = CancelToken::new();
        let token = cancel.clone();
        let pipeline = Arc::clone(&self.pipeline);

        info!("Starting run for {}", request.image_path.display());
        let join = std::thread::Builder::new()
            .name("sheetscan-run".to_string())
            .spawn(move || {
                let _guard = guard;
                let pipeline = pipeline
                    .lock()
                    .map_err(|_| ExtractError::Worker("pipeline lock poisoned".to_string()))?;
                pipeline.run(&request, &token)
            })
            .map_err(|e| ExtractError::Worker(e.to_string()))?;

        Ok(RunHandle { join, cancel })
    }
}

/// A run in flight.
pub struct RunHandle {
    join: JoinHandle<Result<RunOutcome>>,
    cancel: CancelToken,
}

impl RunHandle {
    /// Ask the run to stop at the next cell boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the run ends.
    pub fn wait(self) -> Result<RunOutcome> {
        self.join
            .join()
            .map_err(|_| ExtractError::Worker("run thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SheetscanError;
    use crate::ocr::{LazyOcr, OcrBackend, RecognizeOptions, TextBox};
    use crate::template::TemplateStore;
    use image::DynamicImage;
    use std::sync::mpsc::{channel, Receiver};
    use tempfile::TempDir;

    /// Blocks every recognition until the test releases it.
    struct GatedOcr(Mutex<Receiver<()>>);

    impl OcrBackend for GatedOcr {
        fn recognize(
            &self,
            _image: &DynamicImage,
            _options: &RecognizeOptions,
        ) -> std::result::Result<Vec<TextBox>, crate::error::OcrError> {
            let _ = self.0.lock().unwrap().recv();
            Ok(vec![TextBox::from_rect("hola", 0.0, 0.0, 30.0, 10.0, 0.9)])
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn request(dir: &TempDir) -> RunRequest {
        let image_path = dir.path().join("page.png");
        if !image_path.exists() {
            DynamicImage::new_rgb8(64, 48).save(&image_path).unwrap();
        }
        RunRequest::new(image_path, dir.path().join("out")).with_output_name("result.csv")
    }

    fn worker(dir: &TempDir, rx: Receiver<()>) -> RunWorker {
        let store = TemplateStore::new(dir.path().join("templates")).unwrap();
        let ocr = LazyOcr::ready(Box::new(GatedOcr(Mutex::new(rx))));
        RunWorker::new(GridPipeline::builder(ocr, store).build())
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(token.check().is_ok());
        shared.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ExtractError::Cancelled)));
    }

    #[test]
    fn test_second_submit_rejected_while_busy() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = channel();
        let worker = worker(&dir, rx);

        let req = request(&dir);
        let handle = worker.submit(req.clone()).unwrap();
        assert!(worker.is_busy());
        assert!(matches!(worker.submit(req.clone()), Err(ExtractError::Busy)));

        tx.send(()).unwrap();
        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.strategy, "line-cluster");
        assert!(outcome.output_path.exists());
        assert!(!worker.is_busy());

        let handle = worker.submit(req).unwrap();
        tx.send(()).unwrap();
        assert!(handle.wait().is_ok());
    }

    #[test]
    fn test_cancel_before_export() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = channel();
        let worker = worker(&dir, rx);

        let handle = worker.submit(request(&dir)).unwrap();
        handle.cancel();
        tx.send(()).unwrap();

        let result = handle.wait();
        assert!(matches!(result, Err(SheetscanError::Extract(ExtractError::Cancelled))));
        assert!(!dir.path().join("out").join("result.csv").exists());
        assert!(!worker.is_busy());
    }
}
