//! End-to-end runs: load a page, extract a grid, export it.
//!
//! [`GridPipeline`] owns the OCR backend and the per-component settings and
//! runs the fallback chain (template, then structure detection, then line
//! clustering). [`RunWorker`] moves a run onto its own thread and keeps at
//! most one in flight.

mod chain;
mod strategy;
mod worker;

pub use chain::{Extraction, FallbackChain};
pub use strategy::{
    ExtractionInput, ExtractionStrategy, LineClusterStrategy, StructureStrategy, TemplateStrategy,
};
pub use worker::{CancelToken, EventSink, RunEvent, RunHandle, RunWorker};

use std::path::PathBuf;

use image::DynamicImage;
use tracing::info;

use crate::error::{ExtractError, Result};
use crate::export::exporter_for;
use crate::grid::{CellRecognizer, LineClusterer};
use crate::input::load_image;
use crate::models::config::{ExportConfig, GridConfig, LayoutConfig};
use crate::ocr::{LazyOcr, RecognizeOptions, StructureDetector};
use crate::template::{GridSpec, TemplateStore};

/// One document to convert.
///
/// The OCR language is not part of a request: it picks the recognition
/// models, so it is fixed when the pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image_path: PathBuf,
    /// Template name in the store, or a path to a `.json` record.
    pub template: Option<String>,
    pub output_dir: PathBuf,
    /// Overrides the configured output file name.
    pub output_name: Option<String>,
    /// Overrides the configured maximum cells per clustered row.
    pub max_columns: Option<usize>,
}

impl RunRequest {
    pub fn new(image_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            template: None,
            output_dir: output_dir.into(),
            output_name: None,
            max_columns: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn with_max_columns(mut self, max_columns: Option<usize>) -> Self {
        self.max_columns = max_columns;
        self
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub output_path: PathBuf,
    /// Name of the strategy whose grid was exported.
    pub strategy: String,
    pub rows: usize,
    pub columns: usize,
}

/// The extraction pipeline for one process.
///
/// The OCR backend is created on first use and then reused for every cell of
/// every run. Runs are sequential; see [`RunWorker`] for running off-thread.
pub struct GridPipeline {
    ocr: LazyOcr,
    options: RecognizeOptions,
    grid: GridConfig,
    layout: LayoutConfig,
    structure: Option<Box<dyn StructureDetector>>,
    templates: TemplateStore,
    export: ExportConfig,
    events: Option<EventSink>,
}

/// Builder for [`GridPipeline`].
pub struct GridPipelineBuilder {
    ocr: LazyOcr,
    templates: TemplateStore,
    options: RecognizeOptions,
    grid: GridConfig,
    layout: LayoutConfig,
    structure: Option<Box<dyn StructureDetector>>,
    export: ExportConfig,
    events: Option<EventSink>,
}

impl GridPipelineBuilder {
    pub fn new(ocr: LazyOcr, templates: TemplateStore) -> Self {
        Self {
            ocr,
            templates,
            options: RecognizeOptions::default(),
            grid: GridConfig::default(),
            layout: LayoutConfig::default(),
            structure: None,
            export: ExportConfig::default(),
            events: None,
        }
    }

    /// Set the OCR call options.
    pub fn with_options(mut self, options: RecognizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Set cropping and cell preprocessing settings.
    pub fn with_grid_config(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    /// Set line clustering settings.
    pub fn with_layout_config(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Enable the structure-detection strategy.
    pub fn with_structure_detector(mut self, detector: Box<dyn StructureDetector>) -> Self {
        self.structure = Some(detector);
        self
    }

    /// Set output file settings.
    pub fn with_export_config(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    /// Receive progress events.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> GridPipeline {
        GridPipeline {
            ocr: self.ocr,
            options: self.options,
            grid: self.grid,
            layout: self.layout,
            structure: self.structure,
            templates: self.templates,
            export: self.export,
            events: self.events,
        }
    }
}

impl GridPipeline {
    pub fn builder(ocr: LazyOcr, templates: TemplateStore) -> GridPipelineBuilder {
        GridPipelineBuilder::new(ocr, templates)
    }

    /// Build a pipeline with the native OCR backend and the structure
    /// detector the model directory supports.
    #[cfg(feature = "native")]
    pub fn from_config(config: &crate::models::SheetscanConfig) -> Result<Self> {
        use crate::ocr::{OcrBackend, PureOcrBackend};

        let models = config.models.clone();
        let ocr_config = config.ocr.clone();
        let ocr = LazyOcr::new(move || {
            PureOcrBackend::from_models(&models, &ocr_config).map(|b| Box::new(b) as Box<dyn OcrBackend>)
        });

        let templates = TemplateStore::new(&config.templates.dir)?;
        let mut builder = Self::builder(ocr, templates)
            .with_options(RecognizeOptions {
                language: config.ocr.language.clone(),
                classify_angle: config.ocr.classify_angle,
            })
            .with_grid_config(config.grid.clone())
            .with_layout_config(config.layout.clone())
            .with_export_config(config.export.clone());

        if let Some(detector) = structure_detector(config) {
            builder = builder.with_structure_detector(detector);
        }
        Ok(builder.build())
    }

    /// Replace the progress event sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn export_config(&self) -> &ExportConfig {
        &self.export
    }

    /// Run the fallback chain over one page with the configured settings.
    pub fn extract(
        &self,
        image: &DynamicImage,
        template: Option<&GridSpec>,
        cancel: &CancelToken,
    ) -> std::result::Result<Extraction, ExtractError> {
        self.extract_with(image, template, cancel, &self.options, self.layout.max_columns)
    }

    fn extract_with(
        &self,
        image: &DynamicImage,
        template: Option<&GridSpec>,
        cancel: &CancelToken,
        options: &RecognizeOptions,
        max_columns: Option<usize>,
    ) -> std::result::Result<Extraction, ExtractError> {
        let recognizer = CellRecognizer::new(&self.grid, options.clone());
        let clusterer = LineClusterer::new(&self.layout).with_max_columns(max_columns);

        let chain = FallbackChain::new()
            .with_strategy(TemplateStrategy::new(&self.ocr, &recognizer, self.grid.pad))
            .with_strategy(StructureStrategy::new(self.structure.as_deref(), &self.ocr, &recognizer))
            .with_strategy(LineClusterStrategy::new(&self.ocr, &recognizer, clusterer));

        let input = ExtractionInput::new(image, template, cancel).with_events(self.events.as_ref());
        chain.run(&input)
    }

    /// Load, extract and export one document.
    pub fn run(&self, request: &RunRequest, cancel: &CancelToken) -> Result<RunOutcome> {
        info!("Processing {}", request.image_path.display());
        let image = load_image(&request.image_path)?;

        let template = request
            .template
            .as_deref()
            .map(|t| self.templates.resolve(t))
            .transpose()?;

        let max_columns = request.max_columns.or(self.layout.max_columns);

        let extraction = self.extract_with(&image, template.as_ref(), cancel, &self.options, max_columns)?;
        cancel.check()?;

        let filename = request
            .output_name
            .clone()
            .unwrap_or_else(|| self.export.output_filename.clone());
        let exporter = exporter_for(&filename, &self.export);
        let output_path = exporter.export(&extraction.grid, &request.output_dir, &filename)?;

        Ok(RunOutcome {
            output_path,
            strategy: extraction.strategy,
            rows: extraction.grid.row_count(),
            columns: extraction.grid.column_count(),
        })
    }
}

/// SLANet when its model and dictionary are present, else the ruled-line
/// detector, else nothing when structure detection is disabled.
#[cfg(feature = "native")]
fn structure_detector(config: &crate::models::SheetscanConfig) -> Option<Box<dyn StructureDetector>> {
    use crate::ocr::{RuledTableDetector, SlanetDetector};
    use sheetscan_inference::OrtBackend;
    use tracing::warn;

    if !config.structure.enabled {
        return None;
    }

    let model = config.models.table_path();
    let dictionary = config.models.table_dictionary_path();
    if model.exists() && dictionary.exists() {
        let loaded = OrtBackend::from_file(&model)
            .map_err(crate::error::OcrError::from)
            .and_then(|backend| {
                SlanetDetector::<OrtBackend>::load_dictionary(&dictionary)
                    .map(|vocab| SlanetDetector::new(backend, vocab))
            });
        match loaded {
            Ok(detector) => {
                info!("Using SLANet table structure model {}", model.display());
                return Some(Box::new(detector));
            }
            Err(e) => warn!("Table structure model unavailable: {}", e),
        }
    }

    Some(Box::new(RuledTableDetector::new(&config.structure)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OcrError, SheetscanError, TemplateError};
    use crate::ocr::testing::ScriptedOcr;
    use crate::ocr::{OcrBackend, TableStructure};
    use crate::template::Cell;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct FailingDetector;

    impl StructureDetector for FailingDetector {
        fn detect(&self, _image: &DynamicImage) -> std::result::Result<TableStructure, OcrError> {
            Err(OcrError::NoStructure("no rules".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn spec() -> GridSpec {
        GridSpec {
            name: "lotes".to_string(),
            width: 100,
            height: 50,
            normalized: false,
            cells: vec![
                Cell::new(1, 1, 0.0, 0.0, 50.0, 25.0).named("DXO"),
                Cell::new(1, 2, 50.0, 0.0, 50.0, 25.0).named("Marca"),
                Cell::new(2, 1, 0.0, 25.0, 50.0, 25.0).named("DXO"),
                Cell::new(2, 2, 50.0, 25.0, 50.0, 25.0).named("Marca"),
            ],
        }
    }

    fn pipeline(dir: &TempDir, backend: ScriptedOcr) -> GridPipeline {
        let store = TemplateStore::new(dir.path().join("templates")).unwrap();
        GridPipeline::builder(LazyOcr::ready(Box::new(backend)), store)
            .with_structure_detector(Box::new(FailingDetector))
            .build()
    }

    fn page(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("page.png");
        DynamicImage::new_rgb8(200, 100).save(&path).unwrap();
        path
    }

    #[test]
    fn test_template_success_skips_other_strategies() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedOcr::texts(&["x-1", "john deere", "", ""]);
        let calls = backend.calls.clone();
        let pipeline = pipeline(&dir, backend);

        let image = DynamicImage::new_rgb8(200, 100);
        let extraction = pipeline.extract(&image, Some(&spec()), &CancelToken::new()).unwrap();

        assert_eq!(extraction.strategy, "template");
        assert_eq!(extraction.grid.rows(), &[vec!["X1", "John Deere"], vec!["", ""]]);
        // one call per cell, none for a whole-page pass
        assert_eq!(*calls.lock().unwrap(), 4);
    }

    #[test]
    fn test_blank_template_grid_falls_back_to_clustering() {
        let dir = TempDir::new().unwrap();
        let mut responses: Vec<_> = (0..4).map(|_| Ok(Vec::new())).collect();
        responses.push(Ok(vec![crate::ocr::TextBox::from_rect("suelto", 0.0, 0.0, 40.0, 10.0, 0.9)]));
        let pipeline = pipeline(&dir, ScriptedOcr::new(responses));

        let image = DynamicImage::new_rgb8(200, 100);
        let extraction = pipeline.extract(&image, Some(&spec()), &CancelToken::new()).unwrap();
        assert_eq!(extraction.strategy, "line-cluster");
        assert_eq!(extraction.grid.cell(0, 0), Some("suelto"));
    }

    #[test]
    fn test_missing_template_and_no_text_fails() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedOcr::texts(&[]);
        let calls = backend.calls.clone();
        let pipeline = pipeline(&dir, backend);

        let image = DynamicImage::new_rgb8(200, 100);
        let err = pipeline.extract(&image, None, &CancelToken::new()).unwrap_err();

        match err {
            ExtractError::ExtractionFailed { tried } => {
                assert_eq!(tried, vec!["structure", "line-cluster"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_run_exports_file() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, ScriptedOcr::texts(&["ab", "fiat", "cd", "ford"]));
        pipeline.templates().save(&spec()).unwrap();

        let request = RunRequest::new(page(&dir), dir.path().join("out"))
            .with_template("lotes")
            .with_output_name("lotes.csv");
        let outcome = pipeline.run(&request, &CancelToken::new()).unwrap();

        assert_eq!((outcome.rows, outcome.columns), (2, 2));
        assert_eq!(outcome.strategy, "template");
        assert_eq!(
            std::fs::read_to_string(&outcome.output_path).unwrap(),
            "DXO,Marca\nAB,Fiat\nCD,Ford\n"
        );
    }

    /// Records the language of every recognition call.
    struct RecordingOcr(Arc<Mutex<Vec<String>>>);

    impl OcrBackend for RecordingOcr {
        fn recognize(
            &self,
            _image: &DynamicImage,
            options: &RecognizeOptions,
        ) -> std::result::Result<Vec<crate::ocr::TextBox>, OcrError> {
            self.0.lock().unwrap().push(options.language.clone());
            Ok(vec![crate::ocr::TextBox::from_rect("x", 0.0, 0.0, 10.0, 10.0, 0.9)])
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn test_run_uses_language_fixed_at_build() {
        let dir = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = TemplateStore::new(dir.path().join("templates")).unwrap();
        let pipeline = GridPipeline::builder(LazyOcr::ready(Box::new(RecordingOcr(seen.clone()))), store)
            .with_options(RecognizeOptions {
                language: "pt".to_string(),
                classify_angle: false,
            })
            .build();
        pipeline.templates().save(&spec()).unwrap();

        let request = RunRequest::new(page(&dir), dir.path().join("out"))
            .with_template("lotes")
            .with_output_name("lotes.csv");
        pipeline.run(&request, &CancelToken::new()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|lang| lang == "pt"));
    }

    #[test]
    fn test_run_unknown_template_fails_fast() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedOcr::texts(&["never"]);
        let calls = backend.calls.clone();
        let pipeline = pipeline(&dir, backend);

        let request = RunRequest::new(page(&dir), dir.path().join("out")).with_template("nope");
        let err = pipeline.run(&request, &CancelToken::new()).unwrap_err();

        assert!(matches!(err, SheetscanError::Template(TemplateError::NotFound(_))));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_run_missing_image_fails_fast() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, ScriptedOcr::texts(&[]));
        let request = RunRequest::new(dir.path().join("missing.png"), dir.path());
        assert!(matches!(
            pipeline.run(&request, &CancelToken::new()),
            Err(SheetscanError::Input(_))
        ));
    }

    #[test]
    fn test_cancel_from_progress_event() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedOcr::texts(&["a", "b", "c", "d"]);
        let calls = backend.calls.clone();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        let store = TemplateStore::new(dir.path().join("templates")).unwrap();
        let pipeline = GridPipeline::builder(LazyOcr::ready(Box::new(backend) as Box<dyn OcrBackend>), store)
            .with_events(Arc::new(move |event: RunEvent| {
                if let RunEvent::CellRead { done: 2, .. } = event {
                    token.cancel();
                }
                log.lock().unwrap().push(event);
            }))
            .build();

        let image = DynamicImage::new_rgb8(200, 100);
        let err = pipeline.extract(&image, Some(&spec()), &cancel).unwrap_err();

        assert!(matches!(err, ExtractError::Cancelled));
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&RunEvent::StrategyFinished {
                name: "template".to_string(),
                success: false
            })
        );
    }
}
