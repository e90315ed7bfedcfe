//! The three ways of turning a page into a grid.

use image::DynamicImage;
use tracing::debug;

use super::worker::{CancelToken, EventSink, RunEvent};
use crate::error::ExtractError;
use crate::grid::{
    clean_text, pixel_bounds, postprocess, reconstruct, Aligner, CellRecognizer, GridExtractor,
    LineClusterer, ResizeAligner,
};
use crate::models::{Grid, RecognizedValue};
use crate::ocr::{LazyOcr, StructureDetector, TableCell};
use crate::template::{Cell, GridSpec};

/// Everything a strategy gets to look at for one page.
#[derive(Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub image: &'a DynamicImage,
    pub template: Option<&'a GridSpec>,
    pub cancel: &'a CancelToken,
    pub events: Option<&'a EventSink>,
}

impl<'a> ExtractionInput<'a> {
    pub fn new(image: &'a DynamicImage, template: Option<&'a GridSpec>, cancel: &'a CancelToken) -> Self {
        Self {
            image,
            template,
            cancel,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<&'a EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn emit(&self, event: RunEvent) {
        if let Some(sink) = self.events {
            sink(event);
        }
    }
}

/// One extraction approach tried by the fallback chain.
pub trait ExtractionStrategy {
    fn name(&self) -> &str;

    /// `Ok(None)` when the strategy does not apply to this input (no
    /// template, no detector), `Ok(Some(grid))` otherwise, even if the grid
    /// is blank.
    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Option<Grid>, ExtractError>;
}

fn failed(strategy: &str, reason: impl std::fmt::Display) -> ExtractError {
    ExtractError::Strategy {
        strategy: strategy.to_string(),
        reason: reason.to_string(),
    }
}

/// Crops the template's cells, reads and cleans each one, and lays the
/// values out by row and column name.
pub struct TemplateStrategy<'a> {
    ocr: &'a LazyOcr,
    recognizer: &'a CellRecognizer,
    pad: u32,
}

impl<'a> TemplateStrategy<'a> {
    pub const NAME: &'static str = "template";

    pub fn new(ocr: &'a LazyOcr, recognizer: &'a CellRecognizer, pad: u32) -> Self {
        Self { ocr, recognizer, pad }
    }
}

impl ExtractionStrategy for TemplateStrategy<'_> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Option<Grid>, ExtractError> {
        let Some(spec) = input.template else {
            debug!("No template given, skipping template strategy");
            return Ok(None);
        };

        let aligned = ResizeAligner::for_spec(spec).align(input.image, None);
        let crops = GridExtractor::new(spec, self.pad).crop_cells(&aligned);
        debug!("Template '{}': reading {} cells", spec.name, crops.len());

        let total = crops.len();
        let mut values = Vec::with_capacity(total);
        for (i, crop) in crops.iter().enumerate() {
            input.cancel.check()?;
            let raw = self
                .recognizer
                .read_cell(self.ocr, &crop.image, crop.cell.row, crop.cell.col);
            let column = crop.cell.column_name();
            let text = postprocess(&column, &raw);
            values.push(RecognizedValue::new(crop.cell.row, column, text));
            input.emit(RunEvent::CellRead { done: i + 1, total });
        }

        Ok(Some(reconstruct(&values, &spec.column_names(), spec.max_row())))
    }
}

/// Infers rows and columns from the page itself and reads each cell found.
pub struct StructureStrategy<'a> {
    detector: Option<&'a dyn StructureDetector>,
    ocr: &'a LazyOcr,
    recognizer: &'a CellRecognizer,
}

impl<'a> StructureStrategy<'a> {
    pub const NAME: &'static str = "structure";

    pub fn new(
        detector: Option<&'a dyn StructureDetector>,
        ocr: &'a LazyOcr,
        recognizer: &'a CellRecognizer,
    ) -> Self {
        Self {
            detector,
            ocr,
            recognizer,
        }
    }

    fn read(&self, image: &DynamicImage, cell: &TableCell) -> String {
        let [x1, y1, x2, y2] = cell.bbox.map(f64::from);
        let row = cell.row as u32 + 1;
        let col = cell.col as u32 + 1;
        let region = Cell::new(row, col, x1, y1, x2 - x1, y2 - y1);
        let bounds = pixel_bounds(&region, false, image.width(), image.height(), 0);
        if bounds.is_empty() {
            return String::new();
        }
        let crop = image.crop_imm(bounds.x1, bounds.y1, bounds.width(), bounds.height());
        clean_text(&self.recognizer.read_cell(self.ocr, &crop, row, col))
    }
}

impl ExtractionStrategy for StructureStrategy<'_> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Option<Grid>, ExtractError> {
        let Some(detector) = self.detector else {
            debug!("No structure detector configured");
            return Ok(None);
        };

        let table = detector
            .detect(input.image)
            .map_err(|e| failed(detector.name(), e))?;
        debug!(
            "{} detector: {}x{} table, {} cells",
            detector.name(),
            table.num_rows,
            table.num_cols,
            table.cells.len()
        );

        let total = table.cells.len();
        let mut done = 0;
        let mut rows = Vec::with_capacity(table.num_rows);
        for slots in table.as_grid() {
            let mut row = Vec::with_capacity(slots.len());
            for slot in slots {
                let text = match slot {
                    Some(cell) => {
                        input.cancel.check()?;
                        let text = self.read(input.image, cell);
                        done += 1;
                        input.emit(RunEvent::CellRead { done, total });
                        text
                    }
                    None => String::new(),
                };
                row.push(text);
            }
            rows.push(row);
        }

        Ok(Some(Grid::from_rows(rows)))
    }
}

/// Whole-page OCR with words grouped into rows by position.
pub struct LineClusterStrategy<'a> {
    ocr: &'a LazyOcr,
    recognizer: &'a CellRecognizer,
    clusterer: LineClusterer,
}

impl<'a> LineClusterStrategy<'a> {
    pub const NAME: &'static str = "line-cluster";

    pub fn new(ocr: &'a LazyOcr, recognizer: &'a CellRecognizer, clusterer: LineClusterer) -> Self {
        Self {
            ocr,
            recognizer,
            clusterer,
        }
    }
}

impl ExtractionStrategy for LineClusterStrategy<'_> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Option<Grid>, ExtractError> {
        input.cancel.check()?;
        let backend = self.ocr.get().map_err(|e| failed(Self::NAME, e))?;
        let words = backend
            .recognize(input.image, self.recognizer.options())
            .map_err(|e| failed(Self::NAME, e))?;
        debug!("{} words detected on the page", words.len());

        Ok(Some(self.clusterer.cluster(&words)))
    }
}
