//! Table structure: rows, columns and cell boxes inferred without a template.

use std::collections::HashSet;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::{Array4, ArrayD};
use tracing::debug;

use crate::error::OcrError;
use sheetscan_inference::{InferenceBackend, InputTensor, OutputTensor};

/// A cell of a detected table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    /// Row index (0-based).
    pub row: usize,
    /// Column index (0-based).
    pub col: usize,
    /// Number of rows this cell spans.
    pub row_span: usize,
    /// Number of columns this cell spans.
    pub col_span: usize,
    /// Bounding box in image coordinates (x1, y1, x2, y2).
    pub bbox: [f32; 4],
}

impl TableCell {
    pub fn width(&self) -> f32 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }
}

/// A recognized table structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStructure {
    pub num_rows: usize,
    pub num_cols: usize,
    pub cells: Vec<TableCell>,
}

impl TableStructure {
    /// Get the cell covering a slot, including slots covered by a span.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.cells.iter().find(|c| {
            row >= c.row && row < c.row + c.row_span && col >= c.col && col < c.col + c.col_span
        })
    }

    /// `num_rows x num_cols` slots holding each cell at its anchor only.
    ///
    /// Slots covered by a span stay `None`, so spanning text is written once.
    pub fn as_grid(&self) -> Vec<Vec<Option<&TableCell>>> {
        let mut grid = vec![vec![None; self.num_cols]; self.num_rows];
        for cell in &self.cells {
            if cell.row < self.num_rows && cell.col < self.num_cols {
                grid[cell.row][cell.col] = Some(cell);
            }
        }
        grid
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Finds table structure in a whole page.
pub trait StructureDetector: Send {
    fn detect(&self, image: &DynamicImage) -> Result<TableStructure, OcrError>;

    /// Short detector name for logs.
    fn name(&self) -> &str;
}

const SOS: &str = "sos";
const EOS: &str = "eos";

/// Table structure recognizer using the SLANet model.
///
/// The model emits one HTML structure token per step plus a box per step;
/// boxes are read at the steps that open a cell.
pub struct SlanetDetector<B: InferenceBackend> {
    backend: B,
    vocab: Vec<String>,
    input_size: u32,
}

impl<B: InferenceBackend> SlanetDetector<B> {
    /// `dictionary` is the structure token list without `sos`/`eos`.
    pub fn new(backend: B, dictionary: Vec<String>) -> Self {
        let mut vocab = Vec::with_capacity(dictionary.len() + 2);
        vocab.push(SOS.to_string());
        vocab.extend(dictionary);
        vocab.push(EOS.to_string());
        Self {
            backend,
            vocab,
            input_size: 488,
        }
    }

    /// Read a structure dictionary file, one token per line.
    pub fn load_dictionary(path: &Path) -> Result<Vec<String>, OcrError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OcrError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        Ok(content
            .lines()
            .map(|l| l.trim_end_matches(['\r', '\n']).to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        let (w, h) = image.dimensions();
        let side = self.input_size;
        let scale = side as f32 / w.max(h) as f32;
        let new_w = ((w as f32 * scale) as u32).clamp(1, side);
        let new_h = ((h as f32 * scale) as u32).clamp(1, side);
        let rgb = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

        let mean = [0.485f32, 0.456, 0.406];
        let std = [0.229f32, 0.224, 0.225];

        // Padding stays at zero (bottom and right).
        let mut tensor = Array4::<f32>::zeros((1, 3, side as usize, side as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }
        tensor
    }

    fn split_outputs<'a>(
        &self,
        outputs: &'a [(String, OutputTensor)],
    ) -> Result<(&'a OutputTensor, Option<&'a ArrayD<f32>>), OcrError> {
        let structure_idx = outputs
            .iter()
            .position(|(_, t)| t.shape().last() == Some(&self.vocab.len()))
            .or_else(|| outputs.iter().position(|(n, _)| n.contains("structure")))
            .ok_or_else(|| OcrError::NoStructure("no structure output from SLANet".to_string()))?;

        let boxes = outputs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != structure_idx)
            .find_map(|(_, (_, t))| t.as_f32().filter(|a| matches!(a.shape().last(), Some(4) | Some(8))));

        Ok((&outputs[structure_idx].1, boxes))
    }

    fn token(&self, id: i64) -> &str {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.vocab.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Turn the token sequence into cells, honoring spans.
    pub(crate) fn decode(&self, tokens: &[i64], boxes: Option<&ArrayD<f32>>, width: u32, height: u32) -> TableStructure {
        let mut cells = Vec::new();
        let mut occupied: HashSet<(usize, usize)> = HashSet::new();
        let mut row = 0usize;
        let mut col = 0usize;
        let mut open: Option<(usize, usize, usize)> = None; // (step, row_span, col_span)
        let mut row_open = false;

        let mut place = |step: usize, row_span: usize, col_span: usize, row: usize, col: &mut usize| {
            while occupied.contains(&(row, *col)) {
                *col += 1;
            }
            for r in row..row + row_span {
                for c in *col..*col + col_span {
                    occupied.insert((r, c));
                }
            }
            cells.push(TableCell {
                row,
                col: *col,
                row_span,
                col_span,
                bbox: step_box(boxes, step, width, height),
            });
            *col += col_span;
        };

        for (step, &id) in tokens.iter().enumerate() {
            let token = self.token(id);
            match token {
                EOS => break,
                "<tr>" => {
                    col = 0;
                    row_open = true;
                }
                "</tr>" => {
                    row += 1;
                    row_open = false;
                }
                "<td></td>" => place(step, 1, 1, row, &mut col),
                "<td>" | "<td" => open = Some((step, 1, 1)),
                "</td>" => {
                    if let Some((s, rs, cs)) = open.take() {
                        place(s, rs, cs, row, &mut col);
                    }
                }
                t => {
                    if let Some(n) = span_value(t, "colspan") {
                        if let Some(o) = open.as_mut() {
                            o.2 = n;
                        }
                    } else if let Some(n) = span_value(t, "rowspan") {
                        if let Some(o) = open.as_mut() {
                            o.1 = n;
                        }
                    }
                }
            }
        }

        let num_rows = (row + usize::from(row_open)).max(
            cells.iter().map(|c| c.row + 1).max().unwrap_or(0),
        );
        let num_cols = occupied.iter().map(|&(_, c)| c + 1).max().unwrap_or(0);
        TableStructure {
            num_rows,
            num_cols,
            cells,
        }
    }
}

/// Parse ` colspan="3"` style attribute tokens.
fn span_value(token: &str, attr: &str) -> Option<usize> {
    let rest = token.trim().strip_prefix(attr)?.trim_start().strip_prefix('=')?;
    rest.trim_matches(|c| c == '"' || c == '>' || c == ' ')
        .parse::<usize>()
        .ok()
        .map(|n| n.clamp(1, 20))
}

/// Box predicted at `step`, normalized coordinates scaled to the image.
fn step_box(boxes: Option<&ArrayD<f32>>, step: usize, width: u32, height: u32) -> [f32; 4] {
    let Some(arr) = boxes else {
        return [0.0; 4];
    };
    let shape = arr.shape();
    if shape.len() < 2 {
        return [0.0; 4];
    }
    let (steps, k) = (shape[shape.len() - 2], shape[shape.len() - 1]);
    if step >= steps {
        return [0.0; 4];
    }
    let flat: Vec<f32> = arr.iter().skip(step * k).take(k).copied().collect();
    let xs = flat.iter().step_by(2).copied();
    let ys = flat.iter().skip(1).step_by(2).copied();
    let (w, h) = (width as f32, height as f32);
    [
        xs.clone().fold(f32::INFINITY, f32::min).clamp(0.0, 1.0) * w,
        ys.clone().fold(f32::INFINITY, f32::min).clamp(0.0, 1.0) * h,
        xs.fold(f32::NEG_INFINITY, f32::max).clamp(0.0, 1.0) * w,
        ys.fold(f32::NEG_INFINITY, f32::max).clamp(0.0, 1.0) * h,
    ]
}

impl<B: InferenceBackend> StructureDetector for SlanetDetector<B> {
    fn detect(&self, image: &DynamicImage) -> Result<TableStructure, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage("empty page".to_string()));
        }

        let input = InputTensor::Float32(self.preprocess(image).into_dyn());
        let outputs = self.backend.run(&[(self.backend.primary_input(), input)])?;
        let (structure, boxes) = self.split_outputs(&outputs)?;

        let tokens = structure.argmax_last_axis();
        let table = self.decode(&tokens, boxes, width, height);
        debug!(
            "SLANet: {} tokens -> {}x{} table with {} cells",
            tokens.len(),
            table.num_rows,
            table.num_cols,
            table.cells.len()
        );

        if table.is_empty() {
            return Err(OcrError::NoStructure("SLANet found no cells".to_string()));
        }
        Ok(table)
    }

    fn name(&self) -> &str {
        "slanet"
    }
}
