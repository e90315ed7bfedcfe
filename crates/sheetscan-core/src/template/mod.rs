//! Grid templates: named cell geometry against a canonical image size.

mod lines;
mod store;

pub use lines::validate_grid_lines;
pub use store::{DEFAULT_TEMPLATE, TemplateStore};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// One declared region of a template.
///
/// Geometry is either fractions of the canonical size or absolute pixels,
/// depending on [`GridSpec::normalized`]. Row and column are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Cell {
    pub fn new(row: u32, col: u32, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            row,
            col,
            x,
            y,
            w,
            h,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Column name used for postprocessing and output headers.
    pub fn column_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Column {}", self.col),
        }
    }
}

/// A named grid template.
///
/// `(row, col)` uniqueness is up to the template author; on duplicates the
/// last declared cell wins during row reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub name: String,
    /// Canonical width the input is aligned to.
    pub width: u32,
    /// Canonical height the input is aligned to.
    pub height: u32,
    /// Records written before this flag existed hold absolute pixels.
    #[serde(default)]
    pub normalized: bool,
    pub cells: Vec<Cell>,
}

impl GridSpec {
    /// Highest row index declared by any cell (0 when there are no cells).
    pub fn max_row(&self) -> u32 {
        self.cells.iter().map(|c| c.row).max().unwrap_or(0)
    }

    /// Distinct column names, ordered by the lowest column index that uses them.
    pub fn column_names(&self) -> Vec<String> {
        let mut first_col: BTreeMap<String, u32> = BTreeMap::new();
        for cell in &self.cells {
            let name = cell.column_name();
            first_col
                .entry(name)
                .and_modify(|c| *c = (*c).min(cell.col))
                .or_insert(cell.col);
        }
        let mut names: Vec<(String, u32)> = first_col.into_iter().collect();
        names.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        names.into_iter().map(|(name, _)| name).collect()
    }

    /// Check the geometry invariants a loaded template must satisfy.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let invalid = |reason: String| TemplateError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if self.name.contains(['/', '\\']) || self.name.starts_with('.') {
            return Err(invalid(
                "name must not contain path separators or start with '.'".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!(
                "canonical size {}x{} has a zero side",
                self.width, self.height
            )));
        }

        for cell in &self.cells {
            if cell.row == 0 || cell.col == 0 {
                return Err(invalid(format!(
                    "cell ({}, {}) uses a 0 index; rows and columns start at 1",
                    cell.row, cell.col
                )));
            }
            if !(cell.w > 0.0 && cell.h > 0.0) {
                return Err(invalid(format!(
                    "cell ({}, {}) has non-positive size {}x{}",
                    cell.row, cell.col, cell.w, cell.h
                )));
            }
            if self.normalized {
                let inside = |v: f64| (0.0..=1.0).contains(&v);
                if !(inside(cell.x) && inside(cell.y) && inside(cell.x + cell.w) && inside(cell.y + cell.h)) {
                    return Err(invalid(format!(
                        "cell ({}, {}) leaves the unit square",
                        cell.row, cell.col
                    )));
                }
            }
        }

        Ok(())
    }

    /// Build a template from manually marked separators.
    ///
    /// Image borders are added to the separators; every rectangle between
    /// consecutive lines becomes a cell in absolute pixels. Cells are named
    /// from `column_names` by position when given.
    pub fn from_grid_lines(
        name: impl Into<String>,
        width: u32,
        height: u32,
        vertical: &[u32],
        horizontal: &[u32],
        column_names: &[String],
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        validate_grid_lines(vertical, horizontal, width, height).map_err(|reason| {
            TemplateError::Invalid {
                name: name.clone(),
                reason,
            }
        })?;

        let xs = lines::with_borders(vertical, width);
        let ys = lines::with_borders(horizontal, height);

        let mut cells = Vec::with_capacity((xs.len() - 1) * (ys.len() - 1));
        for (r, band) in ys.windows(2).enumerate() {
            for (c, span) in xs.windows(2).enumerate() {
                let mut cell = Cell::new(
                    r as u32 + 1,
                    c as u32 + 1,
                    span[0] as f64,
                    band[0] as f64,
                    (span[1] - span[0]) as f64,
                    (band[1] - band[0]) as f64,
                );
                if let Some(label) = column_names.get(c).filter(|l| !l.trim().is_empty()) {
                    cell = cell.named(label.trim());
                }
                cells.push(cell);
            }
        }

        let spec = Self {
            name,
            width,
            height,
            normalized: false,
            cells,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// The 3-row, 4-column example template used when nothing else exists.
    pub fn builtin_default() -> Self {
        const COLUMNS: [(&str, f64, f64); 4] = [
            ("Etiqueta", 0.1, 0.2),
            ("DXO", 0.35, 0.2),
            ("Marca", 0.6, 0.2),
            ("Peso", 0.85, 0.1),
        ];
        const ROW_Y: [f64; 3] = [0.1, 0.3, 0.5];

        let cells = ROW_Y
            .iter()
            .enumerate()
            .flat_map(|(r, &y)| {
                COLUMNS.iter().enumerate().map(move |(c, &(label, x, w))| {
                    Cell::new(r as u32 + 1, c as u32 + 1, x, y, w, 0.15).named(label)
                })
            })
            .collect();

        Self {
            name: DEFAULT_TEMPLATE.to_string(),
            width: 1280,
            height: 720,
            normalized: true,
            cells,
        }
    }
}
