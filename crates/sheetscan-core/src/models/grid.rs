//! The rectangular text grid produced by every extraction strategy.

use serde::{Deserialize, Serialize};

/// Cleaned text for one template cell, keyed by row and column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedValue {
    /// 1-based row index from the template.
    pub row: u32,
    /// Column name the value belongs to.
    pub column: String,
    /// Postprocessed text; empty when recognition failed.
    pub text: String,
}

impl RecognizedValue {
    pub fn new(row: u32, column: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            row,
            column: column.into(),
            text: text.into(),
        }
    }
}

/// Ordered rows of cell text. Always rectangular.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    headers: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Build a grid with column names. Rows are padded or truncated to the
    /// header width.
    pub fn with_headers(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            headers: Some(headers),
            rows,
        }
    }

    /// Build a header-less grid. Short rows are padded to the widest row.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            headers: None,
            rows,
        }
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        match &self.headers {
            Some(h) => h.len(),
            None => self.rows.first().map(Vec::len).unwrap_or(0),
        }
    }

    /// Text at a 0-based position.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// True when at least one cell holds non-empty text.
    pub fn has_content(&self) -> bool {
        self.rows.iter().flatten().any(|v| !v.trim().is_empty())
    }

    /// True when there are no rows or no columns to write.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.column_count() == 0
    }
}
