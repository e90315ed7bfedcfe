//! Assembling recognized cell values into the output grid.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{Grid, RecognizedValue};

/// Lay `values` out as rows `1..=max_row` by `columns`.
///
/// Lookup is by (row, column name), so input order does not matter. Missing
/// values become empty strings; when a key repeats, the last value wins.
/// The result always has `max_row` rows of `columns.len()` cells.
pub fn reconstruct(values: &[RecognizedValue], columns: &[String], max_row: u32) -> Grid {
    let lookup: HashMap<(u32, &str), &str> = values
        .iter()
        .map(|v| ((v.row, v.column.as_str()), v.text.as_str()))
        .collect();

    let rows: Vec<Vec<String>> = (1..=max_row)
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    lookup
                        .get(&(row, column.as_str()))
                        .map(|text| text.to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    debug!(
        "Reconstructed {} rows x {} columns from {} values",
        rows.len(),
        columns.len(),
        values.len()
    );
    Grid::with_headers(columns.to_vec(), rows)
}
