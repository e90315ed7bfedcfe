//! Template-free layout: grouping loose words into rows by vertical position.

use tracing::debug;

use crate::models::config::LayoutConfig;
use crate::models::Grid;
use crate::ocr::TextBox;

/// A word with its truncated top-left corner and height.
#[derive(Debug, Clone)]
struct Word<'a> {
    text: &'a str,
    x: f32,
    y: f32,
    h: f32,
}

impl<'a> Word<'a> {
    fn from_box(b: &'a TextBox) -> Self {
        let (min_x, min_y, _, max_y) = b.rect();
        Self {
            text: b.text.trim(),
            x: min_x.trunc(),
            y: min_y.trunc(),
            h: (max_y - min_y).trunc(),
        }
    }
}

/// Builds a grid where every detected word is one cell.
#[derive(Debug, Clone)]
pub struct LineClusterer {
    max_columns: Option<usize>,
    min_row_threshold: f32,
}

impl LineClusterer {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            max_columns: config.max_columns,
            min_row_threshold: config.min_row_threshold,
        }
    }

    pub fn with_max_columns(mut self, max_columns: Option<usize>) -> Self {
        self.max_columns = max_columns;
        self
    }

    /// Rows in top-to-bottom order, cells left to right.
    ///
    /// Words join the current row while their top edge is within half the
    /// average word height (at least `min_row_threshold`) of the previous
    /// word's. Rows longer than `max_columns` fold the tail into the last cell.
    pub fn cluster(&self, boxes: &[TextBox]) -> Grid {
        let mut words: Vec<Word<'_>> = boxes
            .iter()
            .map(Word::from_box)
            .filter(|w| !w.text.is_empty())
            .collect();
        if words.is_empty() {
            return Grid::default();
        }

        words.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

        let avg_h = (words.iter().map(|w| w.h).sum::<f32>() / words.len() as f32)
            .floor()
            .max(1.0);
        let threshold = (avg_h / 2.0).floor().max(self.min_row_threshold);
        debug!(
            "Clustering {} words, avg height {}, row threshold {}",
            words.len(),
            avg_h,
            threshold
        );

        let mut lines: Vec<Vec<Word<'_>>> = Vec::new();
        let mut current: Vec<Word<'_>> = Vec::new();
        for word in words {
            match current.last() {
                Some(last) if (word.y - last.y).abs() > threshold => {
                    lines.push(std::mem::take(&mut current));
                }
                _ => {}
            }
            current.push(word);
        }
        lines.push(current);

        let rows = lines
            .into_iter()
            .map(|mut line| {
                line.sort_by(|a, b| a.x.total_cmp(&b.x));
                self.fold(line.into_iter().map(|w| w.text.to_string()).collect())
            })
            .collect();
        Grid::from_rows(rows)
    }

    fn fold(&self, mut cells: Vec<String>) -> Vec<String> {
        match self.max_columns {
            Some(max) if max > 0 && cells.len() > max => {
                let tail = cells.split_off(max - 1).join(" ");
                cells.push(tail);
                cells
            }
            _ => cells,
        }
    }
}
