//! Model-free structure detection for tables drawn with ruling lines.

use image::{DynamicImage, GrayImage};
use tracing::debug;

use super::table::{StructureDetector, TableCell, TableStructure};
use crate::error::OcrError;
use crate::models::config::StructureConfig;

const DARK: u8 = 128;

/// Finds horizontal and vertical rules by dark-pixel projection and emits
/// the cells between consecutive rules.
#[derive(Debug, Clone)]
pub struct RuledTableDetector {
    line_coverage: f32,
    min_cell_side: u32,
}

/// A ruling line as a half-open pixel range across its thickness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rule {
    start: u32,
    end: u32,
}

impl RuledTableDetector {
    pub fn new(config: &StructureConfig) -> Self {
        Self {
            line_coverage: config.line_coverage.clamp(0.05, 1.0),
            min_cell_side: config.min_cell_side,
        }
    }

    fn rules(&self, gray: &GrayImage, horizontal: bool) -> Vec<Rule> {
        let (w, h) = gray.dimensions();
        let (lines, length) = if horizontal { (h, w) } else { (w, h) };
        let needed = (length as f32 * self.line_coverage).ceil() as u32;

        let mut rules: Vec<Rule> = Vec::new();
        for i in 0..lines {
            let mut longest = 0u32;
            let mut run = 0u32;
            for j in 0..length {
                let (x, y) = if horizontal { (j, i) } else { (i, j) };
                if gray.get_pixel(x, y)[0] < DARK {
                    run += 1;
                    longest = longest.max(run);
                } else {
                    run = 0;
                }
            }
            if longest >= needed.max(1) {
                match rules.last_mut() {
                    Some(last) if last.end == i => last.end = i + 1,
                    _ => rules.push(Rule { start: i, end: i + 1 }),
                }
            }
        }
        rules
    }

    /// Spans between consecutive rules that are wide enough to hold a cell.
    fn bands(&self, rules: &[Rule]) -> Vec<(u32, u32)> {
        rules
            .windows(2)
            .map(|pair| (pair[0].end, pair[1].start))
            .filter(|&(a, b)| b > a && b - a >= self.min_cell_side)
            .collect()
    }
}

impl StructureDetector for RuledTableDetector {
    fn detect(&self, image: &DynamicImage) -> Result<TableStructure, OcrError> {
        let gray = image.to_luma8();
        let rows = self.rules(&gray, true);
        let cols = self.rules(&gray, false);
        debug!("Ruled table: {} horizontal, {} vertical rules", rows.len(), cols.len());

        if rows.len() < 2 || cols.len() < 2 {
            return Err(OcrError::NoStructure(format!(
                "found {} horizontal and {} vertical rules",
                rows.len(),
                cols.len()
            )));
        }

        let row_bands = self.bands(&rows);
        let col_bands = self.bands(&cols);
        if row_bands.is_empty() || col_bands.is_empty() {
            return Err(OcrError::NoStructure("rules enclose no usable cells".to_string()));
        }

        let mut cells = Vec::with_capacity(row_bands.len() * col_bands.len());
        for (r, &(y1, y2)) in row_bands.iter().enumerate() {
            for (c, &(x1, x2)) in col_bands.iter().enumerate() {
                cells.push(TableCell {
                    row: r,
                    col: c,
                    row_span: 1,
                    col_span: 1,
                    bbox: [x1 as f32, y1 as f32, x2 as f32, y2 as f32],
                });
            }
        }

        Ok(TableStructure {
            num_rows: row_bands.len(),
            num_cols: col_bands.len(),
            cells,
        })
    }

    fn name(&self) -> &str {
        "ruled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use pretty_assertions::assert_eq;

    /// White page with a `rows x cols` ruled grid of `cell`-pixel cells, 2px rules.
    fn ruled_page(rows: u32, cols: u32, cell: u32) -> GrayImage {
        let margin = 10;
        let w = margin * 2 + cols * (cell + 2) + 2;
        let h = margin * 2 + rows * (cell + 2) + 2;
        let mut img = GrayImage::from_pixel(w, h, Luma([255]));
        let (x_end, y_end) = (w - margin, h - margin);
        for r in 0..=rows {
            let y = margin + r * (cell + 2);
            for t in 0..2 {
                for x in margin..x_end {
                    img.put_pixel(x, y + t, Luma([0]));
                }
            }
        }
        for c in 0..=cols {
            let x = margin + c * (cell + 2);
            for t in 0..2 {
                for y in margin..y_end {
                    img.put_pixel(x + t, y, Luma([0]));
                }
            }
        }
        img
    }

    #[test]
    fn test_detects_grid() {
        let page = DynamicImage::ImageLuma8(ruled_page(3, 4, 30));
        let detector = RuledTableDetector::new(&StructureConfig::default());
        let table = detector.detect(&page).unwrap();

        assert_eq!((table.num_rows, table.num_cols), (3, 4));
        assert_eq!(table.cells.len(), 12);
        assert_eq!(table.cells[0].bbox, [12.0, 12.0, 42.0, 42.0]);
        assert!(table.cells.iter().all(|c| c.width() == 30.0 && c.height() == 30.0));
    }

    #[test]
    fn test_blank_page_has_no_structure() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 80, Luma([255])));
        let detector = RuledTableDetector::new(&StructureConfig::default());
        assert!(matches!(detector.detect(&page), Err(OcrError::NoStructure(_))));
    }

    #[test]
    fn test_thin_bands_are_skipped() {
        let detector = RuledTableDetector::new(&StructureConfig {
            min_cell_side: 8,
            ..StructureConfig::default()
        });
        let rules = [
            Rule { start: 0, end: 2 },
            Rule { start: 5, end: 6 },
            Rule { start: 40, end: 42 },
        ];
        assert_eq!(detector.bands(&rules), vec![(6, 40)]);
    }
}
