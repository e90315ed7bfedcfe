use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use super::{records, resolve_filename, write_atomic, TableExporter};
use crate::error::ExportError;
use crate::models::Grid;

/// Single-sheet Excel workbook. The header row is bold and frozen.
#[derive(Debug, Clone)]
pub struct XlsxExporter {
    sheet_name: String,
    write_headers: bool,
}

impl XlsxExporter {
    pub fn new(sheet_name: impl Into<String>, write_headers: bool) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            write_headers,
        }
    }

    fn to_bytes(&self, grid: &Grid) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name)?;

        let bold = Format::new().set_bold();
        let has_header = self.write_headers && grid.headers().is_some();

        for (r, record) in records(grid, self.write_headers).enumerate() {
            let row = u32::try_from(r).map_err(|_| ExportError::Write {
                path: PathBuf::from(&self.sheet_name),
                reason: format!("row {} exceeds the sheet limit", r),
            })?;
            for (c, value) in record.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let col = u16::try_from(c).map_err(|_| ExportError::Write {
                    path: PathBuf::from(&self.sheet_name),
                    reason: format!("column {} exceeds the sheet limit", c),
                })?;
                if has_header && row == 0 {
                    sheet.write_string_with_format(row, col, value, &bold)?;
                } else {
                    sheet.write_string(row, col, value)?;
                }
            }
        }

        if has_header {
            sheet.set_freeze_panes(1, 0)?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

impl Default for XlsxExporter {
    fn default() -> Self {
        Self::new("Extracted Data", true)
    }
}

impl TableExporter for XlsxExporter {
    fn export(&self, grid: &Grid, output_dir: &Path, filename: &str) -> Result<PathBuf, ExportError> {
        if grid.is_empty() {
            return Err(ExportError::EmptyGrid);
        }
        let filename = resolve_filename(filename);
        debug!(
            "Writing {}x{} grid to sheet '{}'",
            grid.row_count(),
            grid.column_count(),
            self.sheet_name
        );
        let bytes = self.to_bytes(grid)?;
        write_atomic(output_dir, &filename, &bytes)
    }

    fn extension(&self) -> &str {
        "xlsx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn grid() -> Grid {
        Grid::with_headers(
            vec!["DXO".to_string(), "Peso".to_string()],
            vec![
                vec!["AB12".to_string(), "12.5".to_string()],
                vec!["".to_string(), "3".to_string()],
            ],
        )
    }

    #[test]
    fn test_writes_workbook() {
        let dir = TempDir::new().unwrap();
        let path = XlsxExporter::default().export(&grid(), dir.path(), "salida").unwrap();

        assert_eq!(path.file_name().unwrap(), "salida.xlsx");
        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_grid_rejected() {
        let dir = TempDir::new().unwrap();
        let err = XlsxExporter::default()
            .export(&Grid::default(), dir.path(), "x.xlsx")
            .unwrap_err();
        assert!(matches!(err, ExportError::EmptyGrid));
        assert!(!dir.path().join("x.xlsx").exists());
    }

    #[test]
    fn test_invalid_sheet_name_fails_without_file() {
        let dir = TempDir::new().unwrap();
        let exporter = XlsxExporter::new("bad/name", true);
        let err = exporter.export(&grid(), dir.path(), "x.xlsx").unwrap_err();
        assert!(matches!(err, ExportError::Xlsx(_)));
        assert!(!dir.path().join("x.xlsx").exists());
    }
}
