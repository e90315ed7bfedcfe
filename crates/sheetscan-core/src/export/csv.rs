use std::path::{Path, PathBuf};

use tracing::debug;

use super::{records, resolve_filename, write_atomic, TableExporter};
use crate::error::ExportError;
use crate::models::Grid;

/// Comma-separated values, one record per grid row.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    write_headers: bool,
}

impl CsvExporter {
    pub fn new(write_headers: bool) -> Self {
        Self { write_headers }
    }

    fn to_bytes(&self, grid: &Grid) -> Result<Vec<u8>, ExportError> {
        let mut writer = ::csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(Vec::new());
        for record in records(grid, self.write_headers) {
            writer.write_record(record)?;
        }
        writer.into_inner().map_err(|e| ExportError::Write {
            path: PathBuf::from("<csv buffer>"),
            reason: e.error().to_string(),
        })
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TableExporter for CsvExporter {
    fn export(&self, grid: &Grid, output_dir: &Path, filename: &str) -> Result<PathBuf, ExportError> {
        if grid.is_empty() {
            return Err(ExportError::EmptyGrid);
        }
        let filename = resolve_filename(filename);
        debug!("Writing {} CSV rows", grid.row_count());
        let bytes = self.to_bytes(grid)?;
        write_atomic(output_dir, &filename, &bytes)
    }

    fn extension(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_writes_header_and_rows() {
        let grid = Grid::with_headers(
            vec!["Marca".to_string(), "Peso".to_string()],
            vec![
                vec!["John Deere".to_string(), "12.5".to_string()],
                vec!["Fiat, SA".to_string(), String::new()],
            ],
        );
        let dir = TempDir::new().unwrap();
        let path = CsvExporter::default().export(&grid, dir.path(), "out.csv").unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "Marca,Peso\nJohn Deere,12.5\n\"Fiat, SA\",\n");
    }

    #[test]
    fn test_headerless_grid() {
        let grid = Grid::from_rows(vec![vec!["a".to_string(), "b".to_string()]]);
        let dir = TempDir::new().unwrap();
        let path = CsvExporter::new(true).export(&grid, dir.path(), "out.csv").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\n");
    }
}
