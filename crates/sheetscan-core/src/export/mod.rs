//! Writing grids to spreadsheet files.
//!
//! Exporters only serialize; [`write_atomic`] owns the file system side so a
//! failed export never leaves a half-written file under the final name.

mod csv;
mod xlsx;

pub use self::csv::CsvExporter;
pub use self::xlsx::XlsxExporter;

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::models::config::ExportConfig;
use crate::models::Grid;

/// Serializes a grid into a file in `output_dir`.
pub trait TableExporter {
    /// Write `grid` and return the canonical path of the written file.
    fn export(&self, grid: &Grid, output_dir: &Path, filename: &str) -> Result<PathBuf, ExportError>;

    /// File extension this exporter produces, without the dot.
    fn extension(&self) -> &str;
}

/// `filename` with `.xlsx` appended when it has no extension.
pub fn resolve_filename(filename: &str) -> String {
    if Path::new(filename).extension().is_some() {
        filename.to_string()
    } else {
        format!("{}.xlsx", filename)
    }
}

/// Exporter for `filename`'s extension: CSV for `.csv`, XLSX otherwise.
pub fn exporter_for(filename: &str, config: &ExportConfig) -> Box<dyn TableExporter> {
    let is_csv = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        Box::new(CsvExporter::new(config.write_headers))
    } else {
        Box::new(XlsxExporter::new(&config.sheet_name, config.write_headers))
    }
}

/// Header row (when wanted and present) followed by the data rows.
pub(crate) fn records(grid: &Grid, write_headers: bool) -> impl Iterator<Item = &[String]> {
    let headers = grid.headers().filter(|_| write_headers);
    headers
        .into_iter()
        .chain(grid.rows().iter().map(Vec::as_slice))
}

/// Write `bytes` to `output_dir/filename` through a temporary file in the
/// same directory, so the final name only ever holds a complete file.
///
/// `filename` must be a bare file name; anything that would resolve outside
/// `output_dir` is rejected before the directory is touched.
pub fn write_atomic(output_dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    let mut components = Path::new(filename).components();
    if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
        return Err(ExportError::Write {
            path: output_dir.join(filename),
            reason: "output name must be a plain file name".to_string(),
        });
    }

    std::fs::create_dir_all(output_dir).map_err(|source| ExportError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let target = output_dir.join(filename);
    let write_err = |reason: String| ExportError::Write {
        path: target.clone(),
        reason,
    };

    let mut tmp = NamedTempFile::new_in(output_dir).map_err(|source| ExportError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    tmp.write_all(bytes).map_err(|e| write_err(e.to_string()))?;
    tmp.flush().map_err(|e| write_err(e.to_string()))?;
    debug!("Wrote {} bytes to {}", bytes.len(), tmp.path().display());

    tmp.persist(&target).map_err(|e| write_err(e.error.to_string()))?;
    let path = target.canonicalize().map_err(|e| write_err(e.to_string()))?;

    info!("Exported {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_filename() {
        assert_eq!(resolve_filename("salida"), "salida.xlsx");
        assert_eq!(resolve_filename("salida.csv"), "salida.csv");
        assert_eq!(resolve_filename("texto_extraido.xlsx"), "texto_extraido.xlsx");
    }

    #[test]
    fn test_exporter_for_extension() {
        let config = ExportConfig::default();
        assert_eq!(exporter_for("a.CSV", &config).extension(), "csv");
        assert_eq!(exporter_for("a.xlsx", &config).extension(), "xlsx");
        assert_eq!(exporter_for("a", &config).extension(), "xlsx");
    }

    #[test]
    fn test_records_respect_header_flag() {
        let grid = Grid::with_headers(vec!["A".to_string()], vec![vec!["1".to_string()]]);
        assert_eq!(records(&grid, true).count(), 2);
        assert_eq!(records(&grid, false).count(), 1);
        assert_eq!(records(&Grid::from_rows(vec![vec!["1".to_string()]]), true).count(), 1);
    }

    #[test]
    fn test_write_atomic_creates_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out");

        let path = write_atomic(&out, "t.csv", b"a,b\n").unwrap();
        assert_eq!(path, out.join("t.csv").canonicalize().unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n");

        let leftovers: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_atomic_rejects_names_outside_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        for name in ["../escape.csv", "sub/t.csv", "..", "/tmp/abs.csv", ""] {
            let err = write_atomic(&out, name, b"x").unwrap_err();
            assert!(matches!(err, ExportError::Write { .. }), "{:?}", name);
        }
        assert!(!dir.path().join("escape.csv").exists());
        assert!(!out.exists());
    }

    #[test]
    fn test_write_atomic_unusable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_atomic(&blocker.join("sub"), "t.csv", b"x").unwrap_err();
        assert!(matches!(err, ExportError::OutputDir { .. }));
    }
}
