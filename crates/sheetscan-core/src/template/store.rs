//! JSON-backed template persistence.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::GridSpec;
use crate::error::TemplateError;

/// Reserved name that is synthesized on first use instead of failing.
pub const DEFAULT_TEMPLATE: &str = "default_template";

/// Directory of `<name>.json` template records.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Open a store, creating its directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!("Template store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Persist a template and return the file it was written to.
    pub fn save(&self, spec: &GridSpec) -> Result<PathBuf, TemplateError> {
        spec.validate()?;
        let path = self.path_for(&spec.name);
        let content = serde_json::to_string_pretty(spec).map_err(|e| TemplateError::Parse {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, content)?;
        info!("Saved template '{}' ({} cells) to {}", spec.name, spec.cells.len(), path.display());
        Ok(path)
    }

    /// Load a template by name.
    ///
    /// A missing [`DEFAULT_TEMPLATE`] is created from
    /// [`GridSpec::builtin_default`] and saved; any other missing name is
    /// [`TemplateError::NotFound`].
    pub fn load(&self, name: &str) -> Result<GridSpec, TemplateError> {
        let path = self.path_for(name);
        if !path.exists() {
            if name == DEFAULT_TEMPLATE {
                info!("Creating built-in default template");
                let spec = GridSpec::builtin_default();
                self.save(&spec)?;
                return Ok(spec);
            }
            return Err(TemplateError::NotFound(name.to_string()));
        }
        Self::load_file(&path)
    }

    /// Load a template record from an explicit path.
    pub fn load_file(path: &Path) -> Result<GridSpec, TemplateError> {
        if !path.exists() {
            return Err(TemplateError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let spec: GridSpec = serde_json::from_str(&content).map_err(|e| TemplateError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        spec.validate()?;
        debug!(
            "Loaded template '{}' ({}x{}, normalized={}, {} cells)",
            spec.name,
            spec.width,
            spec.height,
            spec.normalized,
            spec.cells.len()
        );
        Ok(spec)
    }

    /// Resolve either a stored name or a path to a `.json` record.
    pub fn resolve(&self, name_or_path: &str) -> Result<GridSpec, TemplateError> {
        let candidate = Path::new(name_or_path);
        let is_path = candidate
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            || candidate.components().count() > 1;
        if is_path {
            Self::load_file(candidate)
        } else {
            self.load(name_or_path)
        }
    }

    /// Names of all stored templates, sorted.
    pub fn list(&self) -> Result<Vec<String>, TemplateError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Cell;
    use pretty_assertions::assert_eq;

    fn three_by_four(name: &str) -> GridSpec {
        let labels = ["Etiqueta", "DXO", "Marca", "Peso"];
        let mut cells = Vec::new();
        for row in 1..=3u32 {
            for (i, label) in labels.iter().enumerate() {
                let x = 0.05 + i as f64 * 0.24;
                let y = 0.1 + (row - 1) as f64 * 0.25;
                cells.push(Cell::new(row, i as u32 + 1, x, y, 0.2, 0.2).named(*label));
            }
        }
        GridSpec {
            name: name.to_string(),
            width: 1000,
            height: 800,
            normalized: true,
            cells,
        }
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("templates");
        TemplateStore::new(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();
        let spec = three_by_four("inventory");

        let path = store.save(&spec).unwrap();
        assert_eq!(path, dir.path().join("inventory.json"));

        let loaded = store.load("inventory").unwrap();
        assert_eq!(loaded, spec);
        assert_eq!(loaded.cells.len(), 12);
        assert!(loaded.normalized);
    }

    #[test]
    fn test_round_trip_arbitrary_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();

        // xorshift64 in [0, 1)
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };

        for n in 0..50 {
            let mut spec = three_by_four(&format!("random_{}", n));
            for cell in &mut spec.cells {
                cell.w = next() * 0.5 + 1e-9;
                cell.h = next() * 0.5 + 1e-9;
                cell.x = next() * (1.0 - cell.w) * 0.99;
                cell.y = next() * (1.0 - cell.h) * 0.99;
            }

            store.save(&spec).unwrap();
            assert_eq!(store.load(&spec.name).unwrap(), spec);
        }
    }

    #[test]
    fn test_save_rejects_names_leaving_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path().join("templates")).unwrap();

        for name in ["../escape", "sub/inner", "..", ".hidden", "a\\b"] {
            let spec = three_by_four(name);
            assert!(
                matches!(store.save(&spec), Err(TemplateError::Invalid { .. })),
                "{}",
                name
            );
        }
        assert!(!dir.path().join("escape.json").exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();
        assert!(matches!(store.load("nope"), Err(TemplateError::NotFound(n)) if n == "nope"));
    }

    #[test]
    fn test_default_template_is_synthesized_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();

        let spec = store.load(DEFAULT_TEMPLATE).unwrap();
        assert_eq!(spec, GridSpec::builtin_default());
        assert!(store.path_for(DEFAULT_TEMPLATE).exists());
        assert_eq!(store.list().unwrap(), vec![DEFAULT_TEMPLATE.to_string()]);
    }

    #[test]
    fn test_legacy_record_loads_as_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();
        std::fs::write(
            store.path_for("legacy"),
            r#"{"name":"legacy","width":640,"height":480,
                "cells":[{"row":1,"col":1,"x":12,"y":8,"w":100,"h":30,"name":null}]}"#,
        )
        .unwrap();

        let spec = store.load("legacy").unwrap();
        assert!(!spec.normalized);
        assert_eq!(spec.cells[0].name, None);
    }

    #[test]
    fn test_corrupt_record_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();
        std::fs::write(store.path_for("broken"), "{ not json").unwrap();
        assert!(matches!(store.load("broken"), Err(TemplateError::Parse { .. })));
    }

    #[test]
    fn test_resolve_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path().join("store")).unwrap();
        let external = dir.path().join("external.json");
        std::fs::write(&external, serde_json::to_string(&three_by_four("ext")).unwrap()).unwrap();

        let spec = store.resolve(external.to_str().unwrap()).unwrap();
        assert_eq!(spec.name, "ext");
        assert!(store.list().unwrap().is_empty());
    }
}
