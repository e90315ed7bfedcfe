//! Configuration structures for the extraction pipeline.
//!
//! [`SheetscanConfig`] is only the on-disk aggregate. Components take the
//! slice they need ([`GridConfig`] for the extractor and recognizer,
//! [`LayoutConfig`] for line clustering, and so on), never the whole struct.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetscanConfig {
    /// OCR capability settings.
    pub ocr: OcrConfig,

    /// Model file locations.
    pub models: ModelConfig,

    /// Template-guided cropping and cell preprocessing.
    pub grid: GridConfig,

    /// Word-to-row clustering used by the last fallback strategy.
    pub layout: LayoutConfig,

    /// Model-free table structure detection.
    pub structure: StructureConfig,

    /// Template store location.
    pub templates: TemplateConfig,

    /// Spreadsheet output.
    pub export: ExportConfig,
}

/// OCR capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Language code passed to the OCR backend (e.g. "es", "en").
    pub language: String,

    /// Ask the backend to correct upside-down text.
    pub classify_angle: bool,

    /// Detections below this confidence are dropped (0.0 - 1.0).
    pub min_confidence: f32,

    /// Keep `[UNK]` tokens emitted by the recognizer instead of blanking them.
    pub keep_unknown: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            classify_angle: true,
            min_confidence: 0.0, // CTC confidences run low on short cells
            keep_unknown: false,
        }
    }
}

/// Model file names and directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Angle classification model file name (optional at runtime).
    pub classification_model: String,

    /// Table structure model file name (optional at runtime).
    pub table_model: String,

    /// Structure token dictionary for the table model.
    pub table_dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            classification_model: "cls.onnx".to_string(),
            table_model: "table.onnx".to_string(),
            table_dictionary: "table_dict.txt".to_string(),
        }
    }
}

impl ModelConfig {
    /// Recognition model family for a language code.
    ///
    /// Romance languages share the Latin recognizer; anything else maps to a
    /// model named after the code itself.
    pub fn language_family(language: &str) -> String {
        let lang = language.trim().to_lowercase();
        match lang.as_str() {
            "" => "en".to_string(),
            "es" | "pt" | "it" | "ca" | "ro" | "nl" => "latin".to_string(),
            _ => lang,
        }
    }

    pub fn detection_path(&self) -> PathBuf {
        self.model_dir.join(&self.detection_model)
    }

    pub fn recognition_path(&self, language: &str) -> PathBuf {
        self.model_dir
            .join(format!("{}_rec.onnx", Self::language_family(language)))
    }

    pub fn dictionary_path(&self, language: &str) -> PathBuf {
        self.model_dir
            .join(format!("{}_dict.txt", Self::language_family(language)))
    }

    pub fn classification_path(&self) -> PathBuf {
        self.model_dir.join(&self.classification_model)
    }

    pub fn table_path(&self) -> PathBuf {
        self.model_dir.join(&self.table_model)
    }

    pub fn table_dictionary_path(&self) -> PathBuf {
        self.model_dir.join(&self.table_dictionary)
    }
}

/// Cropping and per-cell preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Pixels added on every side of a cell before cropping.
    pub pad: u32,

    /// Crops with a side below this are upscaled before OCR.
    pub min_cell_side: u32,

    /// Gaussian smoothing sigma applied before thresholding.
    pub blur_sigma: f32,

    /// Side of the local window used by adaptive thresholding (odd).
    pub threshold_block: u32,

    /// Offset subtracted from the local mean.
    pub threshold_offset: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            pad: 6,
            min_cell_side: 20,
            blur_sigma: 0.8,
            threshold_block: 11,
            threshold_offset: 2,
        }
    }
}

/// Line clustering for the plain-OCR strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Maximum cells per row; excess words are merged into the last cell.
    pub max_columns: Option<usize>,

    /// Lower bound of the vertical grouping threshold, in pixels.
    pub min_row_threshold: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_columns: None,
            min_row_threshold: 4.0,
        }
    }
}

/// Model-free ruled table detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Run the structure-detection strategy at all.
    pub enabled: bool,

    /// Fraction of a row/column that must be dark to count as a ruling line.
    pub line_coverage: f32,

    /// Cells narrower or shorter than this are ignored.
    pub min_cell_side: u32,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            line_coverage: 0.6,
            min_cell_side: 8,
        }
    }
}

/// Template store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub dir: PathBuf,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates"),
        }
    }
}

/// Spreadsheet output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output file name.
    pub output_filename: String,

    /// Worksheet name for xlsx output.
    pub sheet_name: String,

    /// Write column names as the first row when the grid has them.
    pub write_headers: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_filename: "texto_extraido.xlsx".to_string(),
            sheet_name: "Extracted Data".to_string(),
            write_headers: true,
        }
    }
}

impl SheetscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
