//! Error types for the sheetscan-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the sheetscan library.
#[derive(Error, Debug)]
pub enum SheetscanError {
    /// Template lookup or persistence error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Input image could not be loaded.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// OCR capability error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Grid extraction error.
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Spreadsheet export error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to grid templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No stored template has this name.
    #[error("template not found: {0}")]
    NotFound(String),

    /// The template breaks a geometry invariant.
    #[error("invalid template '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// The stored record could not be parsed.
    #[error("failed to parse template {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to read or write the backing store.
    #[error("template store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to loading the input document.
#[derive(Error, Debug)]
pub enum InputError {
    /// The input path does not exist.
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but is not decodable raster data.
    #[error("failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// The PDF could not be parsed or holds no usable page image.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The file extension is not a supported input type.
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Errors related to the OCR capability and its auxiliary models.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The OCR backend is not available in this build or configuration.
    #[error("OCR backend unavailable: {0}")]
    Unavailable(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Table structure could not be determined.
    #[error("table structure not found: {0}")]
    NoStructure(String),
}

impl From<sheetscan_inference::InferenceError> for OcrError {
    fn from(err: sheetscan_inference::InferenceError) -> Self {
        match err {
            sheetscan_inference::InferenceError::ModelLoad(msg)
            | sheetscan_inference::InferenceError::SessionCreate(msg) => OcrError::ModelLoad(msg),
            other => OcrError::Recognition(other.to_string()),
        }
    }
}

/// Errors raised by the extraction strategies and their orchestration.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Every strategy failed or produced an empty grid.
    #[error("no strategy extracted any text (tried: {})", tried.join(", "))]
    ExtractionFailed { tried: Vec<String> },

    /// The run was cancelled between cells.
    #[error("run cancelled")]
    Cancelled,

    /// A run is already in flight.
    #[error("a run is already in progress")]
    Busy,

    /// A single strategy failed; recovered by the fallback chain.
    #[error("{strategy} strategy failed: {reason}")]
    Strategy { strategy: String, reason: String },

    /// The worker thread panicked or disconnected.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Errors related to writing the output spreadsheet.
#[derive(Error, Debug)]
pub enum ExportError {
    /// There is nothing to write.
    #[error("grid is empty: nothing to export")]
    EmptyGrid,

    /// The output directory could not be created or used.
    #[error("output directory {path} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing or persisting the file failed.
    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// XLSX serialization failed.
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// CSV serialization failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for the sheetscan library.
pub type Result<T> = std::result::Result<T, SheetscanError>;
