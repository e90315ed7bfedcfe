//! Core library for template-guided table extraction from document images.
//!
//! This crate provides:
//! - Grid templates and their JSON store
//! - Alignment, cell cropping and per-cell OCR with column-aware cleanup
//! - A fallback chain of extraction strategies (template, table structure, line clustering)
//! - Single-run orchestration on a worker thread
//! - XLSX and CSV export

pub mod error;
pub mod export;
pub mod grid;
pub mod input;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod template;

pub use error::{Result, SheetscanError};
pub use export::{exporter_for, CsvExporter, TableExporter, XlsxExporter};
pub use models::{Grid, RecognizedValue, SheetscanConfig};
pub use ocr::{LazyOcr, OcrBackend, RecognizeOptions, TextBox};
pub use pipeline::{
    CancelToken, Extraction, GridPipeline, RunEvent, RunHandle, RunOutcome, RunRequest, RunWorker,
};
pub use template::{Cell, GridSpec, TemplateStore, DEFAULT_TEMPLATE};

/// Re-export inference types.
pub use sheetscan_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use sheetscan_inference::OrtBackend;
