//! Data models shared across the pipeline.

pub mod config;
pub mod grid;

pub use config::{
    ExportConfig, GridConfig, LayoutConfig, ModelConfig, OcrConfig, SheetscanConfig,
    StructureConfig, TemplateConfig,
};
pub use grid::{Grid, RecognizedValue};
