//! Template-driven cell extraction and the text cleanup around it.
//!
//! The stages run in order: [`ResizeAligner`] brings the page to the
//! template's canonical size, [`GridExtractor`] crops each declared cell,
//! [`CellRecognizer`] reads it, [`postprocess`] cleans the text per column
//! and [`reconstruct`] lays the values out as a [`Grid`](crate::models::Grid).
//! [`LineClusterer`] is the template-free alternative for loose words.

mod aligner;
mod clustering;
mod extractor;
mod postprocess;
mod recognizer;
mod rows;

pub use aligner::{AlignedImage, Aligner, ResizeAligner};
pub use clustering::LineClusterer;
pub use extractor::{pixel_bounds, CellCrop, GridExtractor, PixelBounds};
pub use postprocess::{clean_text, postprocess, ColumnKind};
pub use recognizer::CellRecognizer;
pub use rows::reconstruct;
