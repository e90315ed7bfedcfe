//! Column-aware cleanup of recognized cell text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NOISE: Regex = Regex::new(r"[^\w\s\-\.]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref WEIGHT: Regex = Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(?:kg|g|lbs|lb)?").unwrap();
}

/// Cleanup rule selected by column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Numeric value, unit dropped.
    Weight,
    /// Upper-case alphanumerics only.
    Code,
    /// Each word capitalized.
    Brand,
    /// Cleaned text as is.
    Label,
}

/// Lower-case column names and the rule they select. Unknown names are labels.
const COLUMN_KINDS: &[(&str, ColumnKind)] = &[
    ("peso", ColumnKind::Weight),
    ("weight", ColumnKind::Weight),
    ("dxo", ColumnKind::Code),
    ("codigo", ColumnKind::Code),
    ("code", ColumnKind::Code),
    ("marca", ColumnKind::Brand),
    ("brand", ColumnKind::Brand),
    ("etiqueta", ColumnKind::Label),
    ("label", ColumnKind::Label),
    ("tag", ColumnKind::Label),
];

impl ColumnKind {
    /// Exact, case-insensitive match on the column name.
    pub fn for_column(name: &str) -> Self {
        let name = name.to_lowercase();
        COLUMN_KINDS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, kind)| kind)
            .unwrap_or(ColumnKind::Label)
    }

    /// Apply this rule to already cleaned text.
    fn apply(self, cleaned: &str) -> String {
        match self {
            ColumnKind::Weight => weight(cleaned),
            ColumnKind::Code => cleaned
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_uppercase)
                .collect(),
            ColumnKind::Brand => cleaned
                .split_whitespace()
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
            ColumnKind::Label => cleaned.to_string(),
        }
    }
}

/// Clean raw OCR text for the given column.
pub fn postprocess(column_name: &str, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return cleaned;
    }
    ColumnKind::for_column(column_name).apply(&cleaned)
}

/// Drop OCR noise characters and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let stripped = NOISE.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// First number in the text, unit dropped; text without digits is kept.
fn weight(cleaned: &str) -> String {
    match WEIGHT.captures(cleaned) {
        Some(caps) => caps[1].to_string(),
        None => cleaned.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
