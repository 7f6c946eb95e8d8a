use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decrypt workbook: {0}")]
    Decrypt(String),

    #[error("workbook is password protected (legacy .xls not supported)")]
    ProtectedXls,

    #[error("failed to parse workbook: {0}")]
    Parse(#[from] calamine::Error),

    #[error("failed to read workbook part '{part}': {message}")]
    StylePart { part: String, message: String },

    #[error("unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("row has {0} columns, more than a worksheet can hold")]
    TooManyColumns(usize),

    #[error("failed to write output workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid address rule: {0}")]
    InvalidRule(String),
}

impl MergeError {
    pub(crate) fn style_part(part: &str, message: impl ToString) -> Self {
        Self::StylePart {
            part: part.to_string(),
            message: message.to_string(),
        }
    }
}
