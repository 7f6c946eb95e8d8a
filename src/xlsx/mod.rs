//! Spreadsheet input and output.

use std::path::Path;

use crate::error::MergeError;

mod reader;
mod styles;
mod writer;

pub(crate) use reader::load_document;
pub use styles::{SheetStyles, read_sheet_styles};
pub(crate) use writer::XlsxSink;
pub use writer::MERGED_SHEET_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xlsm,
    Xls,
}

impl SheetFormat {
    /// Extensions picked up by input discovery.
    pub const EXTENSIONS: [&'static str; 3] = ["xlsx", "xls", "xlsm"];

    pub fn from_path(path: &Path) -> Result<Self, MergeError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "xlsm" => Ok(Self::Xlsm),
            "xls" => Ok(Self::Xls),
            _ => Err(MergeError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Zip-packaged formats that carry a `styles.xml` part.
    pub fn is_ooxml(self) -> bool {
        matches!(self, Self::Xlsx | Self::Xlsm)
    }
}
