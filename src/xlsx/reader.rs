use std::fs;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Sheets, Xls, XlsError, open_workbook_auto_from_rs};
use tracing::{debug, info, warn};

use super::SheetFormat;
use super::styles::{SheetStyles, read_sheet_styles};
use crate::crypto;
use crate::error::MergeError;
use crate::model::{Cell, CellValue, Row, SourceDocument};

/// Loads the first sheet of `path`; failures are captured in the document.
pub(crate) fn load_document(path: &Path, password: &str) -> SourceDocument {
    let name = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    match read_document(path, &name, password) {
        Ok(rows) => SourceDocument::loaded(name, rows),
        Err(error) => {
            warn!("{name}: {error}");
            SourceDocument::failed(name, error)
        }
    }
}

fn read_document(path: &Path, name: &str, password: &str) -> Result<Vec<Row>, MergeError> {
    let format = SheetFormat::from_path(path)?;
    let mut bytes = fs::read(path)?;

    if crypto::is_encrypted(&bytes, format) {
        info!("{name}: workbook is password protected, decrypting");
        bytes = crypto::decrypt(bytes, password)?;
    }

    read_rows(bytes, format)
}

/// Reads styled rows of the first sheet at their absolute positions.
///
/// Leading blank rows and columns are kept so row and column indices match
/// the sheet. Trailing unstyled empty cells are dropped.
pub(crate) fn read_rows(bytes: Vec<u8>, format: SheetFormat) -> Result<Vec<Row>, MergeError> {
    let styles = if format.is_ooxml() {
        read_sheet_styles(&bytes).unwrap_or_else(|error| {
            warn!("{error}; using default cell styles");
            SheetStyles::default()
        })
    } else {
        SheetStyles::default()
    };

    let mut workbook = open_workbook(bytes, format)?;
    let range = workbook.worksheet_range_at(0).ok_or(MergeError::NoSheets)??;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };

    let mut rows = (0..start_row).map(|_| Row::new()).collect::<Vec<_>>();
    for (row_index, data_row) in (start_row..).zip(range.rows()) {
        let styled = |col: u32, value: CellValue| {
            Cell::new(value, styles.style_at(row_index, col).cloned().unwrap_or_default())
        };

        let mut row = (0..start_col)
            .map(|col| styled(col, CellValue::Empty))
            .collect::<Row>();
        row.extend(
            (start_col..)
                .zip(data_row)
                .map(|(col, data)| styled(col, cell_value(data))),
        );

        while row
            .last()
            .is_some_and(|cell| cell.value == CellValue::Empty && cell.style == Default::default())
        {
            row.pop();
        }
        rows.push(row);
    }

    Ok(rows)
}

/// `.xls` is opened as BIFF first so a protected workbook is reported as
/// such; everything else goes through format detection.
fn open_workbook(
    bytes: Vec<u8>,
    format: SheetFormat,
) -> Result<Sheets<Cursor<Vec<u8>>>, MergeError> {
    let cursor = Cursor::new(bytes);
    if format == SheetFormat::Xls {
        match Xls::new(cursor.clone()) {
            Ok(workbook) => return Ok(Sheets::Xls(workbook)),
            Err(XlsError::Password) => return Err(MergeError::ProtectedXls),
            Err(error) => debug!("not a BIFF workbook ({error}), detecting format"),
        }
    }
    Ok(open_workbook_auto_from_rs(cursor)?)
}

#[allow(clippy::cast_precision_loss)]
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            CellValue::Text(value.clone())
        }
        Data::Float(value) => CellValue::Number(*value),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Bool(value) => CellValue::Bool(*value),
        // Serial number; the cell's number format keeps it a date.
        Data::DateTime(value) => CellValue::Number(value.as_f64()),
        Data::Error(error) => CellValue::Text(error.to_string()),
    }
}
