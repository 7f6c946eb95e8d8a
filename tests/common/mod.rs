use std::error::Error;
use std::path::Path;

use calamine::{Reader, Xlsx, open_workbook};
use order_sheet_merge::MERGED_SHEET_NAME;
use rust_xlsxwriter::{Color, Format, Workbook};

pub const HEADER: [&str; 4] = ["跟团号", "下单人", "详细地址", "自提点"];

/// Writes `rows` from A1 down; empty strings leave the cell blank.
pub fn create_test_workbook(path: &Path, rows: &[Vec<&str>]) -> Result<(), Box<dyn Error>> {
    create_styled_workbook(path, rows, None)
}

/// Like [`create_test_workbook`], with `styled_row` bold on a yellow fill.
pub fn create_styled_workbook(
    path: &Path,
    rows: &[Vec<&str>],
    styled_row: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let highlight = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x00FF_FF00));

    for (row_index, row) in (0_u32..).zip(rows) {
        for (col, value) in (0_u16..).zip(row) {
            if value.is_empty() {
                continue;
            }
            if styled_row == Some(row_index) {
                sheet.write_string_with_format(row_index, col, *value, &highlight)?;
            } else {
                sheet.write_string(row_index, col, *value)?;
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Display text of every row of the merged sheet.
pub fn read_output_rows(path: &Path) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range(MERGED_SHEET_NAME)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect())
}
