use std::collections::BTreeMap;
use std::path::Path;

use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatPattern, FormatUnderline, Workbook, Worksheet,
};
use tracing::debug;

use crate::error::MergeError;
use crate::model::{BorderEdge, CellStyle, CellValue, ColorRef, NumberFormat};
use crate::sink::SheetSink;

pub const MERGED_SHEET_NAME: &str = "Merged Data";

/// Widest auto-sized column, in characters.
pub(crate) const MAX_COLUMN_WIDTH: u16 = 50;

/// Buffers the merged sheet and writes it as a single-sheet workbook.
pub struct XlsxSink {
    worksheet: Worksheet,
    widths: BTreeMap<u16, usize>,
    rows: u32,
}

impl XlsxSink {
    pub fn new() -> Result<Self, MergeError> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(MERGED_SHEET_NAME)?;
        Ok(Self {
            worksheet,
            widths: BTreeMap::new(),
            rows: 0,
        })
    }

    /// Sizes every column to its longest text and saves the workbook.
    pub fn save(mut self, path: &Path) -> Result<(), MergeError> {
        for (&col, &chars) in &self.widths {
            let width = u16::try_from(chars + 2)
                .unwrap_or(u16::MAX)
                .min(MAX_COLUMN_WIDTH);
            self.worksheet.set_column_width(col, width)?;
        }

        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.worksheet);
        workbook.save(path)?;
        debug!("saved {} rows to {}", self.rows, path.display());
        Ok(())
    }
}

impl SheetSink for XlsxSink {
    fn write_cell(
        &mut self,
        row: u32,
        col: u16,
        value: &CellValue,
        style: &CellStyle,
    ) -> Result<(), MergeError> {
        let format = to_format(style);
        match value {
            CellValue::Empty => {
                if *style != CellStyle::default() {
                    self.worksheet.write_blank(row, col, &format)?;
                }
            }
            CellValue::Text(text) => {
                self.worksheet.write_string_with_format(row, col, text, &format)?;
            }
            CellValue::Number(number) => {
                self.worksheet.write_number_with_format(row, col, *number, &format)?;
            }
            CellValue::Bool(flag) => {
                self.worksheet.write_boolean_with_format(row, col, *flag, &format)?;
            }
        }

        let chars = value.as_text().chars().count();
        let width = self.widths.entry(col).or_default();
        *width = (*width).max(chars);
        self.rows = self.rows.max(row + 1);
        Ok(())
    }
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    let font = &style.font;

    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if font.strike {
        format = format.set_font_strikethrough();
    }
    if let Some(underline) = &font.underline {
        format = format.set_underline(underline_style(underline));
    }
    if let Some(name) = &font.name {
        format = format.set_font_name(name);
    }
    if let Some(size) = font.size {
        format = format.set_font_size(size);
    }
    if let Some(color) = font.color.and_then(to_color) {
        format = format.set_font_color(color);
    }

    if let Some(fill) = style.fill.and_then(to_color) {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(fill);
    }

    let border = &style.border;
    if let Some(edge) = &border.left {
        format = format.set_border_left(border_style(edge));
        if let Some(color) = edge.color.and_then(to_color) {
            format = format.set_border_left_color(color);
        }
    }
    if let Some(edge) = &border.right {
        format = format.set_border_right(border_style(edge));
        if let Some(color) = edge.color.and_then(to_color) {
            format = format.set_border_right_color(color);
        }
    }
    if let Some(edge) = &border.top {
        format = format.set_border_top(border_style(edge));
        if let Some(color) = edge.color.and_then(to_color) {
            format = format.set_border_top_color(color);
        }
    }
    if let Some(edge) = &border.bottom {
        format = format.set_border_bottom(border_style(edge));
        if let Some(color) = edge.color.and_then(to_color) {
            format = format.set_border_bottom_color(color);
        }
    }

    let alignment = &style.alignment;
    if let Some(align) = alignment.horizontal.as_deref().and_then(horizontal_align) {
        format = format.set_align(align);
    }
    if let Some(align) = alignment.vertical.as_deref().and_then(vertical_align) {
        format = format.set_align(align);
    }
    if alignment.wrap_text {
        format = format.set_text_wrap();
    }

    match &style.number_format {
        Some(NumberFormat::Builtin(index)) => format = format.set_num_format_index(*index),
        Some(NumberFormat::Custom(code)) => format = format.set_num_format(code),
        None => {}
    }

    format
}

/// Theme references outside the ten palette columns are dropped.
fn to_color(color: ColorRef) -> Option<Color> {
    match color {
        ColorRef::Rgb(rgb) => Some(Color::RGB(rgb)),
        ColorRef::Theme { index, tint } if index <= 9 => {
            Some(Color::Theme(index, theme_shade(index, tint)))
        }
        ColorRef::Theme { .. } => None,
    }
}

/// Palette row (0..=5) whose tint is closest to `tint`.
fn theme_shade(index: u8, tint: f64) -> u8 {
    let tints: [f64; 6] = match index {
        0 => [0.0, -0.05, -0.15, -0.25, -0.35, -0.5],
        1 => [0.0, 0.5, 0.35, 0.25, 0.15, 0.05],
        2 => [0.0, -0.1, -0.25, -0.5, -0.75, -0.9],
        _ => [0.0, 0.8, 0.6, 0.4, -0.25, -0.5],
    };
    (0_u8..6)
        .zip(tints)
        .min_by(|(_, a), (_, b)| (a - tint).abs().total_cmp(&(b - tint).abs()))
        .map_or(0, |(shade, _)| shade)
}

fn underline_style(token: &str) -> FormatUnderline {
    match token {
        "double" => FormatUnderline::Double,
        "singleAccounting" => FormatUnderline::SingleAccounting,
        "doubleAccounting" => FormatUnderline::DoubleAccounting,
        _ => FormatUnderline::Single,
    }
}

fn border_style(edge: &BorderEdge) -> FormatBorder {
    match edge.style.as_str() {
        "medium" => FormatBorder::Medium,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "hair" => FormatBorder::Hair,
        "mediumDashed" => FormatBorder::MediumDashed,
        "dashDot" => FormatBorder::DashDot,
        "mediumDashDot" => FormatBorder::MediumDashDot,
        "dashDotDot" => FormatBorder::DashDotDot,
        "mediumDashDotDot" => FormatBorder::MediumDashDotDot,
        "slantDashDot" => FormatBorder::SlantDashDot,
        _ => FormatBorder::Thin,
    }
}

fn horizontal_align(token: &str) -> Option<FormatAlign> {
    match token {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "centerContinuous" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

fn vertical_align(token: &str) -> Option<FormatAlign> {
    match token {
        "top" => Some(FormatAlign::Top),
        "center" => Some(FormatAlign::VerticalCenter),
        "bottom" => Some(FormatAlign::Bottom),
        "justify" => Some(FormatAlign::VerticalJustify),
        "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use tempfile::tempdir;

    use super::{MERGED_SHEET_NAME, XlsxSink, theme_shade};
    use crate::model::{CellStyle, CellValue, ColorRef, FontStyle};
    use crate::sink::SheetSink;
    use crate::xlsx::read_sheet_styles;

    #[test]
    fn saves_merged_sheet_with_values_and_styles() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("1.xlsx");

        let mut sink = XlsxSink::new().expect("sink");
        let header = CellStyle {
            fill: Some(ColorRef::Rgb(0x00FF_FF00)),
            ..CellStyle::bold()
        };
        sink.write_cell(0, 0, &CellValue::Text("跟团号".into()), &header)
            .expect("write header");
        sink.write_cell(1, 0, &CellValue::Number(3.0), &CellStyle::default())
            .expect("write number");
        sink.write_cell(1, 1, &CellValue::Empty, &CellStyle::default())
            .expect("write blank");
        sink.save(&path).expect("save");

        let mut workbook: Xlsx<_> = open_workbook(&path).expect("open output");
        assert_eq!(workbook.sheet_names(), vec![MERGED_SHEET_NAME.to_string()]);
        let range = workbook
            .worksheet_range(MERGED_SHEET_NAME)
            .expect("merged sheet");
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("跟团号".into())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(3.0)));

        let bytes = std::fs::read(&path).expect("read output");
        let styles = read_sheet_styles(&bytes).expect("styles");
        let style = styles.style_at(0, 0).expect("header style");
        assert!(style.font.bold);
        assert_eq!(style.fill, Some(ColorRef::Rgb(0x00FF_FF00)));
    }

    #[test]
    fn theme_colours_are_written_back_as_theme_references() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("1.xlsx");

        let themed = CellStyle {
            font: FontStyle {
                color: Some(ColorRef::Theme { index: 0, tint: 0.0 }),
                ..FontStyle::default()
            },
            fill: Some(ColorRef::Theme {
                index: 5,
                tint: 0.399_975_585_192_419_2,
            }),
            ..CellStyle::default()
        };
        let mut sink = XlsxSink::new().expect("sink");
        sink.write_cell(0, 0, &CellValue::Text("自提点".into()), &themed)
            .expect("write cell");
        sink.save(&path).expect("save");

        let bytes = std::fs::read(&path).expect("read output");
        let styles = read_sheet_styles(&bytes).expect("styles");
        let style = styles.style_at(0, 0).expect("themed cell");
        assert_eq!(style.font.color, Some(ColorRef::Theme { index: 0, tint: 0.0 }));
        let Some(ColorRef::Theme { index, tint }) = style.fill else {
            panic!("expected a theme fill, got {:?}", style.fill);
        };
        assert_eq!(index, 5);
        assert!((tint - 0.4).abs() < 1e-4, "tint {tint}");
    }

    #[test]
    fn tints_snap_to_the_nearest_palette_shade() {
        assert_eq!(theme_shade(4, 0.0), 0);
        assert_eq!(theme_shade(4, 0.799_98), 1);
        assert_eq!(theme_shade(4, -0.499_98), 5);
        assert_eq!(theme_shade(0, -0.149_99), 2);
        assert_eq!(theme_shade(1, 0.049_98), 5);
        assert_eq!(theme_shade(2, -0.9), 5);
    }
}
