use crate::error::MergeError;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Trimmed display text; integral numbers render without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) => value.trim().to_string(),
            Self::Number(value) => format_number(*value),
            Self::Bool(value) => if *value { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    /// Text view used by the address pipeline; blank cells read as absent.
    pub fn as_optional_text(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.as_text())
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// A colour as the style part stores it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorRef {
    /// 0xRRGGBB. Legacy indexed colours resolve to this.
    Rgb(u32),
    /// Theme slot plus a lightness tint in `-1.0..=1.0`.
    Theme { index: u8, tint: f64 },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontStyle {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    /// OOXML underline token ("single", "double", ...).
    pub underline: Option<String>,
    pub strike: bool,
    pub color: Option<ColorRef>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderEdge {
    /// OOXML border style token ("thin", "medium", "dashed", ...).
    pub style: String,
    pub color: Option<ColorRef>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderStyle {
    pub left: Option<BorderEdge>,
    pub right: Option<BorderEdge>,
    pub top: Option<BorderEdge>,
    pub bottom: Option<BorderEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlignmentStyle {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberFormat {
    Builtin(u8),
    Custom(String),
}

/// Presentation attributes of a cell, copied as a unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub font: FontStyle,
    pub fill: Option<ColorRef>,
    pub border: BorderStyle,
    pub alignment: AlignmentStyle,
    pub number_format: Option<NumberFormat>,
}

impl CellStyle {
    pub fn bold() -> Self {
        Self {
            font: FontStyle {
                bold: true,
                ..FontStyle::default()
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(value: CellValue, style: CellStyle) -> Self {
        Self { value, style }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(CellValue::Text(value.into()), CellStyle::default())
    }
}

pub type Row = Vec<Cell>;

pub(crate) fn row_is_blank(row: &[Cell]) -> bool {
    row.iter().all(|cell| cell.value.is_blank())
}

/// Outcome of loading one input file.
#[derive(Debug)]
pub struct SourceDocument {
    pub name: String,
    pub content: Result<Vec<Row>, MergeError>,
}

impl SourceDocument {
    pub fn loaded(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            content: Ok(rows),
        }
    }

    pub fn failed(name: impl Into<String>, error: MergeError) -> Self {
        Self {
            name: name.into(),
            content: Err(error),
        }
    }
}
