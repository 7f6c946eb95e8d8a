//! Cell styles of the first worksheet of an OOXML package.
//!
//! calamine only yields values, so presentation is read straight from the
//! package: `xl/styles.xml` provides the `cellXfs` table (fonts, fills,
//! borders, alignment and number formats resolved per record) and the sheet
//! part maps each `<c r=".." s="..">` to one of those records. Theme colours
//! are kept as theme references; legacy indexed colours resolve to RGB.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::MergeError;
use crate::model::{
    AlignmentStyle, BorderEdge, BorderStyle, CellStyle, ColorRef, FontStyle, NumberFormat,
};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const FIRST_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Default palette behind `indexed="N"`; 64 and up are system colours.
const INDEXED_PALETTE: [u32; 64] = [
    0x00_0000, 0xFF_FFFF, 0xFF_0000, 0x00_FF00, 0x00_00FF, 0xFF_FF00, 0xFF_00FF, 0x00_FFFF,
    0x00_0000, 0xFF_FFFF, 0xFF_0000, 0x00_FF00, 0x00_00FF, 0xFF_FF00, 0xFF_00FF, 0x00_FFFF,
    0x80_0000, 0x00_8000, 0x00_0080, 0x80_8000, 0x80_0080, 0x00_8080, 0xC0_C0C0, 0x80_8080,
    0x99_99FF, 0x99_3366, 0xFF_FFCC, 0xCC_FFFF, 0x66_0066, 0xFF_8080, 0x00_66CC, 0xCC_CCFF,
    0x00_0080, 0xFF_00FF, 0xFF_FF00, 0x00_FFFF, 0x80_0080, 0x80_0000, 0x00_8080, 0x00_00FF,
    0x00_CCFF, 0xCC_FFFF, 0xCC_FFCC, 0xFF_FF99, 0x99_CCFF, 0xFF_99CC, 0xCC_99FF, 0xFF_CC99,
    0x33_66FF, 0x33_CCCC, 0x99_CC00, 0xFF_CC00, 0xFF_9900, 0xFF_6600, 0x66_6699, 0x96_9696,
    0x00_3366, 0x33_9966, 0x00_3300, 0x33_3300, 0x99_3300, 0x99_3366, 0x33_3399, 0x33_3333,
];

/// Styles keyed by zero-based (row, column).
#[derive(Debug, Clone, Default)]
pub struct SheetStyles {
    cells: HashMap<(u32, u32), CellStyle>,
}

impl SheetStyles {
    #[must_use]
    pub fn style_at(&self, row: u32, col: u32) -> Option<&CellStyle> {
        self.cells.get(&(row, col))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

pub fn read_sheet_styles(bytes: &[u8]) -> Result<SheetStyles, MergeError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|error| MergeError::style_part("archive", error))?;

    let Some(styles_xml) = read_part(&mut archive, STYLES_PART)? else {
        return Ok(SheetStyles::default());
    };
    let cell_formats = parse_cell_formats(&styles_xml)?;

    let sheet_part = first_sheet_part(&mut archive)?;
    let sheet_xml = read_part(&mut archive, &sheet_part)?
        .ok_or_else(|| MergeError::style_part(&sheet_part, "part is missing"))?;

    parse_sheet_cells(&sheet_xml, &sheet_part, &cell_formats)
}

/// Zero-based (row, column) of an `A1`-style reference.
pub(crate) fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters.bytes().try_fold(0_u32, |acc, b| {
        acc.checked_mul(26)?
            .checked_add(u32::from(b.to_ascii_uppercase() - b'A') + 1)
    })?;
    let row = digits.parse::<u32>().ok()?.checked_sub(1)?;
    Some((row, col - 1))
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Option<String>, MergeError> {
    let mut file = match archive.by_name(part) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(MergeError::style_part(part, error)),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|error| MergeError::style_part(part, error))?;
    Ok(Some(xml))
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
}

fn first_element_attribute(
    xml: &str,
    part: &str,
    element: &[u8],
    matches: impl Fn(&BytesStart<'_>) -> bool,
    name: &[u8],
) -> Result<Option<String>, MergeError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader
            .read_event()
            .map_err(|error| MergeError::style_part(part, error))?
        {
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == element && matches(&e) =>
            {
                return Ok(attribute(&e, name));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Package path of the first `<sheet>` in workbook order.
fn first_sheet_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, MergeError> {
    let Some(workbook) = read_part(archive, WORKBOOK_PART)? else {
        return Ok(FIRST_SHEET_PART.to_string());
    };
    let Some(rel_id) = first_element_attribute(&workbook, WORKBOOK_PART, b"sheet", |_| true, b"id")?
    else {
        return Ok(FIRST_SHEET_PART.to_string());
    };
    let Some(rels) = read_part(archive, WORKBOOK_RELS_PART)? else {
        return Ok(FIRST_SHEET_PART.to_string());
    };

    let target = first_element_attribute(
        &rels,
        WORKBOOK_RELS_PART,
        b"Relationship",
        |e| attribute(e, b"Id").as_deref() == Some(rel_id.as_str()),
        b"Target",
    )?;

    Ok(target.map_or_else(
        || FIRST_SHEET_PART.to_string(),
        |target| match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{target}"),
        },
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    Ignored,
}

impl Section {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"numFmts" => Some(Self::NumFmts),
            b"fonts" => Some(Self::Fonts),
            b"fills" => Some(Self::Fills),
            b"borders" => Some(Self::Borders),
            b"cellXfs" => Some(Self::CellXfs),
            b"cellStyleXfs" | b"cellStyles" | b"dxfs" | b"tableStyles" | b"colors"
            | b"extLst" => Some(Self::Ignored),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"left" | b"start" => Some(Self::Left),
            b"right" | b"end" => Some(Self::Right),
            b"top" => Some(Self::Top),
            b"bottom" => Some(Self::Bottom),
            _ => None,
        }
    }

    fn set(self, border: &mut BorderStyle, edge: BorderEdge) {
        let slot = match self {
            Self::Left => &mut border.left,
            Self::Right => &mut border.right,
            Self::Top => &mut border.top,
            Self::Bottom => &mut border.bottom,
        };
        *slot = Some(edge);
    }
}

#[derive(Debug, Clone, Default)]
struct XfRecord {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    alignment: AlignmentStyle,
}

#[derive(Debug, Default)]
struct StyleTables {
    num_fmts: HashMap<u32, String>,
    fonts: Vec<FontStyle>,
    fills: Vec<Option<ColorRef>>,
    borders: Vec<BorderStyle>,
    xfs: Vec<XfRecord>,
}

impl StyleTables {
    fn resolve(&self, xf: &XfRecord) -> CellStyle {
        CellStyle {
            font: self.fonts.get(xf.font_id).cloned().unwrap_or_default(),
            fill: self.fills.get(xf.fill_id).copied().flatten(),
            border: self.borders.get(xf.border_id).cloned().unwrap_or_default(),
            alignment: xf.alignment.clone(),
            number_format: self.number_format(xf.num_fmt_id),
        }
    }

    fn number_format(&self, id: u32) -> Option<NumberFormat> {
        if id == 0 {
            return None;
        }
        if let Some(code) = self.num_fmts.get(&id) {
            return Some(NumberFormat::Custom(code.clone()));
        }
        u8::try_from(id).ok().map(NumberFormat::Builtin)
    }
}

#[derive(Debug, Default)]
struct StylesParser {
    section: Option<Section>,
    tables: StyleTables,
    font: Option<FontStyle>,
    fill: Option<(bool, Option<ColorRef>)>,
    border: Option<BorderStyle>,
    edge: Option<(Side, BorderEdge)>,
    xf: Option<XfRecord>,
}

impl StylesParser {
    fn section(&self) -> Section {
        self.section.unwrap_or(Section::Outside)
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        let name = e.local_name();
        let name = name.as_ref();

        if self.section() == Section::Outside {
            if !empty {
                self.section = Section::from_name(name);
            }
            return;
        }

        match self.section() {
            Section::NumFmts if name == b"numFmt" => {
                let id = attribute(e, b"numFmtId").and_then(|id| id.parse().ok());
                if let (Some(id), Some(code)) = (id, attribute(e, b"formatCode")) {
                    self.tables.num_fmts.insert(id, code);
                }
            }
            Section::Fonts => self.open_font_element(e, name, empty),
            Section::Fills => match name {
                b"fill" => {
                    self.fill = Some((false, None));
                    if empty {
                        self.close(name);
                    }
                }
                b"patternFill" => {
                    if let Some(fill) = &mut self.fill {
                        fill.0 = attribute(e, b"patternType").as_deref() == Some("solid");
                    }
                }
                b"fgColor" => {
                    if let Some(fill) = &mut self.fill {
                        fill.1 = parse_color(e);
                    }
                }
                _ => {}
            },
            Section::Borders => self.open_border_element(e, name, empty),
            Section::CellXfs => match name {
                b"xf" => {
                    let index = |key: &[u8]| {
                        attribute(e, key)
                            .and_then(|value| value.parse::<usize>().ok())
                            .unwrap_or_default()
                    };
                    self.xf = Some(XfRecord {
                        num_fmt_id: attribute(e, b"numFmtId")
                            .and_then(|value| value.parse().ok())
                            .unwrap_or_default(),
                        font_id: index(b"fontId"),
                        fill_id: index(b"fillId"),
                        border_id: index(b"borderId"),
                        alignment: AlignmentStyle::default(),
                    });
                    if empty {
                        self.close(name);
                    }
                }
                b"alignment" => {
                    if let Some(xf) = &mut self.xf {
                        xf.alignment = AlignmentStyle {
                            horizontal: attribute(e, b"horizontal"),
                            vertical: attribute(e, b"vertical"),
                            wrap_text: attribute(e, b"wrapText").is_some_and(|v| flag(&v)),
                        };
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn open_font_element(&mut self, e: &BytesStart<'_>, name: &[u8], empty: bool) {
        if name == b"font" {
            self.font = Some(FontStyle::default());
            if empty {
                self.close(name);
            }
            return;
        }

        let Some(font) = &mut self.font else {
            return;
        };
        let value = attribute(e, b"val");
        match name {
            b"b" => font.bold = value.as_deref().is_none_or(flag),
            b"i" => font.italic = value.as_deref().is_none_or(flag),
            b"strike" => font.strike = value.as_deref().is_none_or(flag),
            b"u" => {
                let underline = value.unwrap_or_else(|| "single".to_string());
                font.underline = (underline != "none").then_some(underline);
            }
            b"sz" => font.size = value.and_then(|size| size.parse().ok()),
            b"name" => font.name = value,
            b"color" => font.color = parse_color(e),
            _ => {}
        }
    }

    fn open_border_element(&mut self, e: &BytesStart<'_>, name: &[u8], empty: bool) {
        if name == b"border" {
            self.border = Some(BorderStyle::default());
            if empty {
                self.close(name);
            }
            return;
        }

        if let Some(side) = Side::from_name(name) {
            let style = attribute(e, b"style").unwrap_or_default();
            self.edge = Some((side, BorderEdge { style, color: None }));
            if empty {
                self.close(name);
            }
        } else if name == b"color" {
            if let Some((_, edge)) = &mut self.edge {
                edge.color = parse_color(e);
            }
        }
    }

    fn close(&mut self, name: &[u8]) {
        if Section::from_name(name).is_some_and(|section| Some(section) == self.section) {
            self.section = None;
            return;
        }

        match (self.section(), name) {
            (Section::Fonts, b"font") => {
                if let Some(font) = self.font.take() {
                    self.tables.fonts.push(font);
                }
            }
            (Section::Fills, b"fill") => {
                if let Some((solid, color)) = self.fill.take() {
                    self.tables.fills.push(color.filter(|_| solid));
                }
            }
            (Section::Borders, b"border") => {
                if let Some(border) = self.border.take() {
                    self.tables.borders.push(border);
                }
            }
            (Section::Borders, side) => {
                if Side::from_name(side).is_some() {
                    if let (Some((side, edge)), Some(border)) = (self.edge.take(), &mut self.border) {
                        if !edge.style.is_empty() && edge.style != "none" {
                            side.set(border, edge);
                        }
                    }
                }
            }
            (Section::CellXfs, b"xf") => {
                if let Some(xf) = self.xf.take() {
                    self.tables.xfs.push(xf);
                }
            }
            _ => {}
        }
    }
}

fn flag(value: &str) -> bool {
    !matches!(value, "0" | "false")
}

/// `FFRRGGBB` or `RRGGBB`.
fn parse_rgb(value: &str) -> Option<u32> {
    if value.len() < 6 {
        return None;
    }
    let hex = value.get(value.len() - 6..)?;
    u32::from_str_radix(hex, 16).ok()
}

/// Colour of a `<color>`, `<fgColor>` or border `<color>` element.
///
/// `rgb` wins over `theme`, which wins over `indexed`. `auto` and system
/// colours yield `None`.
fn parse_color(e: &BytesStart<'_>) -> Option<ColorRef> {
    if let Some(rgb) = attribute(e, b"rgb") {
        return parse_rgb(&rgb).map(ColorRef::Rgb);
    }
    if let Some(index) = attribute(e, b"theme").and_then(|value| value.parse::<u8>().ok()) {
        let tint = attribute(e, b"tint")
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or_default();
        return Some(ColorRef::Theme { index, tint });
    }
    attribute(e, b"indexed")
        .and_then(|value| value.parse::<usize>().ok())
        .and_then(|index| INDEXED_PALETTE.get(index).copied())
        .map(ColorRef::Rgb)
}

/// Resolved `cellXfs` table, indexed by a cell's `s` attribute.
fn parse_cell_formats(xml: &str) -> Result<Vec<CellStyle>, MergeError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = StylesParser::default();

    loop {
        match reader
            .read_event()
            .map_err(|error| MergeError::style_part(STYLES_PART, error))?
        {
            Event::Start(e) => parser.open(&e, false),
            Event::Empty(e) => parser.open(&e, true),
            Event::End(e) => parser.close(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    let tables = parser.tables;
    Ok(tables.xfs.iter().map(|xf| tables.resolve(xf)).collect())
}

fn parse_sheet_cells(
    xml: &str,
    part: &str,
    cell_formats: &[CellStyle],
) -> Result<SheetStyles, MergeError> {
    let mut reader = Reader::from_str(xml);
    let mut cells = HashMap::new();

    loop {
        match reader
            .read_event()
            .map_err(|error| MergeError::style_part(part, error))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let position = attribute(&e, b"r").as_deref().and_then(parse_cell_ref);
                let style = attribute(&e, b"s")
                    .and_then(|index| index.parse::<usize>().ok())
                    .and_then(|index| cell_formats.get(index));
                if let (Some(position), Some(style)) = (position, style) {
                    cells.insert(position, style.clone());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(SheetStyles { cells })
}
