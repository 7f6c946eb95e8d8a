use tracing::{debug, info, warn};

use crate::address::{AddressNormalizer, NormalizedAddress};
use crate::error::MergeError;
use crate::header::{HeaderClassifier, KeywordClassifier, find_header_row};
use crate::model::{CellStyle, CellValue, Row, SourceDocument, row_is_blank};
use crate::report::{EMPTY_DOCUMENT, NO_DATA_ROWS, RunStatistics};
use crate::schema::{CanonicalSchema, ColumnIndexMap, extract_header, resolve_columns};
use crate::sink::SheetSink;

struct DetectedHeader {
    index: usize,
    columns: ColumnIndexMap,
}

enum ScannedDocument<'a> {
    Failed {
        name: &'a str,
        reason: String,
    },
    Ready {
        name: &'a str,
        rows: &'a [Row],
        header: Option<DetectedHeader>,
    },
}

/// Drives the merge of ordered source documents into one sheet.
pub struct Merger<C = KeywordClassifier> {
    classifier: C,
    normalizer: AddressNormalizer,
}

impl Merger<KeywordClassifier> {
    pub fn new(normalizer: AddressNormalizer) -> Self {
        Self::with_classifier(KeywordClassifier::default(), normalizer)
    }
}

impl<C: HeaderClassifier> Merger<C> {
    pub fn with_classifier(classifier: C, normalizer: AddressNormalizer) -> Self {
        Self {
            classifier,
            normalizer,
        }
    }

    /// Writes the canonical header followed by every retained data row.
    ///
    /// The canonical schema is settled before anything is written, from the
    /// first document (in the given order) whose header is detected. Documents
    /// that fail are recorded and skipped; only sink errors abort the run.
    pub fn merge<S>(
        &self,
        documents: &[SourceDocument],
        sink: &mut S,
    ) -> Result<RunStatistics, MergeError>
    where
        S: SheetSink + ?Sized,
    {
        let scanned = documents
            .iter()
            .map(|document| self.scan(document))
            .collect::<Vec<_>>();
        let schema = establish_schema(&scanned);

        let mut stats = RunStatistics::default();
        let mut cursor = 0_u32;

        if let Some(schema) = &schema {
            info!(
                "canonical header taken from {} ({} columns)",
                schema.source,
                schema.width()
            );
            write_header(sink, schema)?;
            cursor += 1;
        }

        for document in &scanned {
            match document {
                ScannedDocument::Failed { name, reason } => {
                    stats.record_failure(name, reason.clone());
                }
                ScannedDocument::Ready { name, rows, header } => {
                    let written = self.write_document(
                        sink,
                        name,
                        rows,
                        header.as_ref(),
                        schema.as_ref(),
                        &mut cursor,
                        &mut stats,
                    )?;
                    if written == 0 {
                        warn!("{name}: no data rows found, skipping");
                        stats.record_failure(name, NO_DATA_ROWS);
                    } else {
                        info!("{name}: added {written} data rows");
                        stats.rows_merged += written;
                        stats.record_success(name);
                    }
                }
            }
        }

        Ok(stats)
    }

    fn scan<'a>(&self, document: &'a SourceDocument) -> ScannedDocument<'a> {
        let name = document.name.as_str();
        let rows = match &document.content {
            Ok(rows) => rows,
            Err(error) => {
                return ScannedDocument::Failed {
                    name,
                    reason: error.to_string(),
                };
            }
        };

        debug!("{name}: {} rows found", rows.len());
        if rows.is_empty() {
            warn!("{name}: document is empty, skipping");
            return ScannedDocument::Failed {
                name,
                reason: EMPTY_DOCUMENT.to_string(),
            };
        }

        let header = find_header_row(rows, &self.classifier).map(|index| {
            info!("{name}: header found at row {}", index + 1);
            DetectedHeader {
                index,
                columns: resolve_columns(&extract_header(&rows[index])),
            }
        });
        if header.is_none() {
            info!("{name}: no header found, treating all rows as data");
        }

        ScannedDocument::Ready { name, rows, header }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_document<S>(
        &self,
        sink: &mut S,
        name: &str,
        rows: &[Row],
        header: Option<&DetectedHeader>,
        schema: Option<&CanonicalSchema>,
        cursor: &mut u32,
        stats: &mut RunStatistics,
    ) -> Result<usize, MergeError>
    where
        S: SheetSink + ?Sized,
    {
        let candidates = header.map_or(rows, |header| &rows[header.index + 1..]);
        // Roles follow this document's own header; header-less documents
        // borrow the canonical positions.
        let columns = header
            .map(|header| header.columns)
            .or_else(|| schema.map(|schema| schema.columns))
            .unwrap_or_default();
        if let (Some(header), Some(schema)) = (header, schema) {
            let moved = header.columns.differing_roles(&schema.columns);
            if !moved.is_empty() {
                warn!(
                    "{name}: {} column position differs from the header of {}",
                    moved.join(", "),
                    schema.source
                );
            }
        }

        let mut written = 0;
        let mut truncated = false;
        for row in candidates.iter().filter(|row| !row_is_blank(row)) {
            let width = schema.map_or(row.len(), CanonicalSchema::width);
            truncated |= row.len() > width;

            let normalized = self.normalize_row(row, columns);
            if let Some(normalized) = &normalized {
                stats.record_address(normalized);
            }

            write_row(sink, *cursor, row, width, columns, normalized.as_ref())?;
            *cursor += 1;
            written += 1;
        }

        if truncated {
            warn!("{name}: cells beyond the canonical header width were dropped");
        }

        Ok(written)
    }

    fn normalize_row(&self, row: &Row, columns: ColumnIndexMap) -> Option<NormalizedAddress> {
        let address_index = columns.detailed_address?;
        let text_at = |index: Option<usize>| {
            index
                .and_then(|index| row.get(index))
                .and_then(|cell| cell.value.as_optional_text())
        };

        let address = text_at(Some(address_index));
        let pickup_point = text_at(columns.pickup_point);
        let normalized = self
            .normalizer
            .normalize(address.as_deref(), pickup_point.as_deref());

        if normalized.changed() {
            debug!(
                "address {:?} -> {:?} (replaced={}, cleaned={}, prepended={})",
                address,
                normalized.value,
                normalized.replaced,
                normalized.cleaned,
                normalized.prepended
            );
        }

        Some(normalized)
    }
}

fn establish_schema(scanned: &[ScannedDocument<'_>]) -> Option<CanonicalSchema> {
    scanned.iter().find_map(|document| match document {
        ScannedDocument::Ready {
            name,
            rows,
            header: Some(header),
        } => Some(CanonicalSchema::new(
            name,
            rows[header.index].clone(),
            header.columns,
        )),
        _ => None,
    })
}

fn column(index: usize) -> Result<u16, MergeError> {
    u16::try_from(index).map_err(|_| MergeError::TooManyColumns(index + 1))
}

fn write_header<S>(sink: &mut S, schema: &CanonicalSchema) -> Result<(), MergeError>
where
    S: SheetSink + ?Sized,
{
    for (index, label) in schema.labels.iter().enumerate() {
        let value = if label.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(label.clone())
        };
        let style = schema
            .header_cells
            .get(index)
            .map_or_else(CellStyle::bold, |cell| cell.style.clone());
        sink.write_cell(0, column(index)?, &value, &style)?;
    }
    Ok(())
}

fn write_row<S>(
    sink: &mut S,
    cursor: u32,
    row: &Row,
    width: usize,
    columns: ColumnIndexMap,
    normalized: Option<&NormalizedAddress>,
) -> Result<(), MergeError>
where
    S: SheetSink + ?Sized,
{
    let default_style = CellStyle::default();
    let rewritten = normalized.filter(|normalized| normalized.changed()).map(|normalized| {
        normalized
            .value
            .clone()
            .map_or(CellValue::Empty, CellValue::Text)
    });

    for index in 0..width {
        let source = row.get(index);
        let style = source.map_or(&default_style, |cell| &cell.style);
        let value = match (&rewritten, source) {
            (Some(value), _) if columns.detailed_address == Some(index) => value,
            (_, Some(cell)) => &cell.value,
            (_, None) => &CellValue::Empty,
        };
        sink.write_cell(cursor, column(index)?, value, style)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Merger;
    use crate::address::AddressNormalizer;
    use crate::error::MergeError;
    use crate::header::KeywordClassifier;
    use crate::model::{Cell, CellStyle, CellValue, Row, SourceDocument};
    use crate::options::AddressRules;
    use crate::report::{EMPTY_DOCUMENT, NO_DATA_ROWS};
    use crate::sink::MemorySheet;

    fn row(values: &[&str]) -> Row {
        values
            .iter()
            .map(|value| {
                if value.is_empty() {
                    Cell::default()
                } else {
                    Cell::text(*value)
                }
            })
            .collect()
    }

    fn merger() -> Merger {
        Merger::new(AddressNormalizer::new(AddressRules::default()).expect("rules compile"))
    }

    #[test]
    fn merges_header_at_row_three_and_prepends_pickup_point() {
        let documents = vec![
            SourceDocument::loaded(
                "a.xlsx",
                vec![
                    row(&["团购订单导出"]),
                    row(&[]),
                    row(&["跟团号", "下单人", "详细地址", "自提点"]),
                    row(&["1", "张三", "12-3", "X街5号"]),
                ],
            ),
            SourceDocument::loaded("b.xlsx", Vec::new()),
        ];
        let mut sheet = MemorySheet::new();
        let stats = merger().merge(&documents, &mut sheet).expect("merge succeeds");

        assert_eq!(
            sheet.rows(),
            vec![
                vec!["跟团号", "下单人", "详细地址", "自提点"],
                vec!["1", "张三", "X12-3", "X街5号"],
            ]
        );
        assert_eq!(stats.succeeded, vec!["a.xlsx"]);
        assert_eq!(stats.failed.len(), 1);
        assert_eq!(stats.failed[0].reason, EMPTY_DOCUMENT);
        assert_eq!(
            (
                stats.addresses_replaced,
                stats.addresses_cleaned,
                stats.addresses_prepended
            ),
            (0, 1, 1)
        );
        assert_eq!(stats.rows_merged, 1);
    }

    #[test]
    fn header_is_written_once_before_headerless_documents() {
        let documents = vec![
            SourceDocument::loaded("a.xlsx", vec![row(&["7", "王五", "12栋3", "海岸城"])]),
            SourceDocument::loaded(
                "b.xlsx",
                vec![
                    row(&["跟团号", "下单人", "详细地址", "自提点"]),
                    row(&["8", "赵六", "", "科技园"]),
                ],
            ),
        ];
        let mut sheet = MemorySheet::new();
        let stats = merger().merge(&documents, &mut sheet).expect("merge succeeds");

        assert_eq!(
            sheet.rows(),
            vec![
                vec!["跟团号", "下单人", "详细地址", "自提点"],
                vec!["7", "王五", "海岸城12栋3", "海岸城"],
                vec!["8", "赵六", "科技园", "科技园"],
            ]
        );
        assert_eq!(stats.addresses_replaced, 1);
        assert_eq!(stats.addresses_prepended, 1);
        assert_eq!(stats.succeeded, vec!["a.xlsx", "b.xlsx"]);
    }

    #[test]
    fn later_documents_resolve_roles_from_their_own_header() {
        let documents = vec![
            SourceDocument::loaded(
                "a.xlsx",
                vec![
                    row(&["跟团号", "下单人", "详细地址", "自提点"]),
                    row(&["1", "张三", "5-1", "海岸城"]),
                ],
            ),
            SourceDocument::loaded(
                "b.xlsx",
                vec![
                    row(&["跟团号", "自提点", "下单人", "详细地址"]),
                    row(&["2", "科技园", "李四", "6-2"]),
                ],
            ),
        ];
        let mut sheet = MemorySheet::new();
        merger().merge(&documents, &mut sheet).expect("merge succeeds");

        assert_eq!(sheet.row_values(1), vec!["1", "张三", "海岸城5-1", "海岸城"]);
        assert_eq!(sheet.row_values(2), vec!["2", "科技园", "李四", "科技园6-2"]);
    }

    #[test]
    fn rows_are_padded_and_cut_to_canonical_width() {
        let documents = vec![SourceDocument::loaded(
            "a.xlsx",
            vec![
                row(&["跟团号", "下单人", "详细地址"]),
                row(&["1"]),
                row(&["2", "李四", "地址", "extra"]),
            ],
        )];
        let mut sheet = MemorySheet::new();
        merger().merge(&documents, &mut sheet).expect("merge succeeds");

        assert_eq!(sheet.row_values(1), vec!["1", "", ""]);
        assert_eq!(sheet.row_values(2), vec!["2", "李四", "地址"]);
    }

    #[test]
    fn blank_rows_are_dropped_and_empty_data_is_a_failure() {
        let documents = vec![
            SourceDocument::loaded(
                "a.xlsx",
                vec![row(&["跟团号", "下单人", "详细地址"]), row(&["", "  ", ""])],
            ),
            SourceDocument::failed("c.xlsx", MergeError::Decrypt("bad password".into())),
        ];
        let mut sheet = MemorySheet::new();
        let stats = merger().merge(&documents, &mut sheet).expect("merge succeeds");

        assert!(stats.succeeded.is_empty());
        assert_eq!(stats.failed[0].reason, NO_DATA_ROWS);
        assert!(stats.failed[1].reason.contains("bad password"));
        assert_eq!(sheet.row_count(), 1);
    }

    #[test]
    fn untouched_cells_keep_value_and_style() {
        let bold = CellStyle::bold();
        let header = row(&["跟团号", "详细地址", "自提点"]);
        let data = vec![
            Cell::new(CellValue::Number(42.0), bold.clone()),
            Cell::new(CellValue::Text("广东省深圳市南山区粤海街道 A座".into()), bold.clone()),
            Cell::text("海岸城"),
        ];
        let documents = vec![SourceDocument::loaded("a.xlsx", vec![header, data])];
        let mut sheet = MemorySheet::new();
        merger().merge(&documents, &mut sheet).expect("merge succeeds");

        let id = sheet.cell(1, 0).expect("id cell written");
        assert_eq!(id.value, CellValue::Number(42.0));
        assert_eq!(id.style, bold);
        let address = sheet.cell(1, 1).expect("address cell written");
        assert_eq!(address.value, CellValue::Text("A座".into()));
        assert_eq!(address.style, bold);
    }

    #[test]
    fn documents_without_any_header_keep_their_own_width() {
        let documents = vec![SourceDocument::loaded(
            "a.xlsx",
            vec![row(&["1", "2"]), row(&["3", "4", "5"])],
        )];
        let mut sheet = MemorySheet::new();
        let stats = merger().merge(&documents, &mut sheet).expect("merge succeeds");

        assert_eq!(sheet.rows(), vec![vec!["1", "2"], vec!["3", "4", "5"]]);
        assert_eq!(stats.rows_merged, 2);
    }

    #[test]
    fn custom_classifier_changes_header_detection() {
        let merger = Merger::with_classifier(
            KeywordClassifier::new(["Order", "Customer"], 2),
            AddressNormalizer::new(AddressRules::default()).expect("rules compile"),
        );
        let documents = vec![SourceDocument::loaded(
            "a.xlsx",
            vec![row(&["Order", "Customer"]), row(&["1", "Ann"])],
        )];
        let mut sheet = MemorySheet::new();
        merger.merge(&documents, &mut sheet).expect("merge succeeds");
        assert_eq!(sheet.row_values(0), vec!["Order", "Customer"]);
        assert_eq!(sheet.row_count(), 2);
    }
}
