use tracing::warn;

use crate::model::Cell;

pub(crate) const PICKUP_POINT_MARKER: &str = "自提点";
pub(crate) const DETAILED_ADDRESS_MARKER: &str = "详细地址";

/// Source positions of the columns the address pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnIndexMap {
    pub pickup_point: Option<usize>,
    pub detailed_address: Option<usize>,
}

impl ColumnIndexMap {
    /// Markers of the roles resolved to a different column than in `other`.
    pub(crate) fn differing_roles(&self, other: &Self) -> Vec<&'static str> {
        [
            (PICKUP_POINT_MARKER, self.pickup_point, other.pickup_point),
            (DETAILED_ADDRESS_MARKER, self.detailed_address, other.detailed_address),
        ]
        .into_iter()
        .filter(|(_, ours, theirs)| ours != theirs)
        .map(|(marker, _, _)| marker)
        .collect()
    }
}

/// Output schema frozen from the first document whose header was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSchema {
    pub labels: Vec<String>,
    pub header_cells: Vec<Cell>,
    pub columns: ColumnIndexMap,
    pub source: String,
}

impl CanonicalSchema {
    pub fn new(source: &str, header_cells: Vec<Cell>, columns: ColumnIndexMap) -> Self {
        Self {
            labels: extract_header(&header_cells),
            header_cells,
            columns,
            source: source.to_string(),
        }
    }

    pub fn width(&self) -> usize {
        self.labels.len()
    }
}

pub(crate) fn extract_header(row: &[Cell]) -> Vec<String> {
    row.iter().map(|cell| cell.value.as_text()).collect()
}

pub(crate) fn resolve_columns(labels: &[String]) -> ColumnIndexMap {
    let find = |marker: &str| labels.iter().position(|label| label.contains(marker));

    let columns = ColumnIndexMap {
        pickup_point: find(PICKUP_POINT_MARKER),
        detailed_address: find(DETAILED_ADDRESS_MARKER),
    };

    if columns.pickup_point.is_none() {
        warn!("header has no '{PICKUP_POINT_MARKER}' column; pickup point fallback disabled");
    }
    if columns.detailed_address.is_none() {
        warn!("header has no '{DETAILED_ADDRESS_MARKER}' column; address normalization disabled");
    }

    columns
}
