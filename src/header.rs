use crate::model::Cell;

pub(crate) const HEADER_MATCH_THRESHOLD: usize = 3;

pub(crate) const DEFAULT_HEADER_KEYWORDS: [&str; 13] = [
    "跟团号",
    "下单人",
    "团员备注",
    "支付时间",
    "团长备注",
    "商品",
    "订单金额",
    "退款金额",
    "订单状态",
    "自提点",
    "收货人",
    "联系电话",
    "详细地址",
];

/// Decides whether a row names the columns of the rows below it.
pub trait HeaderClassifier {
    fn is_header(&self, row: &[Cell]) -> bool;
}

/// Counts vocabulary keywords that appear inside any cell of the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    threshold: usize,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(Into::<String>::into)
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self {
            keywords,
            threshold,
        }
    }

    pub fn matching_keywords(&self, row: &[Cell]) -> usize {
        let values = row
            .iter()
            .map(|cell| cell.value.as_text())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>();

        self.keywords
            .iter()
            .filter(|keyword| values.iter().any(|value| value.contains(keyword.as_str())))
            .count()
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_KEYWORDS, HEADER_MATCH_THRESHOLD)
    }
}

impl HeaderClassifier for KeywordClassifier {
    fn is_header(&self, row: &[Cell]) -> bool {
        self.matching_keywords(row) >= self.threshold
    }
}

pub(crate) fn find_header_row<C>(rows: &[Vec<Cell>], classifier: &C) -> Option<usize>
where
    C: HeaderClassifier + ?Sized,
{
    rows.iter().position(|row| classifier.is_header(row))
}
