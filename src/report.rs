use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;

use chrono::Local;
use serde::Serialize;
use tracing::{error, info};

use crate::address::NormalizedAddress;
use crate::error::MergeError;
use crate::options::AddressRules;

pub const EMPTY_DOCUMENT: &str = "empty document";
pub const NO_DATA_ROWS: &str = "no data rows";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunStatistics {
    pub succeeded: Vec<String>,
    pub failed: Vec<FileFailure>,
    pub rows_merged: usize,
    pub addresses_replaced: usize,
    pub addresses_cleaned: usize,
    pub addresses_prepended: usize,
}

impl RunStatistics {
    pub fn record_success(&mut self, file: &str) {
        self.succeeded.push(file.to_string());
    }

    pub fn record_failure(&mut self, file: &str, reason: impl Into<String>) {
        self.failed.push(FileFailure {
            file: file.to_string(),
            reason: reason.into(),
        });
    }

    pub fn record_address(&mut self, address: &NormalizedAddress) {
        self.addresses_replaced += usize::from(address.replaced);
        self.addresses_cleaned += usize::from(address.cleaned);
        self.addresses_prepended += usize::from(address.prepended);
    }

    /// Percentage of processed files that succeeded; 0 when nothing was processed.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.succeeded.len() + self.failed.len();
        if total == 0 {
            return 0.0;
        }
        self.succeeded.len() as f64 * 100.0 / total as f64
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSummary {
    pub generated_at: String,
    pub output: Option<String>,
    pub success_rate: f64,
    pub statistics: RunStatistics,
    pub rules: AddressRules,
}

impl MergeSummary {
    pub fn new(statistics: &RunStatistics, rules: &AddressRules) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            output: None,
            success_rate: statistics.success_rate(),
            statistics: statistics.clone(),
            rules: rules.clone(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: Option<&Path>) -> Self {
        self.output = output.map(|path| path.display().to_string());
        self
    }

    pub fn log(&self) {
        let report = self.to_string();
        if self.statistics.all_failed() {
            for line in report.lines() {
                error!("{line}");
            }
        } else {
            for line in report.lines() {
                info!("{line}");
            }
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), MergeError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn write_list(f: &mut Formatter<'_>, label: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        writeln!(f, "{label}: none")
    } else {
        writeln!(f, "{label}: {}", items.join(", "))
    }
}

impl Display for MergeSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stats = &self.statistics;
        let rule = "=".repeat(60);

        writeln!(f, "{rule}")?;
        writeln!(f, "MERGE SUMMARY REPORT")?;
        writeln!(f, "{rule}")?;

        writeln!(f, "Succeeded files ({}):", stats.succeeded.len())?;
        if stats.succeeded.is_empty() {
            writeln!(f, "  none")?;
        }
        for (index, file) in stats.succeeded.iter().enumerate() {
            writeln!(f, "  {}. {file}", index + 1)?;
        }

        writeln!(f, "Failed files ({}):", stats.failed.len())?;
        if stats.failed.is_empty() {
            writeln!(f, "  none")?;
        }
        for (index, failure) in stats.failed.iter().enumerate() {
            writeln!(f, "  {}. {} - reason: {}", index + 1, failure.file, failure.reason)?;
        }

        writeln!(f, "Success rate: {:.1}%", self.success_rate)?;
        writeln!(f, "Rows merged: {}", stats.rows_merged)?;
        writeln!(
            f,
            "Addresses replaced: {}, cleaned: {}, prepended: {}",
            stats.addresses_replaced, stats.addresses_cleaned, stats.addresses_prepended
        )?;
        if let Some(output) = &self.output {
            writeln!(f, "Output: {output}")?;
        }

        let replacements = self
            .rules
            .replacements
            .iter()
            .map(|(from, to)| format!("'{from}' -> '{to}'"))
            .collect::<Vec<_>>();
        write_list(f, "Replacement rules", &replacements)?;
        write_list(f, "Location words", &self.rules.location_words)?;
        write_list(f, "Street names", &self.rules.street_names)?;
        write_list(f, "Core locations", &self.rules.core_locations)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::{MergeSummary, RunStatistics};
    use crate::address::NormalizedAddress;
    use crate::options::AddressRules;

    #[test]
    fn success_rate_is_zero_without_files() {
        assert_eq!(RunStatistics::default().success_rate(), 0.0);
    }

    #[test]
    fn success_rate_counts_failures() {
        let mut stats = RunStatistics::default();
        stats.record_success("a.xlsx");
        stats.record_failure("b.xlsx", "empty document");
        stats.record_failure("c.xlsx", "no data rows");
        stats.record_success("d.xlsx");
        assert!((stats.success_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn address_flags_feed_counters() {
        let mut stats = RunStatistics::default();
        stats.record_address(&NormalizedAddress {
            value: Some("X12-3".into()),
            replaced: false,
            cleaned: true,
            prepended: true,
        });
        stats.record_address(&NormalizedAddress::default());
        assert_eq!(
            (
                stats.addresses_replaced,
                stats.addresses_cleaned,
                stats.addresses_prepended
            ),
            (0, 1, 1)
        );
    }

    #[test]
    fn summary_lists_failures_and_active_rules() {
        let mut stats = RunStatistics::default();
        stats.record_success("a.xlsx");
        stats.record_failure("b.xlsx", "empty document");
        let text = MergeSummary::new(&stats, &AddressRules::default()).to_string();
        assert!(text.contains("1. b.xlsx - reason: empty document"));
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("Street names: 街, 路, 大道"));
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = MergeSummary::new(&RunStatistics::default(), &AddressRules::default());
        let json = serde_json::to_value(&summary).expect("summary should serialize");
        assert_eq!(json["success_rate"], 0.0);
        assert_eq!(json["statistics"]["rows_merged"], 0);
        assert!(json["rules"]["location_words"].is_array());
    }
}
