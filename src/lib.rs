//! Merges group-buy order spreadsheets into one workbook.
//!
//! Every `.xlsx`/`.xls`/`.xlsm` file in a directory is opened (decrypting
//! password-protected packages), its header row is located by keyword vote,
//! and its data rows are appended under a single canonical header with their
//! cell styles. The detailed-address column is normalized on the way through.

mod address;
mod crypto;
mod discover;
mod error;
mod header;
mod merge;
mod model;
mod options;
mod report;
mod schema;
mod sink;
mod xlsx;

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::address::AddressNormalizer;
use crate::discover::find_input_files;
use crate::merge::Merger;
use crate::xlsx::{XlsxSink, load_document};

pub use error::MergeError;
pub use model::{
    AlignmentStyle, BorderEdge, BorderStyle, CellStyle, ColorRef, FontStyle, NumberFormat,
};
pub use options::{AddressRules, MergeOptions};
pub use report::{EMPTY_DOCUMENT, FileFailure, MergeSummary, NO_DATA_ROWS, RunStatistics};
pub use xlsx::{MERGED_SHEET_NAME, SheetStyles, read_sheet_styles};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub input_files: Vec<PathBuf>,
    pub statistics: RunStatistics,
    /// `None` when nothing was written.
    pub output: Option<PathBuf>,
}

impl MergeReport {
    #[must_use]
    pub fn summary(&self, rules: &AddressRules) -> MergeSummary {
        MergeSummary::new(&self.statistics, rules).with_output(self.output.as_deref())
    }
}

/// Merges every spreadsheet in `input_dir` into `options.output_file`.
///
/// A relative output name is resolved against `input_dir`. No output is
/// written when there are no inputs or when every input failed.
pub fn merge_directory(input_dir: &Path, options: &MergeOptions) -> Result<MergeReport, MergeError> {
    let normalizer = AddressNormalizer::new(options.rules.clone())?;
    let output_path = input_dir.join(&options.output_file);

    let input_files = find_input_files(input_dir, &output_path)?;
    if input_files.is_empty() {
        warn!("no spreadsheet files found in {}", input_dir.display());
        return Ok(MergeReport {
            input_files,
            statistics: RunStatistics::default(),
            output: None,
        });
    }
    info!("merging {} files from {}", input_files.len(), input_dir.display());

    let documents = input_files
        .iter()
        .map(|path| load_document(path, &options.password))
        .collect::<Vec<_>>();

    let mut sink = XlsxSink::new()?;
    let statistics = Merger::new(normalizer).merge(&documents, &mut sink)?;

    let output = if statistics.all_failed() {
        error!("every input file failed, no output written");
        None
    } else {
        sink.save(&output_path)?;
        info!(
            "wrote {} rows to {}",
            statistics.rows_merged,
            output_path.display()
        );
        Some(output_path)
    };

    let report = MergeReport {
        input_files,
        statistics,
        output,
    };
    report.summary(&options.rules).log();
    Ok(report)
}
