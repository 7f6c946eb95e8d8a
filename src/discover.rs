use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, glob_with};
use tracing::{debug, warn};

use crate::error::MergeError;
use crate::xlsx::SheetFormat;

/// Prefix of the lock files Office leaves next to open workbooks.
const LOCK_FILE_PREFIX: &str = "~$";

/// Spreadsheets directly inside `dir`, sorted by path.
///
/// The file named like `output_file` is skipped so a previous run's output is
/// never merged into the next one.
pub(crate) fn find_input_files(dir: &Path, output_file: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let output_name = output_file.file_name();
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for extension in SheetFormat::EXTENSIONS {
        let pattern = format!("{escaped}/*.{extension}");
        for entry in glob_with(&pattern, options)? {
            let path = match entry {
                Ok(path) => path,
                Err(error) => {
                    warn!("skipping unreadable entry: {error}");
                    continue;
                }
            };
            if !path.is_file() || is_excluded(&path, output_name) {
                continue;
            }
            files.push(path);
        }
    }

    files.sort();
    files.dedup();
    debug!("found {} input files in {}", files.len(), dir.display());
    Ok(files)
}

fn is_excluded(path: &Path, output_name: Option<&OsStr>) -> bool {
    let Some(name) = path.file_name() else {
        return true;
    };
    Some(name) == output_name || name.to_string_lossy().starts_with(LOCK_FILE_PREFIX)
}
