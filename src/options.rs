use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

pub(crate) const DEFAULT_PASSWORD: &str = "8888";
pub(crate) const DEFAULT_OUTPUT_FILE: &str = "1.xlsx";

/// Text rules driving the address pipeline. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressRules {
    /// Ordered literal rewrites; an empty replacement removes the match.
    pub replacements: Vec<(String, String)>,
    pub location_words: Vec<String>,
    /// Each name strips `<name><digits>号` street-number suffixes.
    pub street_names: Vec<String>,
    /// Province, city, district and neighborhood markers that must all be
    /// present for an address to count as complete.
    pub core_locations: Vec<String>,
}

impl Default for AddressRules {
    fn default() -> Self {
        Self {
            replacements: vec![
                ("（".to_string(), "(".to_string()),
                ("）".to_string(), ")".to_string()),
                ("\u{3000}".to_string(), " ".to_string()),
                ("中华人民共和国".to_string(), String::new()),
            ],
            location_words: ["中国", "广东省", "深圳市", "南山区", "粤海街道"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            street_names: ["街", "路", "大道"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            core_locations: ["省", "市", "区", "街道"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Tried exactly once on protected workbooks.
    pub password: String,
    /// Output file name; also excluded from input discovery.
    pub output_file: String,
    pub rules: AddressRules,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD.to_string(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            rules: AddressRules::default(),
        }
    }
}

impl MergeOptions {
    /// Loads options from JSON; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, MergeError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, MergeError> {
        let options: Self = serde_json::from_str(raw)?;
        if options.output_file.trim().is_empty() {
            return Err(MergeError::InvalidRule(
                "output_file cannot be empty".to_string(),
            ));
        }
        Ok(options)
    }
}
