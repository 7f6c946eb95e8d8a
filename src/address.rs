//! Detailed-address normalization.
//!
//! Every row runs the same ordered pipeline:
//!
//! 1. wholesale replacement by the pickup point when the address is blank or
//!    misses one of the core-location markers,
//! 2. text cleaning (literal rewrites, location words, street-number
//!    suffixes, whitespace collapse),
//! 3. repair of bare building/room shorthand by prepending the cleaned
//!    pickup point.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::MergeError;
use crate::options::AddressRules;

/// Suffix closing a street number, as in `中山路12号`.
pub(crate) const UNIT_MARKER: &str = "号";

static INCOMPLETE_FORMATS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // 12栋3号
        Regex::new(r"^\d+栋\d+号\s*$").expect("hardcoded building/room regex is valid"),
        // 12-3
        Regex::new(r"^\d+-\d+\s*$").expect("hardcoded dash regex is valid"),
        // 12栋3
        Regex::new(r"^\d+栋\d+\s*$").expect("hardcoded block regex is valid"),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedAddress {
    /// `None` when neither an address nor a pickup point was available.
    pub value: Option<String>,
    pub replaced: bool,
    pub cleaned: bool,
    pub prepended: bool,
}

impl NormalizedAddress {
    pub fn changed(&self) -> bool {
        self.replaced || self.cleaned || self.prepended
    }
}

#[derive(Debug, Clone)]
pub struct AddressNormalizer {
    rules: AddressRules,
    street_patterns: Vec<Regex>,
}

impl AddressNormalizer {
    pub fn new(rules: AddressRules) -> Result<Self, MergeError> {
        let street_patterns = rules
            .street_names
            .iter()
            .filter(|street| !street.is_empty())
            .map(|street| {
                let pattern = format!(r"{}\d+{UNIT_MARKER}", regex::escape(street));
                Regex::new(&pattern).map_err(|error| {
                    MergeError::InvalidRule(format!("street name '{street}': {error}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            street_patterns,
        })
    }

    /// True when every configured core-location marker occurs in the address.
    pub fn is_complete(&self, address: &str) -> bool {
        self.rules
            .core_locations
            .iter()
            .filter(|marker| !marker.is_empty())
            .all(|marker| address.contains(marker.as_str()))
    }

    /// Applies rewrites, location-word removal, street-suffix removal and
    /// whitespace collapse, in that order.
    pub fn clean(&self, text: &str) -> String {
        let mut out = text.to_string();

        for (from, to) in &self.rules.replacements {
            if !from.is_empty() {
                out = out.replace(from.as_str(), to);
            }
        }

        for word in &self.rules.location_words {
            if !word.is_empty() {
                out = out.replace(word.as_str(), "");
            }
        }

        for pattern in &self.street_patterns {
            out = pattern.replace_all(&out, "").into_owned();
        }

        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Exact match against the building/room shorthand left over once the
    /// locatable part of an address has been stripped.
    pub fn is_incomplete_format(&self, text: &str) -> bool {
        INCOMPLETE_FORMATS.iter().any(|format| format.is_match(text))
    }

    pub fn normalize(&self, address: Option<&str>, pickup_point: Option<&str>) -> NormalizedAddress {
        let address = address.map(str::trim).filter(|value| !value.is_empty());
        let pickup_point = pickup_point.map(str::trim).filter(|value| !value.is_empty());
        let mut result = NormalizedAddress::default();

        let source = match (address, pickup_point) {
            (None, None) => return result,
            (None, Some(pickup)) => {
                result.replaced = true;
                pickup
            }
            (Some(current), Some(pickup)) if self.needs_replacement(current) => {
                result.replaced = true;
                pickup
            }
            (Some(current), _) => current,
        };

        let mut value = self.clean(source);
        result.cleaned = value != source;

        // A replaced address already is the pickup point.
        if !result.replaced && self.is_incomplete_format(&value) {
            if let Some(pickup) = pickup_point {
                let prefix = self.clean(pickup);
                if !prefix.is_empty() {
                    result.cleaned |= prefix != pickup;
                    result.prepended = true;
                    value.insert_str(0, &prefix);
                }
            }
        }

        result.value = Some(value);
        result
    }

    /// Shorthand addresses are repaired by prepending instead of replacement.
    fn needs_replacement(&self, address: &str) -> bool {
        !self.is_complete(address) && !self.is_incomplete_format(&self.clean(address))
    }
}
