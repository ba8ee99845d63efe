//! Parsing of semi-structured `key: value` reports.
//!
//! Admin CLIs print reports as column-aligned `Some key:   value` lines.
//! Parsing collapses the alignment padding, normalizes key names to
//! lowercase hyphenated form, strips a configured prefix, keeps only
//! allow-listed keys and coerces flagged keys to booleans.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value parsed out of a report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportValue {
    Text(String),
    Flag(bool),
}

impl ReportValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(_) => None,
        }
    }

    /// Canonical string form used when diffing against desired values.
    pub fn canonical(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Flag(true) => "true".to_string(),
            Self::Flag(false) => "false".to_string(),
        }
    }
}

/// Normalized key to current value.
pub type Report = BTreeMap<String, ReportValue>;

/// How to interpret one report format.
#[derive(Debug, Clone, Default)]
pub struct ReportSpec {
    /// Prefix stripped off every normalized key, e.g. `builder-`.
    pub strip_prefix: String,
    /// Only these keys survive parsing; unknown report fields are
    /// ignored for forward compatibility.
    pub allowed_keys: Vec<String>,
    /// Keys whose values are coerced to booleans.
    pub bool_keys: Vec<String>,
}

impl ReportSpec {
    pub fn new(strip_prefix: &str, allowed_keys: &[&str]) -> Self {
        Self {
            strip_prefix: strip_prefix.to_string(),
            allowed_keys: allowed_keys.iter().map(ToString::to_string).collect(),
            bool_keys: Vec::new(),
        }
    }

    /// Mark a key as boolean-valued.
    pub fn bool_key(mut self, key: &str) -> Self {
        self.bool_keys.push(key.to_string());
        self
    }

    fn is_bool(&self, key: &str) -> bool {
        self.bool_keys.iter().any(|k| k == key)
    }

    fn is_allowed(&self, key: &str) -> bool {
        self.allowed_keys.iter().any(|k| k == key)
    }
}

/// Parse report lines into a key/value mapping.
///
/// Lines without a `:` are skipped. The split happens at the first `:`
/// only, so values containing colons survive verbatim.
pub fn parse_report(lines: &[String], spec: &ReportSpec) -> Report {
    let mut report = Report::new();

    for line in lines {
        let collapsed = drop_alignment_runs(line);
        let Some((raw_key, raw_value)) = collapsed.split_once(':') else {
            continue;
        };

        let mut key = raw_key.trim().to_lowercase().replace(' ', "-");
        if let Some(stripped) = key.strip_prefix(&spec.strip_prefix) {
            key = stripped.to_string();
        }
        if !spec.is_allowed(&key) {
            continue;
        }

        let value = raw_value.trim();
        let value = if spec.is_bool(&key) {
            ReportValue::Flag(value.eq_ignore_ascii_case("true"))
        } else {
            ReportValue::Text(value.to_string())
        };
        report.insert(key, value);
    }

    report
}

/// Remove runs of two or more whitespace characters. Single spaces stay,
/// so multi-word key names survive while column padding disappears.
fn drop_alignment_runs(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j - i == 1 {
                out.push(chars[i]);
            }
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}
