//! Simulation options files (`BOUT.inp`).
//!
//! The format is a flat ini-style text: optional `[section]` headers,
//! `key = value` pairs, `#` comments. Values are passed through as text
//! and attached to the dataset unmodified; nothing here interprets them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CollectError, CollectResult};

/// Section used for keys that appear before any `[section]` header.
pub const ROOT_SECTION: &str = "global";

/// Parsed options text: section -> key -> raw value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Options {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Options {
    /// Parse options text.
    pub fn parse(text: &str) -> CollectResult<Self> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current = ROOT_SECTION.to_string();

        for (lineno, raw_line) in text.lines().enumerate() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw_line.trim(),
            };
            if line.is_empty() {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = section.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                CollectError::input(format!(
                    "options line {} is neither 'key = value' nor a section header: '{raw_line}'",
                    lineno + 1
                ))
            })?;
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { sections })
    }

    /// Read and parse an options file.
    pub fn from_file(path: impl AsRef<Path>) -> CollectResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Look up a value by section and key.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    /// Iterate over sections in name order.
    pub fn sections(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.sections.iter()
    }

    /// Serialize for storage in a netCDF attribute.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("options serialize to JSON")
    }

    /// Restore from the JSON attribute form.
    pub fn from_json(json: &str) -> CollectResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CollectError::input(format!("malformed options attribute: {e}")))
    }
}
