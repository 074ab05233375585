// crates/core/src/languages.rs
//! Parsing of the cloc YAML report into language statistics.
//!
//! The report is a mapping of `language -> {nFiles, code, comment, blank}`
//! with two reserved keys (`header`, `SUM`) that are not languages. The
//! common language is the one with the most code; every language carries its
//! share of the total code as a ratio in `[0, 1]`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Report keys that are not languages.
pub const RESERVED_KEYS: &[&str] = &["header", "SUM"];

#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
    #[serde(rename = "nFiles")]
    n_files: i64,
    code: i64,
    comment: i64,
    blank: i64,
}

/// Per-language line statistics as they appear in the result document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Language {
    pub language: String,
    pub files: i64,
    /// Lines of code.
    pub lines: i64,
    pub comments: i64,
    pub blank: i64,
    /// `lines + comments + blank`.
    pub total: i64,
    /// Share of the repository's total code, in `[0, 1]`.
    pub percentage: f64,
}

/// The parsed report: all languages sorted by share, descending, plus totals.
#[derive(Debug, Clone)]
pub struct LanguageStats {
    languages: Vec<Language>,
    pub total_files: i64,
    pub total_code: i64,
    pub total_comments: i64,
    pub total_blank: i64,
    pub total_lines: i64,
}

impl LanguageStats {
    /// Read and parse a report file.
    pub fn from_report(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse report text.
    pub fn parse(report: &str) -> Result<Self, IndexError> {
        let entries: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str(report).map_err(|e| IndexError::Report(e.to_string()))?;

        let sum: RawEntry = entries
            .get("SUM")
            .cloned()
            .map(serde_yaml::from_value::<RawEntry>)
            .transpose()
            .map_err(|e| IndexError::Report(e.to_string()))?
            .ok_or_else(|| IndexError::Report("report has no SUM entry".into()))?;

        let total_code = sum.code;
        let mut languages = Vec::new();
        for (name, value) in &entries {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            let entry: RawEntry = serde_yaml::from_value(value.clone())
                .map_err(|e| IndexError::Report(format!("entry {name}: {e}")))?;
            let percentage = if total_code > 0 {
                entry.code as f64 / total_code as f64
            } else {
                0.0
            };
            languages.push(Language {
                language: name.clone(),
                files: entry.n_files,
                lines: entry.code,
                comments: entry.comment,
                blank: entry.blank,
                total: entry.code + entry.comment + entry.blank,
                percentage,
            });
        }

        if languages.is_empty() {
            // A report with no languages means the clone held no code.
            return Err(IndexError::StatisticsUnavailable);
        }

        languages.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(Self {
            languages,
            total_files: sum.n_files,
            total_code,
            total_comments: sum.comment,
            total_blank: sum.blank,
            total_lines: sum.code + sum.comment + sum.blank,
        })
    }

    /// The language with the most code.
    pub fn common(&self) -> &Language {
        &self.languages[0]
    }

    /// All other languages, by share, descending.
    pub fn secondary(&self) -> &[Language] {
        &self.languages[1..]
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}
