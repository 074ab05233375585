// crates/core/src/result.rs
//! The result document: everything the index learned about one repository,
//! serialized into the sink.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::languages::{Language, LanguageStats};
use crate::text::FullText;

#[derive(Debug, Clone, Serialize)]
pub struct LanguageBreakdown {
    pub common: Language,
    pub secondary: Vec<Language>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub url: String,
    pub languages: LanguageBreakdown,
}

/// The document written to the result sink, keyed by repository id.
#[derive(Debug, Clone, Serialize)]
pub struct ResultDocument {
    pub repository: RepositoryInfo,
    pub text: FullText,
    pub processed: DateTime<Utc>,
}

impl ResultDocument {
    /// Assemble a document from the analysis outputs. Pure, apart from the
    /// `processed` stamp.
    pub fn build(name: &str, url: &str, stats: &LanguageStats, text: FullText) -> Self {
        Self {
            repository: RepositoryInfo {
                name: name.to_string(),
                url: url.to_string(),
                languages: LanguageBreakdown {
                    common: stats.common().clone(),
                    secondary: stats.secondary().to_vec(),
                },
            },
            text,
            processed: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageStats;

    const REPORT: &str = r#"
Rust:
  nFiles: 2
  blank: 10
  comment: 5
  code: 80
Shell:
  nFiles: 1
  blank: 2
  comment: 1
  code: 20
SUM:
  nFiles: 3
  blank: 12
  comment: 6
  code: 100
"#;

    #[test]
    fn test_build_shape() {
        let stats = LanguageStats::parse(REPORT).unwrap();
        let text = FullText {
            readme: Some("a readme".into()),
            ..Default::default()
        };
        let doc = ResultDocument::build("widget", "https://example.com/widget.git", &stats, text);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["repository"]["name"], "widget");
        assert_eq!(
            json["repository"]["url"],
            "https://example.com/widget.git"
        );
        assert_eq!(json["repository"]["languages"]["common"]["language"], "Rust");
        assert_eq!(json["repository"]["languages"]["secondary"][0]["language"], "Shell");
        assert_eq!(json["text"]["readme"], "a readme");
        assert_eq!(json["text"]["license"], serde_json::Value::Null);
        assert!(json["processed"].is_string());
    }

    #[test]
    fn test_common_excluded_from_secondary() {
        let stats = LanguageStats::parse(REPORT).unwrap();
        let doc = ResultDocument::build("w", "u", &stats, FullText::default());
        assert!(doc
            .repository
            .languages
            .secondary
            .iter()
            .all(|l| l.language != doc.repository.languages.common.language));
    }

    #[test]
    fn test_rebuild_is_stable_modulo_processed() {
        let stats = LanguageStats::parse(REPORT).unwrap();
        let a = ResultDocument::build("w", "u", &stats, FullText::default());
        let b = ResultDocument::build("w", "u", &stats, FullText::default());

        let mut a = serde_json::to_value(&a).unwrap();
        let mut b = serde_json::to_value(&b).unwrap();
        a["processed"] = serde_json::Value::Null;
        b["processed"] = serde_json::Value::Null;
        assert_eq!(a, b);
    }
}
