// crates/core/src/error.rs
//! Error taxonomy for the indexing transaction.
//!
//! The first three variants are per-repository faults that count against the
//! retry budget; `ExternalSystem` is infrastructural and must not. Everything
//! else is treated as transient.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The VCS refused to clone the repository.
    #[error("unable to clone repository {url}, with error: {message}")]
    Clone { url: String, message: String },

    /// The line counter is not installed on this machine.
    #[error("`cloc` application was not found on this machine")]
    MissingDependency,

    /// The repository contains no code at all, so no report was produced.
    #[error("empty repository")]
    StatisticsUnavailable,

    /// The result sink (or another external system) could not be reached.
    #[error("external system error: {0}")]
    ExternalSystem(String),

    /// The line counter ran but its report could not be parsed.
    #[error("unreadable cloc report: {0}")]
    Report(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// True for faults that are the repository's own, i.e. those that
    /// increment `error_count` and reset the repo to waiting.
    pub fn counts_against_retries(&self) -> bool {
        matches!(
            self,
            IndexError::Clone { .. }
                | IndexError::MissingDependency
                | IndexError::StatisticsUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget_classification() {
        let clone = IndexError::Clone {
            url: "https://example.com/r.git".into(),
            message: "404".into(),
        };
        assert!(clone.counts_against_retries());
        assert!(IndexError::MissingDependency.counts_against_retries());
        assert!(IndexError::StatisticsUnavailable.counts_against_retries());
        assert!(!IndexError::ExternalSystem("sink down".into()).counts_against_retries());
        assert!(!IndexError::Io(std::io::Error::other("disk")).counts_against_retries());
    }

    #[test]
    fn test_clone_message_includes_url() {
        let err = IndexError::Clone {
            url: "https://example.com/r.git".into(),
            message: "early EOF".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/r.git"));
        assert!(msg.contains("early EOF"));
    }
}
