// crates/core/src/lib.rs
pub mod cloc;
pub mod error;
pub mod git;
pub mod languages;
pub mod result;
pub mod sampler;
pub mod sector;
pub mod text;
pub mod workdir;

pub use error::IndexError;
pub use git::GitRepo;
pub use languages::{Language, LanguageStats, RESERVED_KEYS};
pub use result::{LanguageBreakdown, RepositoryInfo, ResultDocument};
pub use sampler::{Contributor, DiffTotals, History, Metric, MetricSampler};
pub use sector::{CommitInfo, Sector, ONE_WEEK_SECS};
pub use text::FullText;
pub use workdir::{repo_name, Workdir};
