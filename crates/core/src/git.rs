// crates/core/src/git.rs
//! Repository access via libgit2.
//!
//! Clone, topological walk, and pairwise diff totals. Everything here is
//! blocking; callers on the async side wrap calls in `spawn_blocking`.

use std::path::Path;

use git2::{ErrorCode, Oid, Repository, Sort};

use crate::error::IndexError;
use crate::sampler::{DiffTotals, History};
use crate::sector::CommitInfo;

/// A local clone of a repository.
pub struct GitRepo {
    inner: Repository,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("path", &self.inner.path())
            .finish()
    }
}

impl GitRepo {
    /// Clone `url` into `path`. Failures map to `IndexError::Clone` so they
    /// count against the repository's retry budget.
    pub fn clone(url: &str, path: &Path) -> Result<Self, IndexError> {
        match Repository::clone(url, path) {
            Ok(inner) => Ok(Self { inner }),
            Err(err) => Err(IndexError::Clone {
                url: url.to_string(),
                message: err.message().to_string(),
            }),
        }
    }

    /// Open an existing clone.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        Ok(Self {
            inner: Repository::open(path)?,
        })
    }
}

impl History for GitRepo {
    fn commits(&self) -> Result<Vec<CommitInfo>, IndexError> {
        // An unborn HEAD means a repository with no commits at all.
        if let Err(err) = self.inner.head() {
            if err.code() == ErrorCode::UnbornBranch || err.code() == ErrorCode::NotFound {
                return Ok(Vec::new());
            }
            return Err(err.into());
        }

        let mut walk = self.inner.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL)?;
        walk.push_head()?;

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid?;
            let commit = self.inner.find_commit(oid)?;
            let author = commit.author();
            commits.push(CommitInfo {
                id: oid.to_string(),
                time: commit.time().seconds(),
                author_name: author.name().unwrap_or_default().to_string(),
                author_email: author.email().unwrap_or_default().to_string(),
            });
        }
        Ok(commits)
    }

    fn diff_totals(&self, newest: &str, oldest: &str) -> Result<DiffTotals, IndexError> {
        let newest = self.inner.find_commit(Oid::from_str(newest)?)?;
        let oldest = self.inner.find_commit(Oid::from_str(oldest)?)?;

        // The span's changes run from just before its oldest commit up to its
        // newest. A root commit diffs against the empty tree.
        let base = match oldest.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let diff = self
            .inner
            .diff_tree_to_tree(base.as_ref(), Some(&newest.tree()?), None)?;
        let stats = diff.stats()?;

        Ok(DiffTotals {
            additions: stats.insertions() as i64,
            deletions: stats.deletions() as i64,
        })
    }
}
