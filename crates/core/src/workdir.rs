// crates/core/src/workdir.rs
//! Scoped per-(worker, repository) working directories.
//!
//! The workspace is partitioned as `<root>/<repo_name>@<worker_id>`, so no
//! two workers can collide. Acquisition recreates the directory from scratch;
//! the guard removes it again on drop, on every exit path. Crash recovery is
//! recreate-from-scratch at the next session boot, not a shutdown hook.

use std::path::{Path, PathBuf};

/// Last path segment of a clone URL, without a trailing `.git`.
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Guard for one working directory. Exists on disk exactly as long as the
/// value is alive.
#[derive(Debug)]
pub struct Workdir {
    path: PathBuf,
}

impl Workdir {
    /// Create (or recreate) `<root>/<repo_name>@<worker_id>`, empty.
    pub fn acquire(root: &Path, repo_name: &str, worker_id: u32) -> std::io::Result<Self> {
        let path = root.join(format!("{repo_name}@{worker_id}"));
        remove_if_present(&path)?;
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        if let Err(err) = remove_if_present(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to remove workdir");
        }
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
