// crates/indexer/src/indexer.rs
//! The per-repository indexing transaction: clone, analyze, emit, mark.
//!
//! A transaction owns a scoped working directory for its whole life; the
//! directory is removed on every exit path. Failure handling follows the
//! retry-budget policy: the repository's own faults (clone refused, no code,
//! missing line counter) are recorded against its error counter and the repo
//! returns to waiting; infrastructural faults propagate to the worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use dex_core::{
    cloc, text, GitRepo, IndexError, LanguageStats, MetricSampler, ResultDocument, Workdir,
};
use dex_db::Database;
use dex_sink::ResultSink;

pub struct Indexer {
    db: Database,
    sink: Arc<ResultSink>,
    workdir_root: PathBuf,
    sector_resolution: i64,
}

impl Indexer {
    pub fn new(
        db: Database,
        sink: Arc<ResultSink>,
        workdir_root: PathBuf,
        sector_resolution: i64,
    ) -> Self {
        Self {
            db,
            sink,
            workdir_root,
            sector_resolution,
        }
    }

    /// Index one repository.
    ///
    /// Returns `Ok` whenever the fault (if any) has been absorbed locally;
    /// the job should be acked either way. The only `Err` is an
    /// infrastructural failure the worker must log to diagnostics.
    pub async fn index(&self, worker_id: u32, repo_id: i64, url: &str) -> Result<(), IndexError> {
        let started = Instant::now();
        match self.run_transaction(worker_id, repo_id, url, started).await {
            Ok(()) => Ok(()),
            Err(err) if err.counts_against_retries() => {
                warn!(repo_id, url, error = %err, "indexing failed");
                self.db
                    .record_failure(repo_id, &err.to_string())
                    .await
                    .map_err(catalog_err)?;
                Ok(())
            }
            Err(err @ IndexError::ExternalSystem(_)) => Err(err),
            Err(err) => {
                // Filesystem and other transient faults: log, ack, leave the
                // repository row as it is.
                warn!(repo_id, url, error = %err, "indexing aborted");
                Ok(())
            }
        }
    }

    async fn run_transaction(
        &self,
        worker_id: u32,
        repo_id: i64,
        url: &str,
        started: Instant,
    ) -> Result<(), IndexError> {
        let name = dex_core::repo_name(url);
        let workdir = Workdir::acquire(&self.workdir_root, &name, worker_id)?;

        info!(repo_id, url, "cloning");
        let clone_url = url.to_string();
        let clone_path = workdir.path().to_path_buf();
        let repo = tokio::task::spawn_blocking(move || GitRepo::clone(&clone_url, &clone_path))
            .await
            .map_err(join_err)??;

        // Language statistics. An empty repository surfaces here, before any
        // document is built or metric persisted.
        let report = cloc::run(workdir.path()).await?;
        let stats = LanguageStats::from_report(&report)?;

        let fulltext = text::extract(workdir.path());

        let resolution = self.sector_resolution;
        let (metrics, contributors) = tokio::task::spawn_blocking(move || {
            let sampler = MetricSampler::with_resolution(&repo, resolution);
            Ok::<_, IndexError>((sampler.sample_all()?, sampler.contributors()?))
        })
        .await
        .map_err(join_err)??;

        self.db
            .replace_metrics(repo_id, &metrics)
            .await
            .map_err(catalog_err)?;
        self.db
            .replace_contributors(repo_id, &contributors)
            .await
            .map_err(catalog_err)?;

        let document = ResultDocument::build(&name, url, &stats, fulltext);
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.put(repo_id, &document))
            .await
            .map_err(join_err)?
            .map_err(|err| IndexError::ExternalSystem(format!("result sink: {err}")))?;

        let duration = format_hms(started.elapsed().as_secs());
        self.db
            .mark_complete(repo_id, &duration)
            .await
            .map_err(catalog_err)?;

        info!(repo_id, url, %duration, "completed");
        Ok(())
    }
}

/// `HH:MM:SS` rendering used for index durations and ETAs.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn catalog_err(err: dex_db::DbError) -> IndexError {
    IndexError::ExternalSystem(format!("catalog: {err}"))
}

fn join_err(err: tokio::task::JoinError) -> IndexError {
    IndexError::Io(std::io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_db::RepoState;

    async fn indexer_fixture() -> (Database, Arc<ResultSink>, tempfile::TempDir, Indexer) {
        let db = Database::new_in_memory().await.unwrap();
        let sink = Arc::new(ResultSink::open_in_ram().unwrap());
        let workspace = tempfile::tempdir().unwrap();
        let indexer = Indexer::new(
            db.clone(),
            Arc::clone(&sink),
            workspace.path().to_path_buf(),
            dex_core::ONE_WEEK_SECS,
        );
        (db, sink, workspace, indexer)
    }

    #[tokio::test]
    async fn test_clone_failure_counts_and_resets() {
        let (db, sink, _workspace, indexer) = indexer_fixture().await;
        let url = "/nonexistent/definitely-missing.git";
        let id = db.insert_repository(url, 0.0).await.unwrap();
        db.select_and_claim(3, 1).await.unwrap();

        indexer.index(1, id, url).await.unwrap();

        let repo = db.get_repository(id).await.unwrap().unwrap();
        assert_eq!(repo.state, RepoState::Waiting);
        assert_eq!(repo.error_count, 1);
        assert!(repo.comment.contains("unable to clone"));
        assert!(sink.is_empty().unwrap());
        assert!(db.metrics_for(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_workdir_released_after_failure() {
        let (db, _sink, workspace, indexer) = indexer_fixture().await;
        let url = "/nonexistent/missing.git";
        let id = db.insert_repository(url, 0.0).await.unwrap();

        indexer.index(2, id, url).await.unwrap();

        assert_eq!(
            std::fs::read_dir(workspace.path()).unwrap().count(),
            0,
            "workdir root should be empty after every exit path"
        );
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(7), "00:00:07");
        assert_eq!(format_hms(61), "00:01:01");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(90_000), "25:00:00");
    }
}
