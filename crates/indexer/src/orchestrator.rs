// crates/indexer/src/orchestrator.rs
//! Session orchestration: boot dependencies with fail-fast gates, open a
//! session, run the feed controller, and shepherd everything to a stamped
//! finish.
//!
//! Workers are daemons; they are aborted once the session is finalized. A row
//! stuck in processing after a crash is cleaned up here, at the next boot,
//! by the wholesale reset; nothing else recovers it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use dex_db::{Database, Repository};
use dex_queue::{WorkQueue, INDEX_QUEUE};
use dex_sink::ResultSink;

use crate::config::Config;
use crate::controller::FeedManager;
use crate::feeder::Feeder;
use crate::indexer::Indexer;
use crate::worker::Worker;

/// A dependency was unreachable (or the workspace unusable) at startup.
/// Fatal: the session aborts before any work is claimed.
#[derive(Debug, thiserror::Error)]
#[error("boot failure: {0}")]
pub struct BootFailure(pub String);

/// What a finished session looked like.
#[derive(Debug)]
pub struct SessionSummary {
    pub session_id: i64,
    pub total: i64,
    pub feed: i64,
    /// Repositories stamped on-report this session.
    pub reported: Vec<Repository>,
}

/// Run one full indexing session: boot, feed, drain, finalize.
pub async fn run_session(config: &Config) -> Result<SessionSummary> {
    // Workspace first: a stale tree from a crashed session is garbage.
    prepare_workspace(&config.workdir)
        .map_err(|e| BootFailure(format!("could not prepare workspace: {e}")))?;
    info!(workdir = %config.workdir.display(), "workspace prepared");

    let db = Database::new(&config.catalog_path())
        .await
        .map_err(|e| BootFailure(format!("could not connect to catalog: {e}")))?;
    let queue = WorkQueue::open(&config.queue_path())
        .await
        .map_err(|e| BootFailure(format!("could not connect to queue: {e}")))?;
    let sink = Arc::new(
        ResultSink::open(&config.sink_dir())
            .map_err(|e| BootFailure(format!("could not open result sink: {e}")))?,
    );

    cool_off(config.cooling_secs, "letting connections establish").await;

    db.ping()
        .await
        .map_err(|e| BootFailure(format!("catalog probe failed: {e}")))?;
    queue
        .declare(INDEX_QUEUE)
        .await
        .map_err(|e| BootFailure(format!("queue probe failed: {e}")))?;
    sink.ping()
        .map_err(|e| BootFailure(format!("sink probe failed: {e}")))?;
    info!("dependency probes ok");

    // Fresh session: every repository back to waiting with a clean slate.
    db.reset_repositories()
        .await
        .map_err(|e| BootFailure(format!("failed to initialize session: {e}")))?;
    let session_id = db
        .create_session()
        .await
        .map_err(|e| BootFailure(format!("failed to initialize session: {e}")))?;
    info!(session = session_id, "indexing session opened");

    queue
        .purge(INDEX_QUEUE)
        .await
        .map_err(|e| BootFailure(format!("queue purge failed: {e}")))?;

    // Spawn workers with a short inter-spawn cool-off so connections do not
    // arrive in a burst.
    let mut workers = Vec::with_capacity(config.workers as usize);
    for worker_id in 1..=config.workers {
        let indexer = Indexer::new(
            db.clone(),
            Arc::clone(&sink),
            config.workdir.clone(),
            config.sector_resolution,
        );
        let worker = Worker::new(worker_id, db.clone(), queue.clone(), indexer, session_id);
        workers.push(tokio::spawn(worker.run()));
        tokio::time::sleep(Duration::from_millis(config.worker_cooling_ms)).await;
    }
    info!(workers = config.workers, "workers initialized");
    cool_off(config.cooling_secs, "letting workers establish").await;

    let feeder = Feeder::new(session_id, db.clone(), queue.clone(), config);
    let mut manager = FeedManager::new(feeder, queue.clone(), db.clone(), config);
    info!("running");
    manager.run().await?;

    // Contents in the workspace root mean workers are still mid-job; wait for
    // every lease to be released before finalizing.
    wait_for_workspace_release(&config.workdir).await;

    let reported = manager.report_failures().await?;
    db.finish_session(session_id).await?;

    // Workers are daemons: abort them and wait for the tasks to wind down so
    // their handles (sink writer included) are actually released.
    for handle in workers {
        handle.abort();
        let _ = handle.await;
    }

    let session = db
        .get_session(session_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session row vanished"))?;
    info!(session = session_id, feed = session.feed, "session finished");

    Ok(SessionSummary {
        session_id,
        total: session.total,
        feed: session.feed,
        reported,
    })
}

/// Remove the workspace root if present, then recreate it empty.
fn prepare_workspace(workdir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(workdir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    std::fs::create_dir_all(workdir)
}

/// Poll until the workspace root is empty. Bounded so a wedged worker cannot
/// hold the session open forever.
async fn wait_for_workspace_release(workdir: &Path) {
    const POLL: Duration = Duration::from_secs(1);
    const LIMIT: u32 = 600;

    for _ in 0..LIMIT {
        match std::fs::read_dir(workdir) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    return;
                }
            }
            Err(_) => return,
        }
        tokio::time::sleep(POLL).await;
    }
    warn!(workdir = %workdir.display(), "workspace not released in time, finalizing anyway");
}

/// Timed pause rendered as a progress bar, giving pooled connections time to
/// settle.
async fn cool_off(secs: u64, message: &str) {
    if secs == 0 {
        return;
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg:>32} {bar:40.blue} {percent:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message.to_string());

    let step = Duration::from_millis(secs * 10);
    for _ in 0..100 {
        bar.inc(1);
        tokio::time::sleep(step).await;
    }
    bar.finish_and_clear();
}
