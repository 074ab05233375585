// crates/indexer/src/feeder.rs
//! The feeder: selects eligible repositories from the catalog and publishes
//! them to the work queue.
//!
//! A feed cycle is select -> claim -> publish. The claim (flip to processing)
//! commits before any message is published, so a crash between the two cannot
//! double-feed. Feeding is debounced; an empty eligible batch latches the
//! exhausted flag that drives the controller's wind-down.

use std::time::Instant;

use anyhow::Result;
use tracing::info;

use dex_db::{Database, Repository};
use dex_queue::{Job, WorkQueue, INDEX_QUEUE};

use crate::config::Config;

pub struct Feeder {
    session_id: i64,
    db: Database,
    queue: WorkQueue,
    max_retries: i64,
    feed_size: i64,
    debounce_secs: u64,
    last_feed: Option<Instant>,
    stop_feeding: bool,
}

impl Feeder {
    pub fn new(session_id: i64, db: Database, queue: WorkQueue, config: &Config) -> Self {
        Self {
            session_id,
            db,
            queue,
            max_retries: config.max_retries,
            feed_size: config.feed_size,
            debounce_secs: config.debounce_secs,
            last_feed: None,
            stop_feeding: false,
        }
    }

    /// True once an eligible batch came back empty.
    pub fn is_exhausted(&self) -> bool {
        self.stop_feeding
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// One feed cycle. Debounced: a call inside the debounce window does
    /// nothing at all, no selects, no publishes, no counter updates.
    pub async fn feed(&mut self) -> Result<()> {
        if let Some(last) = self.last_feed {
            if last.elapsed().as_secs() < self.debounce_secs {
                return Ok(());
            }
        }
        self.last_feed = Some(Instant::now());

        let batch = self
            .db
            .select_and_claim(self.max_retries, self.feed_size)
            .await?;

        if batch.is_empty() {
            info!("feeding exhausted");
            self.stop_feeding = true;
            return Ok(());
        }

        for (id, url) in &batch {
            self.queue
                .publish(
                    INDEX_QUEUE,
                    &Job {
                        id: *id,
                        url: url.clone(),
                    },
                )
                .await?;
        }

        self.db
            .increment_session_feed(self.session_id, batch.len() as i64)
            .await?;

        info!(fed = batch.len(), "feed cycle complete");
        Ok(())
    }

    /// Stamp every repository at the retry ceiling as on-report, log each one
    /// with its last failure message, and bump the session error counter.
    pub async fn report_failures(&self) -> Result<Vec<Repository>> {
        let reported = self.db.stamp_on_report(self.max_retries).await?;
        if !reported.is_empty() {
            info!(
                failures = reported.len(),
                session = self.session_id,
                "reporting failures"
            );
            self.db
                .increment_session_errors(self.session_id, reported.len() as i64)
                .await?;
            for repo in &reported {
                info!(repo_id = repo.id, comment = %repo.comment, "reported");
            }
        }
        Ok(reported)
    }
}
