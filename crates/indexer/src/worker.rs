// crates/indexer/src/worker.rs
//! Workers consume jobs one at a time and drive the indexing transaction.
//!
//! Strictly one in-flight job per worker, so the queue depth is an honest
//! backlog signal for the controller. Workers are daemons: they run until the
//! orchestrator aborts them at session end. Infrastructural failures from the
//! indexer are recorded to the diagnostics log; the job is acked regardless.

use std::time::Duration;

use tracing::{error, info};

use dex_queue::{Delivery, WorkQueue, INDEX_QUEUE};

use crate::indexer::Indexer;

/// Idle poll interval when the queue is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Worker {
    id: u32,
    db: dex_db::Database,
    queue: WorkQueue,
    indexer: Indexer,
    session_id: i64,
}

impl Worker {
    pub fn new(
        id: u32,
        db: dex_db::Database,
        queue: WorkQueue,
        indexer: Indexer,
        session_id: i64,
    ) -> Self {
        Self {
            id,
            db,
            queue,
            indexer,
            session_id,
        }
    }

    /// Consume until aborted.
    pub async fn run(self) {
        info!(worker = self.id, "worker started");
        loop {
            match self.process_next().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(err) => {
                    error!(worker = self.id, error = %err, "queue receive failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Take and handle at most one job. Returns whether a job was handled.
    pub async fn process_next(&self) -> Result<bool, dex_queue::QueueError> {
        match self.queue.consume(INDEX_QUEUE).await? {
            Some(delivery) => {
                self.handle(&delivery).await;
                self.queue.ack(&delivery).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn handle(&self, delivery: &Delivery) {
        let job = &delivery.job;
        if let Err(err) = self.indexer.index(self.id, job.id, &job.url).await {
            // Infrastructural fault: diagnostics, not the repo's retry budget.
            error!(worker = self.id, repo_id = job.id, error = %err, "external system failure");
            if let Err(db_err) = self
                .db
                .record_diagnostic(Some(self.session_id), Some(job.id), &err.to_string())
                .await
            {
                error!(worker = self.id, error = %db_err, "failed to record diagnostic");
            }
        }
    }
}
