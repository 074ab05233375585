// crates/queue/src/lib.rs
//! Durable work queue carrying `(repo_id, url)` jobs from the feeder to the
//! workers.
//!
//! SQLite-backed FIFO with per-message acks and at-least-once delivery: a
//! consumed job holds a lease, and a lease that expires (worker died) puts
//! the job back into candidacy for another worker. Consumers take one job at
//! a time, so queue depth reflects backlog exactly, which the feed
//! controller's model depends on.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the indexing queue.
pub const INDEX_QUEUE: &str = "index_queue";

/// How long a consumed job stays claimed before it becomes redeliverable.
const DEFAULT_LEASE_SECS: i64 = 600;

/// Window for the ack egress rate observation.
const DEMAND_WINDOW_SECS: i64 = 30;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Failed to create queue directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Queue payload: which repository to index and where to clone it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub url: String,
}

/// A consumed job plus the ack token for it.
#[derive(Debug, Clone)]
pub struct Delivery {
    delivery_tag: i64,
    pub job: Job,
}

/// Broker-side queue observations the feed controller runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueStats {
    /// Current depth: published but not yet acked.
    pub messages: i64,
    /// Observed ack egress rate, messages per second.
    pub demand: f64,
}

/// Handle to the durable queue store.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    pool: SqlitePool,
    lease_secs: i64,
}

impl WorkQueue {
    /// Open (or create) the queue store at the given path.
    pub async fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let queue = Self {
            pool,
            lease_secs: DEFAULT_LEASE_SECS,
        };
        queue.migrate().await?;

        info!("work queue opened at {}", path.display());
        Ok(queue)
    }

    /// In-memory queue (for testing).
    pub async fn open_in_memory() -> QueueResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .shared_cache(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let queue = Self {
            pool,
            lease_secs: DEFAULT_LEASE_SECS,
        };
        queue.migrate().await?;
        Ok(queue)
    }

    /// Override the redelivery lease. Mostly useful in tests.
    pub fn with_lease_secs(mut self, lease_secs: i64) -> Self {
        self.lease_secs = lease_secs;
        self
    }

    async fn migrate(&self) -> QueueResult<()> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    payload TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'ready',
    published_at INTEGER NOT NULL,
    claimed_at INTEGER,
    acked_at INTEGER
);
"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_queue_state ON jobs(queue, state, id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Declare a queue: make sure the store is reachable and writable. Used
    /// as the boot probe.
    pub async fn declare(&self, queue: &str) -> QueueResult<()> {
        sqlx::query("SELECT COUNT(*) FROM jobs WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// Publish one durable job.
    pub async fn publish(&self, queue: &str, job: &Job) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        sqlx::query("INSERT INTO jobs (queue, payload, published_at) VALUES (?, ?, ?)")
            .bind(queue)
            .bind(payload)
            .bind(now_epoch())
            .execute(&self.pool)
            .await?;
        debug!(queue, repo_id = job.id, "published job");
        Ok(())
    }

    /// Claim the next job: the oldest ready row, or a delivered row whose
    /// lease has expired (its worker died). The claim is a single atomic
    /// update, so two consumers can never hold the same delivery.
    ///
    /// A payload that does not parse is acked and logged, never redelivered.
    pub async fn consume(&self, queue: &str) -> QueueResult<Option<Delivery>> {
        loop {
            let now = now_epoch();
            let expired = now - self.lease_secs;

            let row: Option<(i64, String)> = sqlx::query_as(
                "UPDATE jobs SET state = 'delivered', claimed_at = ?
                 WHERE id = (
                     SELECT id FROM jobs
                     WHERE queue = ?
                       AND (state = 'ready' OR (state = 'delivered' AND claimed_at < ?))
                     ORDER BY id
                     LIMIT 1
                 )
                 RETURNING id, payload",
            )
            .bind(now)
            .bind(queue)
            .bind(expired)
            .fetch_optional(&self.pool)
            .await?;

            let Some((delivery_tag, payload)) = row else {
                return Ok(None);
            };
            match serde_json::from_str(&payload) {
                Ok(job) => return Ok(Some(Delivery { delivery_tag, job })),
                Err(err) => {
                    tracing::warn!(queue, delivery_tag, error = %err, "dropping malformed payload");
                    sqlx::query("UPDATE jobs SET state = 'acked', acked_at = ? WHERE id = ?")
                        .bind(now_epoch())
                        .bind(delivery_tag)
                        .execute(&self.pool)
                        .await?;
                }
            }
        }
    }

    /// Ack a delivery: the job is done and leaves the queue depth.
    pub async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        sqlx::query("UPDATE jobs SET state = 'acked', acked_at = ? WHERE id = ?")
            .bind(now_epoch())
            .bind(delivery.delivery_tag)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop every job in the queue, acked history included.
    pub async fn purge(&self, queue: &str) -> QueueResult<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE queue = ?")
            .bind(queue)
            .execute(&self.pool)
            .await?;
        info!(queue, purged = result.rows_affected(), "queue purged");
        Ok(())
    }

    /// Depth and drain rate, the controller's two inputs.
    pub async fn stats(&self, queue: &str) -> QueueResult<QueueStats> {
        let (messages,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state != 'acked'")
                .bind(queue)
                .fetch_one(&self.pool)
                .await?;

        let since = now_epoch() - DEMAND_WINDOW_SECS;
        let (recent_acks,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = 'acked' AND acked_at > ?",
        )
        .bind(queue)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            messages,
            demand: recent_acks as f64 / DEMAND_WINDOW_SECS as f64,
        })
    }
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
