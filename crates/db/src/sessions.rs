// crates/db/src/sessions.rs
//! Session rows: one per orchestrator run.

use crate::{now_epoch, Database, DbResult};

/// One indexing session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub start_time: i64,
    pub finish_time: Option<i64>,
    /// Repositories present at session start.
    pub total: i64,
    /// Number fed so far; monotonic.
    pub feed: i64,
    /// Number that exceeded retries so far; monotonic.
    pub errors: i64,
}

impl Session {
    /// Fraction of fed repositories still expected to land.
    pub fn progress(&self) -> f64 {
        if self.feed == 0 {
            return 0.0;
        }
        (self.total - self.errors) as f64 / self.feed as f64
    }

    /// Repositories not yet fed and not written off.
    pub fn remaining(&self) -> i64 {
        (self.total - self.feed - self.errors).max(0)
    }
}

impl Database {
    /// Open a new session row with the current repository count.
    pub async fn create_session(&self) -> DbResult<i64> {
        let total = self.count_repositories().await?;
        let result = sqlx::query("INSERT INTO sessions (start_time, total) VALUES (?, ?)")
            .bind(now_epoch())
            .bind(total)
            .execute(self.pool())
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_session(&self, id: i64) -> DbResult<Option<Session>> {
        let row: Option<(i64, i64, Option<i64>, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, start_time, finish_time, total, feed, errors FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(id, start_time, finish_time, total, feed, errors)| Session {
            id,
            start_time,
            finish_time,
            total,
            feed,
            errors,
        }))
    }

    /// Advance the session's fed counter by one batch.
    pub async fn increment_session_feed(&self, id: i64, fed: i64) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET feed = feed + ? WHERE id = ?")
            .bind(fed)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Advance the session's error counter (repositories written off).
    pub async fn increment_session_errors(&self, id: i64, errors: i64) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET errors = errors + ? WHERE id = ?")
            .bind(errors)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Stamp the session finished.
    pub async fn finish_session(&self, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET finish_time = ? WHERE id = ?")
            .bind(now_epoch())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
