// crates/db/src/repositories.rs
//! Repository rows: feed eligibility, claiming, completion, failure
//! accounting, and the on-report stamp.

use crate::{now_epoch, Database, DbResult};

/// Repository lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Waiting = 0,
    Processing = 1,
    Complete = 2,
}

impl RepoState {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => RepoState::Processing,
            2 => RepoState::Complete,
            _ => RepoState::Waiting,
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: i64,
    pub url: String,
    pub state: RepoState,
    pub error_count: i64,
    pub comment: String,
    pub activity_rating: f64,
    /// Unix seconds of the last completed index, if any.
    pub indexed_on: Option<i64>,
    /// Last index duration, `HH:MM:SS`.
    pub index_duration: String,
    pub on_report: bool,
}

type RepoRow = (
    i64,
    String,
    i64,
    i64,
    String,
    f64,
    Option<i64>,
    String,
    i64,
);

const REPO_COLUMNS: &str =
    "id, url, state, error_count, comment, activity_rating, indexed_on, index_duration, on_report";

fn from_row(row: RepoRow) -> Repository {
    Repository {
        id: row.0,
        url: row.1,
        state: RepoState::from_i64(row.2),
        error_count: row.3,
        comment: row.4,
        activity_rating: row.5,
        indexed_on: row.6,
        index_duration: row.7,
        on_report: row.8 != 0,
    }
}

impl Database {
    /// Insert a repository by clone URL. Returns its id; an already-known URL
    /// keeps its existing row and id.
    pub async fn insert_repository(&self, url: &str, activity_rating: f64) -> DbResult<i64> {
        sqlx::query(
            "INSERT INTO repositories (url, activity_rating) VALUES (?, ?)
             ON CONFLICT(url) DO NOTHING",
        )
        .bind(url)
        .bind(activity_rating)
        .execute(self.pool())
        .await?;

        let row: (i64,) = sqlx::query_as("SELECT id FROM repositories WHERE url = ?")
            .bind(url)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    pub async fn count_repositories(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM repositories")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    pub async fn get_repository(&self, id: i64) -> DbResult<Option<Repository>> {
        let row: Option<RepoRow> = sqlx::query_as(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(from_row))
    }

    /// Select the next feed batch and flip every selected row to processing,
    /// atomically. The claim is committed before the caller publishes
    /// anything, so a crash cannot double-feed.
    ///
    /// Eligible: waiting, under the retry ceiling, never indexed or indexed
    /// before `now`; ordered by activity rating descending, then oldest index
    /// first.
    pub async fn select_and_claim(
        &self,
        max_retries: i64,
        limit: i64,
    ) -> DbResult<Vec<(i64, String)>> {
        let mut tx = self.pool().begin().await?;

        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, url FROM repositories
             WHERE state = 0 AND error_count < ?
               AND (indexed_on IS NULL OR indexed_on < ?)
             ORDER BY activity_rating DESC, indexed_on ASC
             LIMIT ?",
        )
        .bind(max_retries)
        .bind(now_epoch())
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        if !rows.is_empty() {
            let ids: Vec<String> = rows.iter().map(|(id, _)| id.to_string()).collect();
            let sql = format!(
                "UPDATE repositories SET state = 1 WHERE id IN ({})",
                ids.join(",")
            );
            sqlx::query(&sql).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(rows)
    }

    /// Successful index: complete, stamped with the finish instant and the
    /// human-readable duration.
    pub async fn mark_complete(&self, id: i64, index_duration: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE repositories
             SET state = 2, indexed_on = ?, index_duration = ?
             WHERE id = ?",
        )
        .bind(now_epoch())
        .bind(index_duration)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Per-repo fault: bump the error counter, reset to waiting, keep the
    /// failure message.
    pub async fn record_failure(&self, id: i64, comment: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE repositories
             SET error_count = error_count + 1, state = 0, comment = ?
             WHERE id = ?",
        )
        .bind(comment)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Session boot: every repository back to a clean waiting slate.
    pub async fn reset_repositories(&self) -> DbResult<()> {
        sqlx::query("UPDATE repositories SET error_count = 0, state = 0, comment = ''")
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Repositories at or over the retry ceiling.
    pub async fn failed_repositories(&self, max_retries: i64) -> DbResult<Vec<Repository>> {
        let rows: Vec<RepoRow> = sqlx::query_as(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories WHERE error_count >= ? ORDER BY id"
        ))
        .bind(max_retries)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Stamp every repository at or over the retry ceiling as on-report.
    /// Returns the stamped rows.
    pub async fn stamp_on_report(&self, max_retries: i64) -> DbResult<Vec<Repository>> {
        let failures = self.failed_repositories(max_retries).await?;
        if !failures.is_empty() {
            sqlx::query("UPDATE repositories SET on_report = 1 WHERE error_count >= ?")
                .bind(max_retries)
                .execute(self.pool())
                .await?;
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_RETRIES: i64 = 3;

    #[tokio::test]
    async fn test_insert_is_idempotent_on_url() {
        let db = Database::new_in_memory().await.unwrap();
        let a = db.insert_repository("https://x/r.git", 0.0).await.unwrap();
        let b = db.insert_repository("https://x/r.git", 0.0).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(db.count_repositories().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_select_and_claim_flips_to_processing() {
        let db = Database::new_in_memory().await.unwrap();
        for i in 0..5 {
            db.insert_repository(&format!("https://x/{i}.git"), 0.0)
                .await
                .unwrap();
        }

        let batch = db.select_and_claim(MAX_RETRIES, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (id, _) in &batch {
            let repo = db.get_repository(*id).await.unwrap().unwrap();
            assert_eq!(repo.state, RepoState::Processing);
        }

        // Claimed rows are no longer eligible.
        let rest = db.select_and_claim(MAX_RETRIES, 10).await.unwrap();
        assert_eq!(rest.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_orders_by_activity_rating() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_repository("https://x/low.git", 1.0).await.unwrap();
        db.insert_repository("https://x/high.git", 9.0).await.unwrap();
        db.insert_repository("https://x/mid.git", 5.0).await.unwrap();

        let batch = db.select_and_claim(MAX_RETRIES, 10).await.unwrap();
        let urls: Vec<&str> = batch.iter().map(|(_, u)| u.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://x/high.git", "https://x/mid.git", "https://x/low.git"]
        );
    }

    #[tokio::test]
    async fn test_retry_ceiling_excludes_from_feed() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.insert_repository("https://x/r.git", 0.0).await.unwrap();

        for _ in 0..MAX_RETRIES {
            let batch = db.select_and_claim(MAX_RETRIES, 10).await.unwrap();
            assert_eq!(batch.len(), 1);
            db.record_failure(id, "unable to clone").await.unwrap();
        }

        let repo = db.get_repository(id).await.unwrap().unwrap();
        assert_eq!(repo.error_count, MAX_RETRIES);
        assert_eq!(repo.state, RepoState::Waiting);
        assert_eq!(repo.comment, "unable to clone");

        // Ceiling reached: never selected again.
        assert!(db.select_and_claim(MAX_RETRIES, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_complete() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.insert_repository("https://x/r.git", 0.0).await.unwrap();
        db.select_and_claim(MAX_RETRIES, 1).await.unwrap();
        db.mark_complete(id, "00:00:07").await.unwrap();

        let repo = db.get_repository(id).await.unwrap().unwrap();
        assert_eq!(repo.state, RepoState::Complete);
        assert_eq!(repo.index_duration, "00:00:07");
        assert!(repo.indexed_on.is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_errors_and_state() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.insert_repository("https://x/r.git", 0.0).await.unwrap();
        db.select_and_claim(MAX_RETRIES, 1).await.unwrap();
        db.record_failure(id, "boom").await.unwrap();

        db.reset_repositories().await.unwrap();
        let repo = db.get_repository(id).await.unwrap().unwrap();
        assert_eq!(repo.state, RepoState::Waiting);
        assert_eq!(repo.error_count, 0);
        assert_eq!(repo.comment, "");
    }

    #[tokio::test]
    async fn test_stamp_on_report() {
        let db = Database::new_in_memory().await.unwrap();
        let bad = db.insert_repository("https://x/bad.git", 0.0).await.unwrap();
        let good = db.insert_repository("https://x/good.git", 0.0).await.unwrap();
        for _ in 0..MAX_RETRIES {
            db.record_failure(bad, "unable to clone").await.unwrap();
        }

        let reported = db.stamp_on_report(MAX_RETRIES).await.unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].id, bad);
        assert_eq!(reported[0].comment, "unable to clone");

        assert!(db.get_repository(bad).await.unwrap().unwrap().on_report);
        assert!(!db.get_repository(good).await.unwrap().unwrap().on_report);
    }
}
