// crates/db/src/metrics.rs
//! Persisted sampler output: metrics and contributors, replaced wholesale per
//! repository so re-indexing is idempotent.

use dex_core::{Contributor, Metric};

use crate::{Database, DbResult};

impl Database {
    /// Replace all metrics for a repository with a fresh sample.
    pub async fn replace_metrics(&self, repo_id: i64, metrics: &[Metric]) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM metrics WHERE repo_id = ?")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;

        for m in metrics {
            sqlx::query(
                "INSERT INTO metrics
                 (repo_id, anchor_commit_id, additions, deletions, commit_count, activity, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(repo_id)
            .bind(&m.anchor_commit_id)
            .bind(m.additions)
            .bind(m.deletions)
            .bind(m.commit_count)
            .bind(m.activity)
            .bind(m.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// All metrics for a repository, newest sector first.
    pub async fn metrics_for(&self, repo_id: i64) -> DbResult<Vec<Metric>> {
        let rows: Vec<(String, i64, i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT anchor_commit_id, additions, deletions, commit_count, activity, timestamp
             FROM metrics WHERE repo_id = ? ORDER BY timestamp DESC",
        )
        .bind(repo_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(anchor_commit_id, additions, deletions, commit_count, activity, timestamp)| {
                    Metric {
                        anchor_commit_id,
                        additions,
                        deletions,
                        commit_count,
                        activity,
                        timestamp,
                    }
                },
            )
            .collect())
    }

    /// Replace all contributors for a repository.
    pub async fn replace_contributors(
        &self,
        repo_id: i64,
        contributors: &[Contributor],
    ) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM contributors WHERE repo_id = ?")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;

        for c in contributors {
            sqlx::query(
                "INSERT INTO contributors (repo_id, email, name, commit_count) VALUES (?, ?, ?, ?)",
            )
            .bind(repo_id)
            .bind(&c.email)
            .bind(&c.name)
            .bind(c.count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// All contributors for a repository, most commits first.
    pub async fn contributors_for(&self, repo_id: i64) -> DbResult<Vec<Contributor>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT email, name, commit_count FROM contributors
             WHERE repo_id = ? ORDER BY commit_count DESC, email",
        )
        .bind(repo_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(email, name, count)| Contributor { name, email, count })
            .collect())
    }
}
