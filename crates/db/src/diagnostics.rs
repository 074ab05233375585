// crates/db/src/diagnostics.rs
//! Diagnostics log for infrastructural failures.
//!
//! Sink outages and the like land here instead of counting against a
//! repository's retry budget; operators read this table, not the repo rows.

use crate::{now_epoch, Database, DbResult};

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub id: i64,
    pub session_id: Option<i64>,
    pub repo_id: Option<i64>,
    pub message: String,
    pub created_at: i64,
}

impl Database {
    pub async fn record_diagnostic(
        &self,
        session_id: Option<i64>,
        repo_id: Option<i64>,
        message: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO diagnostics (session_id, repo_id, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(repo_id)
        .bind(message)
        .bind(now_epoch())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn diagnostics(&self) -> DbResult<Vec<Diagnostic>> {
        let rows: Vec<(i64, Option<i64>, Option<i64>, String, i64)> = sqlx::query_as(
            "SELECT id, session_id, repo_id, message, created_at FROM diagnostics ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, session_id, repo_id, message, created_at)| Diagnostic {
                id,
                session_id,
                repo_id,
                message,
                created_at,
            })
            .collect())
    }
}
