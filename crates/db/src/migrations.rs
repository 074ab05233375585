/// Inline SQL migrations for the catalog schema.
///
/// Simple inline migrations rather than sqlx migration files; the schema is
/// small and self-contained.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: repositories table
    r#"
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    state INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    comment TEXT NOT NULL DEFAULT '',
    activity_rating REAL NOT NULL DEFAULT 0,
    indexed_on INTEGER,
    index_duration TEXT NOT NULL DEFAULT '',
    on_report INTEGER NOT NULL DEFAULT 0
);
"#,
    // Migration 2: feed eligibility index
    r#"
CREATE INDEX IF NOT EXISTS idx_repositories_feed
    ON repositories(state, error_count, activity_rating DESC);
"#,
    // Migration 3: sessions table
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time INTEGER NOT NULL,
    finish_time INTEGER,
    total INTEGER NOT NULL DEFAULT 0,
    feed INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0
);
"#,
    // Migration 4: metrics table, replaced wholesale per repo on re-index
    r#"
CREATE TABLE IF NOT EXISTS metrics (
    repo_id INTEGER NOT NULL,
    anchor_commit_id TEXT NOT NULL,
    additions INTEGER NOT NULL DEFAULT 0,
    deletions INTEGER NOT NULL DEFAULT 0,
    commit_count INTEGER NOT NULL DEFAULT 0,
    activity INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL DEFAULT 0
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_metrics_repo ON metrics(repo_id);
"#,
    // Migration 5: contributors table
    r#"
CREATE TABLE IF NOT EXISTS contributors (
    repo_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    commit_count INTEGER NOT NULL DEFAULT 0
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_contributors_repo ON contributors(repo_id);
"#,
    // Migration 6: diagnostics for infrastructural failures
    r#"
CREATE TABLE IF NOT EXISTS diagnostics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER,
    repo_id INTEGER,
    message TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
"#,
];
