//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- One row per book, keyed by the SHA-256 of its bytes
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    file_name TEXT NOT NULL,
    format TEXT NOT NULL CHECK (format IN ('flow', 'fixed')),
    size INTEGER NOT NULL,
    cover_mime TEXT,
    cover_data BLOB,
    data BLOB NOT NULL,
    progress REAL NOT NULL DEFAULT 0,
    location TEXT,
    added_at TEXT NOT NULL,
    last_opened_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);
CREATE INDEX IF NOT EXISTS idx_books_last_opened ON books(last_opened_at);

-- Reader settings, persisted apart from book records
CREATE TABLE IF NOT EXISTS reader_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
