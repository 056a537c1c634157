//! Content store
//!
//! Content-addressed SQLite persistence for book bytes plus reading
//! metadata. A book's id is the SHA-256 of its bytes, so importing the
//! same file twice always lands on one record.

mod schema;
mod types;

pub use schema::initialize_schema;
pub use types::{BookRecord, BookSummary, LibraryStats};

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::config::DatabaseConfig;
use crate::document::{CoverImage, DocumentFormat, MetadataExtractor};
use crate::error::{ReaderError, Result};
use crate::position::Location;

/// Hex SHA-256 of the document bytes
pub fn compute_id(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Create a new database connection pool and initialize the schema
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Persistent book store
#[derive(Clone)]
pub struct BookStore {
    pool: SqlitePool,
}

const RECORD_COLUMNS: &str = "id, title, author, file_name, format, size, cover_mime, cover_data, \
     data, progress, location, added_at, last_opened_at, finished_at";

const SUMMARY_COLUMNS: &str = "id, title, author, file_name, format, size, \
     (cover_data IS NOT NULL) AS has_cover, progress, location, added_at, last_opened_at, \
     finished_at";

impl BookStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        tracing::info!(url = %config.url, "Book store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Import document bytes and return the book id
    ///
    /// Metadata is extracted once here. Re-importing identical bytes
    /// refreshes the descriptive fields and keeps the reading state.
    pub async fn save(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        extractor: &dyn MetadataExtractor,
    ) -> Result<String> {
        let format = DocumentFormat::detect(&bytes, file_name).ok_or_else(|| {
            ReaderError::InvalidInput(format!("unsupported document: {}", file_name))
        })?;
        let id = compute_id(&bytes);
        let metadata = extractor.describe(format, file_name, &bytes).await?;
        let record = BookRecord::new(id.clone(), file_name, format, metadata, bytes);

        let (cover_mime, cover_data) = split_cover(&record.cover_image);
        let now = timestamp(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, file_name, format, size, cover_mime, cover_data,
                               data, progress, location, added_at, last_opened_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?, NULL)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                file_name = excluded.file_name,
                cover_mime = excluded.cover_mime,
                cover_data = excluded.cover_data
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.author)
        .bind(&record.file_name)
        .bind(record.format.as_str())
        .bind(record.size() as i64)
        .bind(cover_mime)
        .bind(cover_data)
        .bind(&record.data)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            id = %id,
            title = %record.title,
            format = record.format.as_str(),
            size = record.size(),
            "Saved book"
        );

        Ok(id)
    }

    /// Insert or fully replace a record
    pub async fn put(&self, record: &BookRecord) -> Result<()> {
        let (cover_mime, cover_data) = split_cover(&record.cover_image);
        let location = encode_location(record.location.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, file_name, format, size, cover_mime, cover_data,
                               data, progress, location, added_at, last_opened_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                file_name = excluded.file_name,
                format = excluded.format,
                size = excluded.size,
                cover_mime = excluded.cover_mime,
                cover_data = excluded.cover_data,
                data = excluded.data,
                progress = excluded.progress,
                location = excluded.location,
                added_at = excluded.added_at,
                last_opened_at = excluded.last_opened_at,
                finished_at = excluded.finished_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.author)
        .bind(&record.file_name)
        .bind(record.format.as_str())
        .bind(record.size() as i64)
        .bind(cover_mime)
        .bind(cover_data)
        .bind(&record.data)
        .bind(record.progress)
        .bind(location)
        .bind(timestamp(&record.added_at))
        .bind(timestamp(&record.last_opened_at))
        .bind(record.finished_at.as_ref().map(timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<BookRecord> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {} FROM books WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ReaderError::NotFound(format!("book {}", id)))?;

        row.try_into()
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        let found: Option<(String,)> = sqlx::query_as("SELECT id FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    /// Persist a reading position
    ///
    /// Touches only progress, location and last-opened time, plus the
    /// finished time the first time progress reaches 100.
    pub async fn update_progress(
        &self,
        id: &str,
        percentage: f64,
        location: Option<&Location>,
    ) -> Result<()> {
        let location = encode_location(location)?;
        let now = timestamp(&Utc::now());

        let result = sqlx::query(
            r#"
            UPDATE books SET
                progress = ?,
                location = ?,
                last_opened_at = ?,
                finished_at = CASE WHEN ? >= 100 THEN COALESCE(finished_at, ?) ELSE finished_at END
            WHERE id = ?
            "#,
        )
        .bind(percentage)
        .bind(location)
        .bind(&now)
        .bind(percentage)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ReaderError::NotFound(format!("book {}", id)));
        }

        tracing::debug!(id = %id, percentage, "Updated progress");
        Ok(())
    }

    /// Remove a book; returns whether it existed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(id = %id, "Deleted book");
        }
        Ok(deleted)
    }

    /// All books, most recently opened first, without their bytes
    pub async fn list_all(&self) -> Result<Vec<BookSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            "SELECT {} FROM books ORDER BY last_opened_at DESC, added_at DESC, id",
            SUMMARY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookSummary::try_from).collect()
    }

    pub async fn stats(&self) -> Result<LibraryStats> {
        let (total, reading, completed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN progress > 0 AND progress < 100 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN progress >= 100 THEN 1 ELSE 0 END), 0)
            FROM books
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LibraryStats {
            total: total.max(0) as u64,
            reading: reading.max(0) as u64,
            completed: completed.max(0) as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: String,
    title: String,
    author: String,
    file_name: String,
    format: String,
    #[allow(dead_code)]
    size: i64,
    cover_mime: Option<String>,
    cover_data: Option<Vec<u8>>,
    data: Vec<u8>,
    progress: f64,
    location: Option<String>,
    added_at: String,
    last_opened_at: String,
    finished_at: Option<String>,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = ReaderError;

    fn try_from(row: BookRow) -> Result<Self> {
        let cover_image = match (row.cover_mime, row.cover_data) {
            (Some(mime), Some(bytes)) => Some(CoverImage { mime, bytes }),
            _ => None,
        };

        Ok(BookRecord {
            format: decode_format(&row.format)?,
            location: decode_location(row.location.as_deref())?,
            added_at: parse_timestamp(&row.added_at)?,
            last_opened_at: parse_timestamp(&row.last_opened_at)?,
            finished_at: row.finished_at.as_deref().map(parse_timestamp).transpose()?,
            id: row.id,
            title: row.title,
            author: row.author,
            file_name: row.file_name,
            cover_image,
            data: row.data,
            progress: row.progress,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    title: String,
    author: String,
    file_name: String,
    format: String,
    size: i64,
    has_cover: i64,
    progress: f64,
    location: Option<String>,
    added_at: String,
    last_opened_at: String,
    finished_at: Option<String>,
}

impl TryFrom<SummaryRow> for BookSummary {
    type Error = ReaderError;

    fn try_from(row: SummaryRow) -> Result<Self> {
        Ok(BookSummary {
            format: decode_format(&row.format)?,
            location: decode_location(row.location.as_deref())?,
            added_at: parse_timestamp(&row.added_at)?,
            last_opened_at: parse_timestamp(&row.last_opened_at)?,
            finished_at: row.finished_at.as_deref().map(parse_timestamp).transpose()?,
            size: row.size.max(0) as u64,
            has_cover: row.has_cover != 0,
            id: row.id,
            title: row.title,
            author: row.author,
            file_name: row.file_name,
            progress: row.progress,
        })
    }
}

fn split_cover(cover: &Option<CoverImage>) -> (Option<&str>, Option<&[u8]>) {
    match cover {
        Some(cover) => (Some(cover.mime.as_str()), Some(cover.bytes.as_slice())),
        None => (None, None),
    }
}

// Fixed-width UTC so TEXT ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| ReaderError::StorageFault(sqlx::Error::Decode(Box::new(e))))
}

fn decode_format(value: &str) -> Result<DocumentFormat> {
    DocumentFormat::parse(value).ok_or_else(|| {
        ReaderError::StorageFault(sqlx::Error::Decode(
            format!("unknown document format '{}'", value).into(),
        ))
    })
}

fn encode_location(location: Option<&Location>) -> Result<Option<String>> {
    location
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

fn decode_location(value: Option<&str>) -> Result<Option<Location>> {
    value
        .map(serde_json::from_str)
        .transpose()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMetadata, FallbackMetadata, UNKNOWN_AUTHOR};
    use chrono::Duration;
    use tempfile::TempDir;

    async fn test_store() -> (BookStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("books.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };
        let store = BookStore::connect(&config).await.unwrap();
        (store, temp_dir)
    }

    fn pdf_bytes(tag: &str) -> Vec<u8> {
        format!("%PDF-1.7\n% {}\n", tag).into_bytes()
    }

    #[test]
    fn test_compute_id() {
        let id = compute_id(b"hello world");
        assert_eq!(id.len(), 64);
        assert_eq!(
            id,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let (store, _dir) = test_store().await;
        let bytes = pdf_bytes("one");

        let first = store
            .save("Report.pdf", bytes.clone(), &FallbackMetadata)
            .await
            .unwrap();
        store
            .update_progress(&first, 40.0, Some(&Location::Page(21)))
            .await
            .unwrap();

        let second = store
            .save("Report (copy).pdf", bytes, &FallbackMetadata)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        let record = store.get(&first).await.unwrap();
        assert_eq!(record.title, "Report (copy)");
        assert_eq!(record.author, UNKNOWN_AUTHOR);
        assert_eq!(record.progress, 40.0);
        assert_eq!(record.location, Some(Location::Page(21)));
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_format() {
        let (store, _dir) = test_store().await;
        let result = store
            .save("notes.txt", b"plain text".to_vec(), &FallbackMetadata)
            .await;
        assert!(matches!(result, Err(ReaderError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.get("missing").await,
            Err(ReaderError::NotFound(_))
        ));
        assert!(!store.contains("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_progress_missing_book() {
        let (store, _dir) = test_store().await;
        let result = store.update_progress("missing", 10.0, None).await;
        assert!(matches!(result, Err(ReaderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_progress_sets_finished_once() {
        let (store, _dir) = test_store().await;
        let id = store
            .save("Book.pdf", pdf_bytes("finish"), &FallbackMetadata)
            .await
            .unwrap();

        store.update_progress(&id, 100.0, None).await.unwrap();
        let finished_at = store.get(&id).await.unwrap().finished_at;
        assert!(finished_at.is_some());

        store
            .update_progress(&id, 30.0, Some(&Location::Page(3)))
            .await
            .unwrap();
        store.update_progress(&id, 100.0, None).await.unwrap();

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.finished_at, finished_at);
    }

    #[tokio::test]
    async fn test_content_location_round_trips() {
        let (store, _dir) = test_store().await;
        let id = store
            .save("Book.pdf", pdf_bytes("cfi"), &FallbackMetadata)
            .await
            .unwrap();
        let token = Location::Content("epubcfi(/6/14!/4/2/1:0)".into());

        store.update_progress(&id, 42.0, Some(&token)).await.unwrap();

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.position().location, Some(token));
        assert_eq!(record.position().percentage, 42.0);
    }

    #[tokio::test]
    async fn test_put_keeps_cover() {
        let (store, _dir) = test_store().await;
        let bytes = pdf_bytes("cover");
        let metadata = DocumentMetadata {
            title: "Covered".into(),
            author: "A. Author".into(),
            cover_image: Some(CoverImage {
                mime: "image/png".into(),
                bytes: vec![0x89, b'P', b'N', b'G'],
            }),
        };
        let record = BookRecord::new(
            compute_id(&bytes),
            "covered.pdf",
            DocumentFormat::Fixed,
            metadata,
            bytes,
        );
        store.put(&record).await.unwrap();

        let loaded = store.get(&record.id).await.unwrap();
        assert_eq!(loaded.cover_image, record.cover_image);
        assert_eq!(loaded.data, record.data);

        let summaries = store.list_all().await.unwrap();
        assert!(summaries[0].has_cover);
        assert_eq!(summaries[0].size, record.size());
    }

    #[tokio::test]
    async fn test_list_all_most_recent_first() {
        let (store, _dir) = test_store().await;
        let now = Utc::now();

        for (tag, age_minutes) in [("old", 30), ("newest", 0), ("middle", 10)] {
            let bytes = pdf_bytes(tag);
            let mut record = BookRecord::new(
                compute_id(&bytes),
                &format!("{}.pdf", tag),
                DocumentFormat::Fixed,
                DocumentMetadata {
                    title: tag.to_string(),
                    author: UNKNOWN_AUTHOR.to_string(),
                    cover_image: None,
                },
                bytes,
            );
            record.last_opened_at = now - Duration::minutes(age_minutes);
            store.put(&record).await.unwrap();
        }

        let titles: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["newest", "middle", "old"]);
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let (store, _dir) = test_store().await;
        let unread = store
            .save("a.pdf", pdf_bytes("a"), &FallbackMetadata)
            .await
            .unwrap();
        let reading = store
            .save("b.pdf", pdf_bytes("b"), &FallbackMetadata)
            .await
            .unwrap();
        let done = store
            .save("c.pdf", pdf_bytes("c"), &FallbackMetadata)
            .await
            .unwrap();

        store.update_progress(&reading, 12.5, None).await.unwrap();
        store.update_progress(&done, 100.0, None).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            LibraryStats {
                total: 3,
                reading: 1,
                completed: 1
            }
        );

        assert!(store.delete(&unread).await.unwrap());
        assert!(!store.delete(&unread).await.unwrap());
        assert_eq!(store.stats().await.unwrap().total, 2);
    }
}
