//! Book record types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{CoverImage, DocumentFormat, DocumentMetadata};
use crate::position::{Location, PositionPair};

/// The unit of persistence
#[derive(Clone, PartialEq)]
pub struct BookRecord {
    /// Hex SHA-256 of `data`
    pub id: String,
    pub title: String,
    pub author: String,
    pub file_name: String,
    pub format: DocumentFormat,
    pub cover_image: Option<CoverImage>,
    /// Raw document bytes
    pub data: Vec<u8>,
    /// Progress in `[0, 100]`
    pub progress: f64,
    /// Exact resume token
    pub location: Option<Location>,
    pub added_at: DateTime<Utc>,
    pub last_opened_at: DateTime<Utc>,
    /// First time progress reached 100
    pub finished_at: Option<DateTime<Utc>>,
}

impl BookRecord {
    /// A fresh, unread record
    pub fn new(
        id: String,
        file_name: &str,
        format: DocumentFormat,
        metadata: DocumentMetadata,
        data: Vec<u8>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: metadata.title,
            author: metadata.author,
            file_name: file_name.to_string(),
            format,
            cover_image: metadata.cover_image,
            data,
            progress: 0.0,
            location: None,
            added_at: now,
            last_opened_at: now,
            finished_at: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Stored position as a pair
    pub fn position(&self) -> PositionPair {
        PositionPair::new(self.progress, self.location.clone())
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            file_name: self.file_name.clone(),
            format: self.format,
            size: self.size(),
            has_cover: self.cover_image.is_some(),
            progress: self.progress,
            location: self.location.clone(),
            added_at: self.added_at,
            last_opened_at: self.last_opened_at,
            finished_at: self.finished_at,
        }
    }
}

impl fmt::Debug for BookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookRecord")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("author", &self.author)
            .field("format", &self.format)
            .field("size", &self.data.len())
            .field("has_cover", &self.cover_image.is_some())
            .field("progress", &self.progress)
            .field("location", &self.location)
            .field("last_opened_at", &self.last_opened_at)
            .finish()
    }
}

/// Listing view of a record, bytes excluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub file_name: String,
    pub format: DocumentFormat,
    pub size: u64,
    pub has_cover: bool,
    pub progress: f64,
    pub location: Option<Location>,
    pub added_at: DateTime<Utc>,
    pub last_opened_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Library counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub total: u64,
    pub reading: u64,
    pub completed: u64,
}
