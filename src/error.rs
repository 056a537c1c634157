//! Error types for the reader core

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Reader error type
///
/// Faults during the initial open of a book (`NotFound`, `DecodeFault`)
/// abort that open. `StorageFault` on a progress write and `RenderFault`
/// on a single page are local and never abort the session.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Requested book id is not in the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence layer transaction failed
    #[error("Storage fault: {0}")]
    StorageFault(#[from] sqlx::Error),

    /// Document bytes unreadable by the format engine
    #[error("Decode fault: {0}")]
    DecodeFault(String),

    /// A single page failed to materialize
    #[error("Render fault on page {page}: {reason}")]
    RenderFault { page: u32, reason: String },

    /// Caller passed an unusable value (unknown format, page out of range)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Position reported before any book was opened
    #[error("No book is currently open")]
    NotOpen,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
