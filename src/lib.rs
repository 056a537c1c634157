//! Libros Reader
//!
//! Core of a local ebook reader: stores uploaded books and resumes each one
//! exactly where the reader left off, for both reflowable (flow) and paged
//! (fixed) documents.
//!
//! # Modules
//!
//! - `store`: Content-addressed SQLite persistence of book bytes and progress
//! - `position`: Format-agnostic `(percentage, location)` pairs
//! - `reconcile`: Decides which position candidates become current
//! - `visibility`: Intersection batches to observed positions
//! - `render`: Sliding render window for fixed documents
//! - `document`: Engine traits and the `Document` variant
//! - `session`: Glue between user intents and the modules above

pub mod config;
pub mod document;
pub mod error;
pub mod position;
pub mod reconcile;
pub mod render;
pub mod session;
pub mod settings;
pub mod store;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{ReaderError, Result};
pub use session::ReaderSession;
pub use store::BookStore;
