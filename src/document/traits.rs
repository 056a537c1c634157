//! Document engine traits
//!
//! The format engines (text layout for flow documents, rasterization for
//! fixed documents) are opaque collaborators. These traits are the only
//! surface the reader core needs from them.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{
    DocumentFormat, DocumentMetadata, FlowLocation, OutlineEntry, PageSize, RenderedPage,
};
use super::Document;
use crate::error::Result;

/// Reflowable document engine
#[async_trait]
pub trait FlowEngine: Send + Sync {
    /// Display the document at `token`, or at the start when `None`
    async fn display(&self, token: Option<&str>) -> Result<FlowLocation>;

    /// Advance one screen
    async fn next(&self) -> Result<FlowLocation>;

    /// Go back one screen
    async fn prev(&self) -> Result<FlowLocation>;

    /// Where the rendition currently is, if it has settled
    fn current_location(&self) -> Option<FlowLocation>;

    /// Content token at a fractional offset
    fn token_at_fraction(&self, fraction: f64) -> Option<String>;

    /// Whether a stored token still resolves in this rendition
    fn is_valid_token(&self, token: &str) -> bool;

    /// Start location of a laid-out section, used for visibility mapping
    fn section_location(&self, section: u32) -> Option<FlowLocation>;

    /// Table of contents
    fn outline(&self) -> Vec<OutlineEntry>;

    /// Apply a font scale in percent
    fn set_font_scale(&self, percent: u16);
}

/// Fixed-page document engine
#[async_trait]
pub trait FixedEngine: Send + Sync {
    fn page_count(&self) -> u32;

    /// Page size at scale 1.0 (`None` if unknown before rendering)
    fn page_size(&self, page: u32) -> Option<PageSize>;

    /// Rasterize `page` (1-based) at `scale`
    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage>;

    /// Table of contents with page targets
    async fn outline(&self) -> Result<Vec<OutlineEntry>>;
}

/// Opens document bytes with the matching engine
#[async_trait]
pub trait DocumentOpener: Send + Sync {
    /// Fails with `ReaderError::DecodeFault` when the bytes are unreadable
    async fn open(&self, format: DocumentFormat, bytes: Arc<[u8]>) -> Result<Document>;
}

/// Extracts title, author and cover once, at save time
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn describe(
        &self,
        format: DocumentFormat,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<DocumentMetadata>;
}
