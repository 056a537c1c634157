//! Unified document abstraction
//!
//! A book is either a flow document or a fixed document. Both sit behind
//! the same small capability surface (current position, seek, outline), so
//! the reconciler and position model never branch on format.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │         Document         │
//!                 │  current_position / seek │
//!                 │         / outline        │
//!                 └────────────┬─────────────┘
//!                 ┌────────────┴─────────────┐
//!                 ▼                          ▼
//!        ┌─────────────────┐        ┌─────────────────┐
//!        │  FlowEngine     │        │  FixedDocument  │
//!        │  (fraction +    │        │  (page index +  │
//!        │   content token)│        │   FixedEngine)  │
//!        └─────────────────┘        └─────────────────┘
//! ```

mod metadata;
mod traits;
mod types;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub use metadata::{title_from_file_name, with_fallbacks, FallbackMetadata, UNKNOWN_AUTHOR};
pub use traits::{DocumentOpener, FixedEngine, FlowEngine, MetadataExtractor};
pub use types::{
    active_entry_for_page, flatten_outline, CoverImage, DocumentFormat, DocumentMetadata,
    FlowLocation, OutlineEntry, PageSize, RenderedPage,
};

use crate::error::{ReaderError, Result};
use crate::position::{self, Location, PositionPair};

/// An opened document
#[derive(Clone)]
pub enum Document {
    Flow(Arc<dyn FlowEngine>),
    Fixed(Arc<FixedDocument>),
}

impl Document {
    pub fn flow(engine: Arc<dyn FlowEngine>) -> Self {
        Document::Flow(engine)
    }

    pub fn fixed(engine: Arc<dyn FixedEngine>) -> Self {
        Document::Fixed(Arc::new(FixedDocument::new(engine)))
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            Document::Flow(_) => DocumentFormat::Flow,
            Document::Fixed(_) => DocumentFormat::Fixed,
        }
    }

    /// Current position as a `(percentage, location)` pair
    pub fn current_position(&self) -> Option<PositionPair> {
        match self {
            Document::Flow(engine) => engine
                .current_location()
                .map(|loc| position::flow_pair(loc.fraction, loc.token)),
            Document::Fixed(doc) => Some(doc.position()),
        }
    }

    /// Move to `target` and report where the document landed
    pub async fn seek(&self, target: &Location) -> Result<PositionPair> {
        match (self, target) {
            (Document::Flow(engine), Location::Content(token)) => {
                let loc = engine.display(Some(token)).await?;
                Ok(position::flow_pair(loc.fraction, loc.token))
            }
            (Document::Fixed(doc), Location::Page(page)) => doc.seek(*page),
            (_, target) => Err(ReaderError::InvalidInput(format!(
                "{} is not a {} document location",
                target,
                self.format().as_str()
            ))),
        }
    }

    pub async fn outline(&self) -> Result<Vec<OutlineEntry>> {
        match self {
            Document::Flow(engine) => Ok(engine.outline()),
            Document::Fixed(doc) => doc.engine().outline().await,
        }
    }
}

/// A fixed-page document plus the page the reader is on
pub struct FixedDocument {
    engine: Arc<dyn FixedEngine>,
    current_page: AtomicU32,
}

impl FixedDocument {
    pub fn new(engine: Arc<dyn FixedEngine>) -> Self {
        Self {
            engine,
            current_page: AtomicU32::new(1),
        }
    }

    pub fn engine(&self) -> &Arc<dyn FixedEngine> {
        &self.engine
    }

    pub fn page_count(&self) -> u32 {
        self.engine.page_count()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page.load(Ordering::Acquire)
    }

    pub fn position(&self) -> PositionPair {
        position::fixed_pair(self.current_page(), self.page_count())
    }

    /// Set the current page; fails for pages outside `1..=page_count`
    pub fn seek(&self, page: u32) -> Result<PositionPair> {
        let total = self.page_count();
        if page < 1 || page > total {
            return Err(ReaderError::InvalidInput(format!(
                "page {} outside 1..={}",
                page, total
            )));
        }
        self.current_page.store(page, Ordering::Release);
        Ok(position::fixed_pair(page, total))
    }
}
