//! Reader session
//!
//! Wires user intents and screen observations through the position model,
//! the reconciler, the visibility tracker and (for fixed documents) the
//! render window. One session has at most one open book.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::document::{
    active_entry_for_page, flatten_outline, Document, DocumentFormat, DocumentOpener,
    FlowLocation, OutlineEntry,
};
use crate::error::{ReaderError, Result};
use crate::position::{self, Location, PositionPair, ResumeTarget};
use crate::reconcile::{Clock, Decision, OpenedBook, Reconciler, SystemClock};
use crate::render::WindowRenderer;
use crate::settings::{ReaderSettings, SettingsStore};
use crate::store::BookStore;
use crate::visibility::{IntersectionEntry, VisibilityTracker};

/// Default layout width used to fit fixed pages
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing notices (toasts, status lines)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(notice = %message),
            NoticeLevel::Warning => tracing::warn!(notice = %message),
            NoticeLevel::Error => tracing::error!(notice = %message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

struct ActiveBook {
    id: String,
    document: Document,
    outline: Vec<OutlineEntry>,
    tracker: VisibilityTracker,
    renderer: Option<Arc<WindowRenderer>>,
    fill: Option<JoinHandle<()>>,
}

impl ActiveBook {
    fn stop_fill(&mut self) {
        if let Some(fill) = self.fill.take() {
            fill.abort();
        }
    }
}

pub struct ReaderSession {
    store: BookStore,
    reconciler: Reconciler,
    opener: Arc<dyn DocumentOpener>,
    notifier: Arc<dyn Notifier>,
    settings_store: SettingsStore,
    settings: ReaderSettings,
    config: Config,
    viewport_width: f64,
    active: Option<ActiveBook>,
}

impl ReaderSession {
    pub fn new(
        store: BookStore,
        opener: Arc<dyn DocumentOpener>,
        notifier: Arc<dyn Notifier>,
        config: Config,
    ) -> Self {
        let reconciler = Reconciler::new(
            store.clone(),
            Arc::new(SystemClock),
            config.reconcile.clone(),
        );
        Self {
            settings_store: SettingsStore::new(&store),
            store,
            reconciler,
            opener,
            notifier,
            settings: ReaderSettings::default(),
            config,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            active: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reconciler = Reconciler::new(self.store.clone(), clock, self.config.reconcile.clone());
        self
    }

    pub fn with_viewport_width(mut self, width: f64) -> Self {
        self.viewport_width = width;
        self
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn document(&self) -> Option<&Document> {
        self.active.as_ref().map(|book| &book.document)
    }

    pub fn book_id(&self) -> Option<&str> {
        self.active.as_ref().map(|book| book.id.as_str())
    }

    pub fn outline(&self) -> &[OutlineEntry] {
        self.active
            .as_ref()
            .map(|book| book.outline.as_slice())
            .unwrap_or(&[])
    }

    pub fn renderer(&self) -> Option<&Arc<WindowRenderer>> {
        self.active.as_ref().and_then(|book| book.renderer.as_ref())
    }

    pub async fn current_position(&self) -> Option<PositionPair> {
        self.reconciler.current().await
    }

    /// Open a book and land on its stored position
    ///
    /// Any failure aborts the open and is reported through the notifier.
    pub async fn open(&mut self, id: &str) -> Result<PositionPair> {
        self.close().await;

        match self.load(id).await {
            Ok(position) => Ok(position),
            Err(e) => {
                self.reconciler.close().await;
                tracing::error!(id = %id, error = %e, "Failed to open book");
                self.notifier
                    .notify(&format!("Error loading book: {}", e), NoticeLevel::Error);
                Err(e)
            }
        }
    }

    async fn load(&mut self, id: &str) -> Result<PositionPair> {
        let OpenedBook {
            mut record,
            initial,
        } = self.reconciler.open(id).await?;

        self.settings = match self.settings_store.load().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Using default reader settings");
                ReaderSettings::default()
            }
        };

        let bytes: Arc<[u8]> = std::mem::take(&mut record.data).into();
        let document = self.opener.open(record.format, bytes).await?;
        let outline = match document.outline().await {
            Ok(outline) => outline,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Outline unavailable");
                Vec::new()
            }
        };

        let threshold = self.config.visibility.threshold;
        let (seed, tracker, renderer, fill) = match &document {
            Document::Flow(engine) => {
                engine.set_font_scale(self.settings.flow_scale);
                let token = match position::resume_flow(&initial, |t| engine.is_valid_token(t)) {
                    ResumeTarget::Token(token) => Some(token),
                    ResumeTarget::Fraction(fraction) => engine.token_at_fraction(fraction),
                    ResumeTarget::Start => None,
                };
                let landed = engine.display(token.as_deref()).await?;
                let landed = position::flow_pair(landed.fraction, landed.token);
                // Layout may land slightly before the stored position
                let seed = PositionPair::new(
                    initial.percentage.max(landed.percentage),
                    landed.location,
                );
                let tracker = VisibilityTracker::for_flow(threshold, engine.clone());
                (seed, tracker, None, None)
            }
            Document::Fixed(doc) => {
                let total = doc.page_count();
                let page = position::resume_fixed(&initial, total);
                let seed = doc.seek(page)?;
                let renderer = Arc::new(WindowRenderer::new(
                    doc.engine().clone(),
                    self.config.render.clone(),
                    self.settings.fixed_scale,
                    self.viewport_width,
                ));
                renderer.open(page).await?;
                let fill = renderer.spawn_background_fill();
                let tracker = VisibilityTracker::for_fixed(threshold, total);
                (seed, tracker, Some(renderer), Some(fill))
            }
        };

        self.reconciler.seed(seed.clone()).await?;

        tracing::info!(
            id = %id,
            title = %record.title,
            format = record.format.as_str(),
            percentage = seed.percentage,
            location = ?seed.location,
            "Opened book"
        );

        self.active = Some(ActiveBook {
            id: record.id,
            document,
            outline,
            tracker,
            renderer,
            fill,
        });

        Ok(seed)
    }

    /// Close the open book; returns its last position
    pub async fn close(&mut self) -> Option<PositionPair> {
        let mut book = self.active.take()?;
        book.stop_fill();
        let position = self.reconciler.close().await;
        tracing::debug!(id = %book.id, "Closed book");
        position
    }

    /// Next or previous screen (flow) or page (fixed)
    pub async fn navigate(&mut self, direction: Direction) -> Result<Decision> {
        let book = self.active.as_ref().ok_or(ReaderError::NotOpen)?;
        let page = match &book.document {
            Document::Flow(engine) => {
                let landed = match direction {
                    Direction::Next => engine.next().await?,
                    Direction::Prev => engine.prev().await?,
                };
                let pair = position::flow_pair(landed.fraction, landed.token);
                return self.reconciler.report_direct(pair).await;
            }
            Document::Fixed(doc) => {
                let current = doc.current_page();
                match direction {
                    Direction::Next => current.saturating_add(1).min(doc.page_count()),
                    Direction::Prev => current.saturating_sub(1).max(1),
                }
            }
        };
        self.go_to_page(page).await
    }

    /// Jump to a page of a fixed document
    pub async fn go_to_page(&mut self, page: u32) -> Result<Decision> {
        let book = self.active.as_ref().ok_or(ReaderError::NotOpen)?;
        let Document::Fixed(doc) = &book.document else {
            return Err(ReaderError::InvalidInput(
                "page navigation needs a fixed document".into(),
            ));
        };

        let pair = doc.seek(page)?;
        let decision = self.reconciler.report_direct(pair).await?;
        if let Some(renderer) = &book.renderer {
            renderer.ensure_window(page).await?;
        }
        Ok(decision)
    }

    /// Follow a table-of-contents entry
    pub async fn jump_to_outline(&mut self, target: &Location) -> Result<Decision> {
        let book = self.active.as_ref().ok_or(ReaderError::NotOpen)?;
        let pair = book.document.seek(target).await?;
        let decision = self.reconciler.report_outline(pair).await?;
        if let (Some(renderer), Some(page)) = (&book.renderer, target.page()) {
            renderer.ensure_window(page).await?;
        }
        Ok(decision)
    }

    /// Feed an intersection batch from the layout
    ///
    /// Returns `None` when no unit was visible enough to form a candidate.
    pub async fn observe(&mut self, batch: &[IntersectionEntry]) -> Result<Option<Decision>> {
        let book = self.active.as_mut().ok_or(ReaderError::NotOpen)?;
        let Some(pair) = book.tracker.observe(batch) else {
            return Ok(None);
        };

        let decision = self.reconciler.report_observed(pair).await?;
        if let (Document::Fixed(doc), Some(page)) = (
            &book.document,
            decision
                .accepted_position()
                .and_then(|p| p.location.as_ref())
                .and_then(Location::page),
        ) {
            doc.seek(page)?;
            if let Some(renderer) = &book.renderer {
                renderer.ensure_window(page).await?;
            }
        }
        Ok(Some(decision))
    }

    /// The flow engine settled on a new location by itself
    pub async fn relocated(&mut self, location: FlowLocation) -> Result<Decision> {
        let book = self.active.as_ref().ok_or(ReaderError::NotOpen)?;
        if book.document.format() != DocumentFormat::Flow {
            return Err(ReaderError::InvalidInput(
                "relocation events come from flow documents".into(),
            ));
        }
        let pair = position::flow_pair(location.fraction, location.token);
        self.reconciler.report_observed(pair).await
    }

    /// Change the zoom (fixed) or font scale (flow) of the open book
    ///
    /// Returns the scroll offset that keeps the reader on the same spot.
    pub async fn set_scale(&mut self, percent: u16, scroll_top: f64) -> Result<f64> {
        let book = self.active.as_mut().ok_or(ReaderError::NotOpen)?;
        let format = book.document.format();
        let percent = self.settings.set_scale(format, percent);

        if let Err(e) = self.settings_store.save(&self.settings).await {
            tracing::warn!(error = %e, "Failed to persist reader settings");
        }

        match &book.document {
            Document::Flow(engine) => {
                engine.set_font_scale(percent);
                Ok(scroll_top)
            }
            Document::Fixed(_) => {
                let Some(renderer) = book.renderer.clone() else {
                    return Ok(scroll_top);
                };
                book.stop_fill();
                let new_top = renderer.set_scale(percent, scroll_top).await?;
                book.tracker.reset();
                book.fill = Some(renderer.spawn_background_fill());
                Ok(new_top)
            }
        }
    }

    /// Mark the open book as finished
    pub async fn mark_complete(&mut self) -> Result<Decision> {
        if self.active.is_none() {
            return Err(ReaderError::NotOpen);
        }
        let decision = self.reconciler.mark_complete().await?;
        self.notifier
            .notify("Book marked as completed!", NoticeLevel::Success);
        Ok(decision)
    }

    /// Outline entry for the current position
    ///
    /// Fixed documents use the nearest entry starting at or before the
    /// current page. Flow documents match the entry at the current token.
    pub async fn active_outline_entry(&self) -> Option<OutlineEntry> {
        let book = self.active.as_ref()?;
        match &book.document {
            Document::Fixed(doc) => {
                active_entry_for_page(&book.outline, doc.current_page()).cloned()
            }
            Document::Flow(_) => {
                let current = self.reconciler.current().await?.location?;
                flatten_outline(&book.outline)
                    .into_iter()
                    .find(|entry| entry.target.as_ref() == Some(&current))
                    .cloned()
            }
        }
    }
}
