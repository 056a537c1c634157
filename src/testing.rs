//! In-memory engines and helpers for unit tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::DatabaseConfig;
use crate::document::{
    Document, DocumentFormat, DocumentOpener, FixedEngine, FlowEngine, FlowLocation, OutlineEntry,
    PageSize, RenderedPage,
};
use crate::error::{ReaderError, Result};
use crate::position::Location;
use crate::session::{NoticeLevel, Notifier};
use crate::store::BookStore;

/// Book store backed by a database file in a fresh temp dir
pub async fn temp_store() -> (BookStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("reader.db").display()),
        max_connections: 2,
    };
    let store = BookStore::connect(&config).await.unwrap();
    (store, temp_dir)
}

/// Bytes detected as a fixed document
pub fn pdf_bytes(tag: &str) -> Vec<u8> {
    format!("%PDF-1.7\n% {}\n", tag).into_bytes()
}

/// Bytes detected as a flow document
pub fn epub_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = b"PK\x03\x04".to_vec();
    bytes.extend_from_slice(&[0u8; 26]);
    bytes.extend_from_slice(b"mimetypeapplication/epub+zip");
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

/// Flow engine with `sections` equal sections; token `pos-{i}` sits at `i / sections`
pub struct FakeFlowEngine {
    sections: u32,
    current: Mutex<Option<u32>>,
    font_scale: AtomicU16,
}

impl FakeFlowEngine {
    pub fn new(sections: u32) -> Self {
        Self {
            sections: sections.max(1),
            current: Mutex::new(None),
            font_scale: AtomicU16::new(100),
        }
    }

    pub fn font_scale(&self) -> u16 {
        self.font_scale.load(Ordering::Acquire)
    }

    fn location(&self, section: u32) -> FlowLocation {
        FlowLocation::new(
            format!("pos-{}", section),
            f64::from(section) / f64::from(self.sections),
        )
    }

    fn parse(&self, token: &str) -> Option<u32> {
        token
            .strip_prefix("pos-")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n < self.sections)
    }

    fn move_to(&self, section: u32) -> FlowLocation {
        *self.current.lock() = Some(section);
        self.location(section)
    }
}

#[async_trait]
impl FlowEngine for FakeFlowEngine {
    async fn display(&self, token: Option<&str>) -> Result<FlowLocation> {
        let section = match token {
            Some(token) => self
                .parse(token)
                .ok_or_else(|| ReaderError::InvalidInput(format!("unknown token {}", token)))?,
            None => 0,
        };
        Ok(self.move_to(section))
    }

    async fn next(&self) -> Result<FlowLocation> {
        let current = self.current.lock().unwrap_or(0);
        Ok(self.move_to((current + 1).min(self.sections - 1)))
    }

    async fn prev(&self) -> Result<FlowLocation> {
        let current = self.current.lock().unwrap_or(0);
        Ok(self.move_to(current.saturating_sub(1)))
    }

    fn current_location(&self) -> Option<FlowLocation> {
        self.current.lock().map(|section| self.location(section))
    }

    fn token_at_fraction(&self, fraction: f64) -> Option<String> {
        let section = (fraction * f64::from(self.sections)).floor().max(0.0) as u32;
        Some(format!("pos-{}", section.min(self.sections - 1)))
    }

    fn is_valid_token(&self, token: &str) -> bool {
        self.parse(token).is_some()
    }

    fn section_location(&self, section: u32) -> Option<FlowLocation> {
        (section < self.sections).then(|| self.location(section))
    }

    fn outline(&self) -> Vec<OutlineEntry> {
        (0..self.sections)
            .map(|i| {
                OutlineEntry::new(
                    format!("Chapter {}", i + 1),
                    Some(Location::Content(format!("pos-{}", i))),
                )
            })
            .collect()
    }

    fn set_font_scale(&self, percent: u16) {
        self.font_scale.store(percent, Ordering::Release);
    }
}

/// Fixed engine with uniform 600x800 pages
pub struct FakeFixedEngine {
    pages: u32,
    size: PageSize,
    failing: HashSet<u32>,
    delay: Option<Duration>,
    renders: AtomicUsize,
}

impl FakeFixedEngine {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            size: PageSize::new(600.0, 800.0),
            failing: HashSet::new(),
            delay: None,
            renders: AtomicUsize::new(0),
        }
    }

    pub fn with_failing_pages(mut self, pages: &[u32]) -> Self {
        self.failing = pages.iter().copied().collect();
        self
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::Acquire)
    }
}

#[async_trait]
impl FixedEngine for FakeFixedEngine {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn page_size(&self, page: u32) -> Option<PageSize> {
        (1..=self.pages).contains(&page).then_some(self.size)
    }

    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.renders.fetch_add(1, Ordering::AcqRel);

        if self.failing.contains(&page) || !(1..=self.pages).contains(&page) {
            return Err(ReaderError::RenderFault {
                page,
                reason: "corrupt page stream".to_string(),
            });
        }

        Ok(RenderedPage {
            width: (self.size.width * scale).round() as u32,
            height: (self.size.height * scale).round() as u32,
            pixels: Vec::new(),
        })
    }

    async fn outline(&self) -> Result<Vec<OutlineEntry>> {
        Ok((0..self.pages.div_ceil(10))
            .map(|k| {
                OutlineEntry::new(
                    format!("Chapter {}", k + 1),
                    Some(Location::Page(k * 10 + 1)),
                )
            })
            .collect())
    }
}

/// Opener that hands out preconfigured engines
#[derive(Default)]
pub struct FakeOpener {
    flow: Option<Arc<FakeFlowEngine>>,
    fixed: Option<Arc<FakeFixedEngine>>,
}

impl FakeOpener {
    pub fn flow(engine: Arc<FakeFlowEngine>) -> Self {
        Self {
            flow: Some(engine),
            fixed: None,
        }
    }

    pub fn fixed(engine: Arc<FakeFixedEngine>) -> Self {
        Self {
            flow: None,
            fixed: Some(engine),
        }
    }

    /// Fails every open with a decode fault
    pub fn broken() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentOpener for FakeOpener {
    async fn open(&self, format: DocumentFormat, _bytes: Arc<[u8]>) -> Result<Document> {
        match format {
            DocumentFormat::Flow => self
                .flow
                .clone()
                .map(|engine| Document::flow(engine))
                .ok_or_else(|| ReaderError::DecodeFault("unreadable flow document".into())),
            DocumentFormat::Fixed => self
                .fixed
                .clone()
                .map(|engine| Document::fixed(engine))
                .ok_or_else(|| ReaderError::DecodeFault("unreadable fixed document".into())),
        }
    }
}

/// Notifier that records every message
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(NoticeLevel, String)> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        self.messages.lock().push((level, message.to_string()));
    }
}
