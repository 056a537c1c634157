//! Sliding render window over a fixed document
//!
//! Pages near the reader are rendered on demand; everything else is laid
//! out as a placeholder and filled in by a background task. Each scale
//! change bumps a generation counter, and render results carrying an older
//! generation are dropped on arrival.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::{RenderUnit, ScrollAnchor, UnitState};
use crate::config::RenderConfig;
use crate::document::{FixedEngine, PageSize};
use crate::error::{ReaderError, Result};
use crate::visibility::{visible_fraction, IntersectionEntry};

struct WindowState {
    total_pages: u32,
    current_page: u32,
    scale_percent: u16,
    viewport_width: f64,
    units: BTreeMap<u32, RenderUnit>,
}

pub struct WindowRenderer {
    engine: Arc<dyn FixedEngine>,
    config: RenderConfig,
    state: Mutex<WindowState>,
    generation: AtomicU64,
    loading: watch::Sender<bool>,
}

impl WindowRenderer {
    pub fn new(
        engine: Arc<dyn FixedEngine>,
        config: RenderConfig,
        scale_percent: u16,
        viewport_width: f64,
    ) -> Self {
        let total_pages = engine.page_count();
        let scale_percent = scale_percent.clamp(config.min_scale, config.max_scale);
        let (loading, _) = watch::channel(false);

        Self {
            engine,
            config,
            state: Mutex::new(WindowState {
                total_pages,
                current_page: 1,
                scale_percent,
                viewport_width,
                units: BTreeMap::new(),
            }),
            generation: AtomicU64::new(0),
            loading,
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.state.lock().total_pages
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().current_page
    }

    pub fn scale_percent(&self) -> u16 {
        self.state.lock().scale_percent
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Watch the loading flag raised while a scale change re-renders
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn unit(&self, page: u32) -> Option<RenderUnit> {
        self.state.lock().units.get(&page).cloned()
    }

    pub fn units(&self) -> Vec<RenderUnit> {
        self.state.lock().units.values().cloned().collect()
    }

    pub fn rendered_count(&self) -> usize {
        self.state
            .lock()
            .units
            .values()
            .filter(|unit| unit.is_rendered())
            .count()
    }

    /// Render the immediate window around `page`
    pub async fn open(&self, page: u32) -> Result<()> {
        if self.total_pages() == 0 {
            return Err(ReaderError::InvalidInput("document has no pages".into()));
        }
        tracing::debug!(page, total = self.total_pages(), "Opening render window");
        self.ensure_window(page).await
    }

    /// Move the window to `page` and wait until its pages are settled
    pub async fn ensure_window(&self, page: u32) -> Result<()> {
        let generation = self.generation();
        let pages = {
            let mut state = self.state.lock();
            if state.total_pages == 0 {
                return Ok(());
            }
            state.current_page = page.clamp(1, state.total_pages);
            self.immediate_window(&state)
        };
        self.render_pages(&pages, generation).await;
        Ok(())
    }

    /// Pages not yet settled, nearest to the current page first
    pub fn pending_pages(&self) -> Vec<u32> {
        let state = self.state.lock();
        let current = state.current_page;
        let mut pages: Vec<u32> = (1..=state.total_pages)
            .filter(|page| !state.units.get(page).is_some_and(RenderUnit::is_settled))
            .collect();
        pages.sort_by_key(|page| (page.abs_diff(current), *page));
        pages
    }

    /// Render every remaining page in small batches
    ///
    /// The task stops at the first batch boundary after a scale change.
    pub fn spawn_background_fill(self: &Arc<Self>) -> JoinHandle<()> {
        let renderer = Arc::clone(self);
        let generation = self.generation();
        let batch_size = self.config.batch_size.max(1);
        let batch_delay = self.config.batch_delay;

        tokio::spawn(async move {
            loop {
                if renderer.generation() != generation {
                    tracing::debug!(generation, "Background fill superseded");
                    return;
                }
                let batch: Vec<u32> = renderer
                    .pending_pages()
                    .into_iter()
                    .take(batch_size)
                    .collect();
                if batch.is_empty() {
                    tracing::debug!(generation, "Background fill complete");
                    return;
                }
                renderer.render_pages(&batch, generation).await;
                tokio::time::sleep(batch_delay).await;
            }
        })
    }

    /// Change the zoom level and re-render around the page under `scroll_top`
    ///
    /// Returns the scroll offset that keeps the same page and relative
    /// offset within it under the new layout.
    pub async fn set_scale(&self, percent: u16, scroll_top: f64) -> Result<f64> {
        let percent = percent.clamp(self.config.min_scale, self.config.max_scale);
        let anchor = self.anchor_at(scroll_top);

        let pages = {
            let mut state = self.state.lock();
            if state.scale_percent == percent {
                return Ok(scroll_top);
            }
            self.generation.fetch_add(1, Ordering::AcqRel);
            state.scale_percent = percent;
            if let Some(anchor) = anchor {
                state.current_page = anchor.page;
            }
            let pages: Vec<u32> = state.units.keys().copied().collect();
            for page in pages {
                let size = self.estimated_size(&state, page);
                state
                    .units
                    .insert(page, RenderUnit::placeholder(page, percent, size));
            }
            self.immediate_window(&state)
        };

        tracing::info!(percent, generation = self.generation(), "Scale changed");
        self.loading.send_replace(true);
        self.render_pages(&pages, self.generation()).await;
        self.loading.send_replace(false);

        Ok(anchor.map_or(scroll_top, |anchor| {
            self.scroll_top_for(anchor.page, anchor.ratio)
        }))
    }

    /// Top offset of `page` in the stacked layout
    pub fn page_top(&self, page: u32) -> f64 {
        let state = self.state.lock();
        (1..page.min(state.total_pages + 1))
            .map(|p| self.unit_height_locked(&state, p) + self.config.page_gap)
            .sum()
    }

    pub fn unit_height(&self, page: u32) -> f64 {
        let state = self.state.lock();
        self.unit_height_locked(&state, page)
    }

    /// Page under `scroll_top`, or `None` for an empty document
    pub fn anchor_at(&self, scroll_top: f64) -> Option<ScrollAnchor> {
        let state = self.state.lock();
        let mut top = 0.0;
        for page in 1..=state.total_pages {
            let height = self.unit_height_locked(&state, page);
            let bottom = top + height + self.config.page_gap;
            if scroll_top < bottom || page == state.total_pages {
                let ratio = if height > 0.0 {
                    ((scroll_top - top) / height).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return Some(ScrollAnchor { page, ratio });
            }
            top = bottom;
        }
        None
    }

    pub fn scroll_top_for(&self, page: u32, ratio: f64) -> f64 {
        self.page_top(page) + ratio.clamp(0.0, 1.0) * self.unit_height(page)
    }

    /// Intersection reports for every page overlapping the viewport
    pub fn intersections(&self, scroll_top: f64, viewport_height: f64) -> Vec<IntersectionEntry> {
        let state = self.state.lock();
        let mut entries = Vec::new();
        let mut top = 0.0;
        for page in 1..=state.total_pages {
            if top > scroll_top + viewport_height {
                break;
            }
            let height = self.unit_height_locked(&state, page);
            let ratio = visible_fraction(top, height, scroll_top, viewport_height);
            if ratio > 0.0 {
                entries.push(IntersectionEntry::new(page, ratio));
            }
            top += height + self.config.page_gap;
        }
        entries
    }

    fn immediate_window(&self, state: &WindowState) -> Vec<u32> {
        let current = state.current_page;
        let first = current.saturating_sub(self.config.window_before).max(1);
        let last = current
            .saturating_add(self.config.window_after)
            .min(state.total_pages);

        let mut pages: Vec<u32> = (first..=last).collect();
        if self.config.include_first_page && first > 1 {
            pages.insert(0, 1);
        }
        pages
    }

    /// Render `pages` outside the lock and commit if still current
    async fn render_pages(&self, pages: &[u32], generation: u64) {
        let jobs: Vec<(u32, f64)> = {
            let mut state = self.state.lock();
            let scale_percent = state.scale_percent;
            let mut jobs = Vec::new();
            for &page in pages {
                if page < 1 || page > state.total_pages {
                    continue;
                }
                if state.units.get(&page).is_some_and(RenderUnit::is_settled) {
                    continue;
                }
                let size = self.estimated_size(&state, page);
                state
                    .units
                    .entry(page)
                    .or_insert_with(|| RenderUnit::placeholder(page, scale_percent, size));
                jobs.push((page, self.raster_scale(&state, page)));
            }
            jobs
        };

        if jobs.is_empty() {
            return;
        }

        let results = join_all(
            jobs.iter()
                .map(|&(page, scale)| self.engine.render_page(page, scale)),
        )
        .await;

        let mut state = self.state.lock();
        if self.generation() != generation {
            tracing::debug!(
                generation,
                current = self.generation(),
                pages = jobs.len(),
                "Discarding stale renders"
            );
            return;
        }

        let scale_percent = state.scale_percent;
        for ((page, _), result) in jobs.into_iter().zip(results) {
            let unit = match result {
                Ok(rendered) => RenderUnit {
                    page,
                    size: PageSize::new(f64::from(rendered.width), f64::from(rendered.height)),
                    state: UnitState::Rendered(Arc::new(rendered)),
                    scale_percent,
                },
                Err(e) => {
                    tracing::warn!(page, error = %e, "Page render failed");
                    let size = self.estimated_size(&state, page);
                    RenderUnit {
                        page,
                        state: UnitState::Failed(e.to_string()),
                        scale_percent,
                        size,
                    }
                }
            };
            state.units.insert(page, unit);
        }
    }

    /// Engine scale for `page`: fit to the viewport width, then zoom
    fn raster_scale(&self, state: &WindowState, page: u32) -> f64 {
        let zoom = f64::from(state.scale_percent) / 100.0;
        match self.engine.page_size(page) {
            Some(size) if size.width > 0.0 && state.viewport_width > 0.0 => {
                state.viewport_width * self.config.fit_width_ratio / size.width * zoom
            }
            _ => zoom,
        }
    }

    fn estimated_size(&self, state: &WindowState, page: u32) -> PageSize {
        match self.engine.page_size(page) {
            Some(size) => {
                let scale = self.raster_scale(state, page);
                PageSize::new(size.width * scale, size.height * scale)
            }
            None => PageSize::new(
                state.viewport_width * self.config.fit_width_ratio,
                self.config.placeholder_height,
            ),
        }
    }

    fn unit_height_locked(&self, state: &WindowState, page: u32) -> f64 {
        match state.units.get(&page) {
            Some(unit) => unit.size.height,
            None => self.estimated_size(state, page).height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFixedEngine;
    use std::time::Duration;

    // 750 * 0.8 = 600, so a 600pt page renders at exactly the zoom level
    const VIEWPORT_WIDTH: f64 = 750.0;

    fn test_config() -> RenderConfig {
        RenderConfig {
            batch_delay: Duration::ZERO,
            ..RenderConfig::default()
        }
    }

    fn renderer(engine: FakeFixedEngine) -> Arc<WindowRenderer> {
        Arc::new(WindowRenderer::new(
            Arc::new(engine),
            test_config(),
            100,
            VIEWPORT_WIDTH,
        ))
    }

    fn rendered_pages(renderer: &WindowRenderer) -> Vec<u32> {
        renderer
            .units()
            .into_iter()
            .filter(RenderUnit::is_rendered)
            .map(|unit| unit.page)
            .collect()
    }

    #[tokio::test]
    async fn test_open_renders_immediate_window() {
        let r = renderer(FakeFixedEngine::new(50));
        r.open(10).await.unwrap();

        assert_eq!(rendered_pages(&r), vec![1, 9, 10, 11, 12]);
        assert!(r.unit(13).is_none());
        assert_eq!(r.unit(10).unwrap().size, PageSize::new(600.0, 800.0));
    }

    #[tokio::test]
    async fn test_window_stays_bounded() {
        let r = renderer(FakeFixedEngine::new(200));
        r.open(1).await.unwrap();
        r.ensure_window(100).await.unwrap();

        assert_eq!(r.current_page(), 100);
        assert_eq!(r.rendered_count(), 7);
        assert!(r.rendered_count() < 10);
        assert!(r.unit(100).unwrap().is_rendered());
    }

    #[tokio::test]
    async fn test_failed_page_does_not_abort_window() {
        let r = renderer(FakeFixedEngine::new(20).with_failing_pages(&[3]));
        r.open(2).await.unwrap();

        assert!(r.unit(3).unwrap().is_failed());
        assert_eq!(rendered_pages(&r), vec![1, 2, 4]);
        // Error placeholders keep their slot in the layout
        assert_eq!(r.unit_height(3), 800.0);
    }

    #[tokio::test]
    async fn test_pending_pages_by_proximity() {
        let r = renderer(FakeFixedEngine::new(12));
        r.open(5).await.unwrap();
        assert_eq!(r.pending_pages(), vec![3, 2, 8, 9, 10, 11, 12]);
    }

    #[tokio::test]
    async fn test_background_fill_renders_everything() {
        let engine = Arc::new(FakeFixedEngine::new(12));
        let r = Arc::new(WindowRenderer::new(
            engine.clone(),
            test_config(),
            100,
            VIEWPORT_WIDTH,
        ));
        r.open(5).await.unwrap();
        r.spawn_background_fill().await.unwrap();

        assert_eq!(r.rendered_count(), 12);
        assert!(r.pending_pages().is_empty());
        assert_eq!(engine.render_count(), 12);
    }

    #[tokio::test]
    async fn test_scale_change_keeps_anchor() {
        let r = renderer(FakeFixedEngine::new(50));
        r.open(10).await.unwrap();

        let scroll_top = r.scroll_top_for(10, 0.25);
        assert_eq!(scroll_top, 9.0 * 800.0 + 200.0);

        let mut loading = r.loading();
        let new_top = r.set_scale(150, scroll_top).await.unwrap();

        let anchor = r.anchor_at(new_top).unwrap();
        assert_eq!(anchor.page, 10);
        assert!((anchor.ratio - 0.25).abs() < 1e-9);
        assert_eq!(r.scale_percent(), 150);

        let unit = r.unit(10).unwrap();
        assert!(unit.is_rendered());
        assert_eq!(unit.scale_percent, 150);
        assert_eq!(unit.size.height, 1200.0);

        assert!(loading.has_changed().unwrap());
        assert!(!*loading.borrow_and_update());
    }

    #[tokio::test]
    async fn test_scale_change_invalidates_rendered_pages() {
        let r = renderer(FakeFixedEngine::new(30));
        r.open(10).await.unwrap();
        r.spawn_background_fill().await.unwrap();
        assert_eq!(r.rendered_count(), 30);

        let scroll_top = r.scroll_top_for(10, 0.25);
        r.set_scale(150, scroll_top).await.unwrap();

        // Only the immediate window is re-rendered at the new scale
        assert_eq!(rendered_pages(&r), vec![1, 9, 10, 11, 12]);
        assert_eq!(r.unit(25).unwrap().state, UnitState::Placeholder);
        assert!(r.units().iter().all(|unit| unit.scale_percent == 150));
        assert_eq!(r.pending_pages().len(), 25);
    }

    #[tokio::test]
    async fn test_scale_is_clamped() {
        let r = renderer(FakeFixedEngine::new(5));
        r.open(1).await.unwrap();
        r.set_scale(500, 0.0).await.unwrap();
        assert_eq!(r.scale_percent(), 200);
        r.set_scale(10, 0.0).await.unwrap();
        assert_eq!(r.scale_percent(), 50);
    }

    #[tokio::test]
    async fn test_stale_renders_are_discarded() {
        let engine = FakeFixedEngine::new(40).with_render_delay(Duration::from_millis(100));
        let r = renderer(engine);
        r.open(1).await.unwrap();

        let moving = {
            let r = r.clone();
            tokio::spawn(async move { r.ensure_window(20).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Anchor stays on page 1 because scroll_top is 0
        r.set_scale(150, 0.0).await.unwrap();
        moving.await.unwrap().unwrap();

        let stale = r.unit(20).unwrap();
        assert_eq!(stale.state, UnitState::Placeholder);
        assert_eq!(stale.scale_percent, 150);
        assert!(r.unit(1).unwrap().is_rendered());
    }

    #[tokio::test]
    async fn test_intersections_follow_layout() {
        let r = renderer(FakeFixedEngine::new(10));
        r.open(1).await.unwrap();

        let entries = r.intersections(600.0, 800.0);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].unit, 1);
        assert!((entries[0].ratio - 0.25).abs() < 1e-9);
        assert_eq!(entries[1].unit, 2);
        assert!((entries[1].ratio - 0.75).abs() < 1e-9);
    }
}
