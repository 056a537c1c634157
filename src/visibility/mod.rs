//! Visibility tracking
//!
//! Turns batches of intersection reports ("unit N is X% visible") into at
//! most one observed position candidate. Reports are incremental: a batch
//! only carries the units whose visibility changed, so the latest ratio of
//! every unit is kept across batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::document::FlowEngine;
use crate::position::{self, PositionPair};

/// One intersection report for a layout unit (page or section)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub unit: u32,
    /// Visible fraction of the unit, `[0, 1]`
    pub ratio: f64,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn new(unit: u32, ratio: f64) -> Self {
        Self {
            unit,
            ratio,
            is_intersecting: ratio > 0.0,
        }
    }
}

/// Maps a layout unit to its position pair
pub type PositionMapper = Box<dyn Fn(u32) -> Option<PositionPair> + Send + Sync>;

pub struct VisibilityTracker {
    threshold: f64,
    mapper: PositionMapper,
    ratios: BTreeMap<u32, f64>,
    previous: Option<u32>,
    latest: Option<PositionPair>,
}

impl VisibilityTracker {
    pub fn new(threshold: f64, mapper: PositionMapper) -> Self {
        Self {
            threshold,
            mapper,
            ratios: BTreeMap::new(),
            previous: None,
            latest: None,
        }
    }

    /// Tracker for a fixed document whose units are 1-based pages
    pub fn for_fixed(threshold: f64, total_pages: u32) -> Self {
        Self::new(
            threshold,
            Box::new(move |page: u32| {
                (1..=total_pages)
                    .contains(&page)
                    .then(|| position::fixed_pair(page, total_pages))
            }),
        )
    }

    /// Tracker for a flow document whose units are laid-out sections
    pub fn for_flow(threshold: f64, engine: Arc<dyn FlowEngine>) -> Self {
        Self::new(
            threshold,
            Box::new(move |section: u32| {
                engine
                    .section_location(section)
                    .map(|loc| position::flow_pair(loc.fraction, loc.token))
            }),
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Apply a batch and return a candidate if some unit is visible enough
    pub fn observe(&mut self, batch: &[IntersectionEntry]) -> Option<PositionPair> {
        for entry in batch {
            if entry.is_intersecting && entry.ratio > 0.0 {
                self.ratios.insert(entry.unit, entry.ratio.min(1.0));
            } else {
                self.ratios.remove(&entry.unit);
            }
        }

        let (unit, ratio) = self.most_visible()?;
        if ratio <= self.threshold {
            return None;
        }

        let position = (self.mapper)(unit)?;
        self.previous = Some(unit);
        self.latest = Some(position.clone());
        tracing::trace!(unit, ratio, percentage = position.percentage, "Observed unit");
        Some(position)
    }

    /// Most visible unit; ties go to the unit nearest the last reported one
    pub fn most_visible(&self) -> Option<(u32, f64)> {
        let distance = |unit: u32| self.previous.map_or(0, |prev| unit.abs_diff(prev));

        self.ratios
            .iter()
            .map(|(&unit, &ratio)| (unit, ratio))
            .fold(None, |best: Option<(u32, f64)>, (unit, ratio)| match best {
                None => Some((unit, ratio)),
                Some((best_unit, best_ratio)) => {
                    if ratio > best_ratio
                        || (ratio == best_ratio && distance(unit) < distance(best_unit))
                    {
                        Some((unit, ratio))
                    } else {
                        best
                    }
                }
            })
    }

    /// Last candidate produced, for callers that poll
    pub fn latest_candidate(&self) -> Option<&PositionPair> {
        self.latest.as_ref()
    }

    /// Forget all ratios, e.g. after the layout was rebuilt
    pub fn reset(&mut self) {
        self.ratios.clear();
    }
}

/// Visible fraction of a unit spanning `[top, top + height)` in a viewport
pub fn visible_fraction(top: f64, height: f64, viewport_top: f64, viewport_height: f64) -> f64 {
    if height <= 0.0 || viewport_height <= 0.0 {
        return 0.0;
    }
    let start = top.max(viewport_top);
    let end = (top + height).min(viewport_top + viewport_height);
    ((end - start).max(0.0) / height).min(1.0)
}
