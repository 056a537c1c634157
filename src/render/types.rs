//! Render unit types

use std::sync::Arc;

use crate::document::{PageSize, RenderedPage};

/// Materialization state of one page
#[derive(Debug, Clone, PartialEq)]
pub enum UnitState {
    /// Laid out with an estimated size, nothing drawn
    Placeholder,
    Rendered(Arc<RenderedPage>),
    /// Rendering failed; shown as an error placeholder
    Failed(String),
}

/// A page slot in the window
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUnit {
    pub page: u32,
    pub state: UnitState,
    /// Scale the unit was laid out or rendered at
    pub scale_percent: u16,
    /// Display size in layout pixels
    pub size: PageSize,
}

impl RenderUnit {
    pub fn placeholder(page: u32, scale_percent: u16, size: PageSize) -> Self {
        Self {
            page,
            state: UnitState::Placeholder,
            scale_percent,
            size,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self.state, UnitState::Rendered(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, UnitState::Failed(_))
    }

    /// Rendered or failed; either way nothing left to do at this scale
    pub fn is_settled(&self) -> bool {
        !matches!(self.state, UnitState::Placeholder)
    }
}

/// Page under a scroll offset and how far into it the offset sits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    pub page: u32,
    /// Offset within the page as a fraction of its height, `[0, 1]`
    pub ratio: f64,
}
