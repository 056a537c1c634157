//! Lazy page materialization for fixed documents

mod types;
mod window;

pub use types::{RenderUnit, ScrollAnchor, UnitState};
pub use window::WindowRenderer;
