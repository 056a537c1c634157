//! Position types shared by the store, reconciler and session

use std::fmt;

use serde::{Deserialize, Serialize};

/// Format-specific resume token
///
/// Serialized untagged so the stored JSON is either a page number (`42`)
/// or a content reference string (`"epubcfi(/6/4!/4/2)"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Page index of a fixed document (1-based)
    Page(u32),
    /// Content-position reference understood by the flow engine
    Content(String),
}

impl Location {
    pub fn page(&self) -> Option<u32> {
        match self {
            Location::Page(page) => Some(*page),
            Location::Content(_) => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Location::Content(token) => Some(token),
            Location::Page(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Page(page) => write!(f, "page {}", page),
            Location::Content(token) => f.write_str(token),
        }
    }
}

/// The format-agnostic `(percentage, location)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPair {
    /// Progress in `[0, 100]`
    pub percentage: f64,
    /// Exact resume token, if known
    pub location: Option<Location>,
}

impl PositionPair {
    pub fn new(percentage: f64, location: Option<Location>) -> Self {
        let percentage = if percentage.is_finite() {
            percentage.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            percentage,
            location,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percentage >= 100.0
    }
}

/// Where a flow document should be displayed on resume
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeTarget {
    /// Stored content token, still valid
    Token(String),
    /// Fraction in `[0, 1]` to hand to the flow engine
    Fraction(f64),
    /// Beginning of the document
    Start,
}
