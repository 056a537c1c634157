//! Position candidates and reconciliation outcomes

use std::fmt;
use std::time::Instant;

use crate::position::PositionPair;

/// Where a candidate position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Stored position restored on open
    Initial,
    /// Explicit next/prev/go-to navigation
    Direct,
    /// Inferred from what is visible on screen
    Observed,
    /// Table-of-contents jump
    Outline,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Initial => "initial",
            Origin::Direct => "direct",
            Origin::Observed => "observed",
            Origin::Outline => "outline",
        }
    }

    /// Intent-driven origins bypass monotonicity and re-arm suppression
    pub fn is_navigation(&self) -> bool {
        matches!(self, Origin::Direct | Origin::Outline)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionCandidate {
    pub position: PositionPair,
    pub origin: Origin,
    pub timestamp: Instant,
}

impl PositionCandidate {
    pub fn new(position: PositionPair, origin: Origin, timestamp: Instant) -> Self {
        Self {
            position,
            origin,
            timestamp,
        }
    }
}

/// Why a candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// A second initial candidate for the same open
    AlreadySeeded,
    /// Observed position inside the window after a direct navigation
    NavigationSettling,
    /// Observed position lower than the current one
    Regression,
    /// Observed zero while the reader is past the start
    TransientZero,
}

/// Outcome of submitting a candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Became the current position and was written through
    Accepted {
        position: PositionPair,
        /// First time this book reached 100
        finished: bool,
    },
    /// Same as the current position; nothing written
    Coalesced,
    Suppressed(SuppressReason),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }

    pub fn accepted_position(&self) -> Option<&PositionPair> {
        match self {
            Decision::Accepted { position, .. } => Some(position),
            _ => None,
        }
    }

    pub fn finished(&self) -> bool {
        matches!(self, Decision::Accepted { finished: true, .. })
    }
}
