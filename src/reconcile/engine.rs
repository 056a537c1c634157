//! The reconciler
//!
//! Every candidate for the open book goes through one async mutex that
//! stays held across the store write, so writes land in arrival order and
//! a slow older write can never overwrite a newer one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::candidate::{Decision, Origin, PositionCandidate, SuppressReason};
use super::clock::Clock;
use crate::config::ReconcileConfig;
use crate::error::{ReaderError, Result};
use crate::position::PositionPair;
use crate::store::{BookRecord, BookStore};

/// Result of opening a book for tracking
#[derive(Debug, Clone)]
pub struct OpenedBook {
    pub record: BookRecord,
    /// Stored position to resume from
    pub initial: PositionPair,
}

/// Per-open reconciliation state
#[derive(Debug)]
struct TrackedBook {
    id: String,
    current: PositionPair,
    seeded: bool,
    last_direct: Option<Instant>,
    finished: bool,
    /// Last store write failed; the next accepted candidate must write
    write_pending: bool,
}

impl TrackedBook {
    fn evaluate(&self, candidate: &PositionCandidate, window: Duration) -> Option<SuppressReason> {
        match candidate.origin {
            Origin::Initial if self.seeded => Some(SuppressReason::AlreadySeeded),
            Origin::Initial | Origin::Direct | Origin::Outline => None,
            Origin::Observed => {
                let position = &candidate.position;
                if position.percentage == 0.0 && self.current.percentage > 0.0 {
                    return Some(SuppressReason::TransientZero);
                }
                if let Some(last_direct) = self.last_direct {
                    let settling = candidate
                        .timestamp
                        .checked_duration_since(last_direct)
                        .map_or(true, |elapsed| elapsed <= window);
                    if settling {
                        return Some(SuppressReason::NavigationSettling);
                    }
                }
                if position.percentage < self.current.percentage {
                    return Some(SuppressReason::Regression);
                }
                None
            }
        }
    }
}

/// Decides which candidate positions become current and persists them
pub struct Reconciler {
    store: BookStore,
    clock: Arc<dyn Clock>,
    config: ReconcileConfig,
    state: Mutex<Option<TrackedBook>>,
}

impl Reconciler {
    pub fn new(store: BookStore, clock: Arc<dyn Clock>, config: ReconcileConfig) -> Self {
        Self {
            store,
            clock,
            config,
            state: Mutex::new(None),
        }
    }

    /// Start tracking `id`, replacing whatever was open
    ///
    /// The stored pair is returned for resolution by the caller and must be
    /// seeded back with an `Initial` candidate once the document has landed.
    pub async fn open(&self, id: &str) -> Result<OpenedBook> {
        let record = self.store.get(id).await?;
        let initial = record.position();

        let mut state = self.state.lock().await;
        *state = Some(TrackedBook {
            id: record.id.clone(),
            current: initial.clone(),
            seeded: false,
            last_direct: None,
            finished: initial.is_complete() || record.finished_at.is_some(),
            write_pending: false,
        });

        tracing::info!(
            id = %record.id,
            format = record.format.as_str(),
            percentage = initial.percentage,
            "Tracking book"
        );

        Ok(OpenedBook { record, initial })
    }

    /// Stop tracking; returns the last current position
    pub async fn close(&self) -> Option<PositionPair> {
        self.state.lock().await.take().map(|book| {
            tracing::debug!(id = %book.id, "Stopped tracking book");
            book.current
        })
    }

    pub async fn current(&self) -> Option<PositionPair> {
        self.state.lock().await.as_ref().map(|book| book.current.clone())
    }

    pub async fn seed(&self, position: PositionPair) -> Result<Decision> {
        self.submit_now(position, Origin::Initial).await
    }

    pub async fn report_direct(&self, position: PositionPair) -> Result<Decision> {
        self.submit_now(position, Origin::Direct).await
    }

    pub async fn report_outline(&self, position: PositionPair) -> Result<Decision> {
        self.submit_now(position, Origin::Outline).await
    }

    pub async fn report_observed(&self, position: PositionPair) -> Result<Decision> {
        self.submit_now(position, Origin::Observed).await
    }

    /// Jump to 100 keeping the current location
    pub async fn mark_complete(&self) -> Result<Decision> {
        let location = self
            .current()
            .await
            .ok_or(ReaderError::NotOpen)?
            .location;
        self.report_direct(PositionPair::new(100.0, location)).await
    }

    async fn submit_now(&self, position: PositionPair, origin: Origin) -> Result<Decision> {
        let candidate = PositionCandidate::new(position, origin, self.clock.now());
        self.submit(candidate).await
    }

    /// Run a candidate through the rules and write it through if accepted
    pub async fn submit(&self, candidate: PositionCandidate) -> Result<Decision> {
        let mut state = self.state.lock().await;
        let book = state.as_mut().ok_or(ReaderError::NotOpen)?;

        if let Some(reason) = book.evaluate(&candidate, self.config.suppression_window) {
            tracing::trace!(
                id = %book.id,
                origin = %candidate.origin,
                percentage = candidate.position.percentage,
                reason = ?reason,
                "Suppressed position"
            );
            return Ok(Decision::Suppressed(reason));
        }

        if candidate.origin.is_navigation() {
            book.last_direct = Some(candidate.timestamp);
        }

        if candidate.origin == Origin::Initial {
            book.seeded = true;
        } else if candidate.position == book.current && !book.write_pending {
            return Ok(Decision::Coalesced);
        }

        book.current = candidate.position.clone();
        let finished = book.current.is_complete() && !book.finished;
        if finished {
            book.finished = true;
        }

        match self
            .store
            .update_progress(
                &book.id,
                book.current.percentage,
                book.current.location.as_ref(),
            )
            .await
        {
            Ok(()) => book.write_pending = false,
            Err(e) => {
                tracing::warn!(
                    id = %book.id,
                    percentage = book.current.percentage,
                    error = %e,
                    "Failed to persist position"
                );
                book.write_pending = true;
            }
        }

        tracing::debug!(
            id = %book.id,
            origin = %candidate.origin,
            percentage = book.current.percentage,
            location = ?book.current.location,
            "Accepted position"
        );
        if finished {
            tracing::info!(id = %book.id, "Book finished");
        }

        Ok(Decision::Accepted {
            position: candidate.position,
            finished,
        })
    }
}
