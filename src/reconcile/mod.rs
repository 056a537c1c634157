//! Position reconciliation
//!
//! Flow engines, the visibility tracker and user navigation all emit
//! position candidates, often several per second and sometimes out of
//! order. The reconciler accepts intent (direct and outline navigation)
//! unconditionally, treats inferred positions (observed) as monotonic and
//! quiet for a short window after navigation, and writes every accepted
//! change through the store in order.

mod candidate;
mod clock;
mod engine;

pub use candidate::{Decision, Origin, PositionCandidate, SuppressReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{OpenedBook, Reconciler};
