//! Live run timer.
//!
//! `LiveRun` is the state machine for one attempt at a route. It never touches I/O
//! and takes the current instant as an argument, so the event loops decide when
//! "now" is and tests can drive it with fixed offsets.

mod state;

pub use state::{AdvanceOutcome, LiveDelta, LiveRun, RunStatus, SplitRecord, TimerSnapshot};

use std::time::Duration;

/// Negative deltas larger than this are hidden while ahead of pace.
pub const DEFAULT_PLUS_MINUS_THRESHOLD: Duration = Duration::from_secs(10);

/// Convert an unsigned duration into the signed representation used for deltas.
pub fn signed(d: Duration) -> time::Duration {
    time::Duration::new(d.as_secs() as i64, d.subsec_nanos() as i32)
}
