//! Window state and the triggers deciding when a window is drained
mod accumulator;
mod triggers;

pub use accumulator::{Absorbed, WindowAccumulator, WindowState};
pub use triggers::{DrainTrigger, IntervalTrigger, NoTrigger, RecordCountTrigger, WindowStats};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, 0 if the clock is before the epoch
pub(crate) fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
