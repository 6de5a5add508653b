use std::time::{Duration, Instant};

/// Size of the current window as seen by a [DrainTrigger]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Records absorbed since the last drain
    pub records: u64,
    /// Records skipped since the last drain
    pub skipped: u64,
}

/// Decides when a window should be drained
pub trait DrainTrigger: Send + 'static {
    /// Return true if the window should be drained now
    fn should_drain(&mut self, window: &WindowStats) -> bool;

    /// Called after every drain, regardless of which trigger caused it
    fn reset(&mut self) {}
}

impl<F> DrainTrigger for F
where
    F: FnMut(&WindowStats) -> bool + Send + 'static,
{
    fn should_drain(&mut self, window: &WindowStats) -> bool {
        self(window)
    }
}

/// A trigger which fires at a constant interval based on system time
pub struct IntervalTrigger {
    interval: Duration,
    last_trigger: Instant,
}

impl IntervalTrigger {
    /// Create a new trigger of the given interval
    pub fn new(interval: Duration) -> Self {
        IntervalTrigger {
            interval,
            last_trigger: Instant::now(),
        }
    }
}

impl DrainTrigger for IntervalTrigger {
    fn should_drain(&mut self, _window: &WindowStats) -> bool {
        Instant::now().duration_since(self.last_trigger) >= self.interval
    }

    fn reset(&mut self) {
        self.last_trigger = Instant::now();
    }
}

/// Fires once the window holds at least `threshold` records
pub struct RecordCountTrigger {
    threshold: u64,
}

impl RecordCountTrigger {
    /// Create a new trigger. A threshold of 0 is treated as 1.
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }
}

impl DrainTrigger for RecordCountTrigger {
    #[inline(always)]
    fn should_drain(&mut self, window: &WindowStats) -> bool {
        window.records >= self.threshold
    }
}

/// Never fires
pub struct NoTrigger;
impl DrainTrigger for NoTrigger {
    #[inline(always)]
    fn should_drain(&mut self, _window: &WindowStats) -> bool {
        false
    }
}
