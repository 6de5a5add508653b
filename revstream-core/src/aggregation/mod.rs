//! The per-partition aggregation loop.
//!
//! An [AggregationLoop] moves through the states
//! `Idle → Polling → Processing → (Draining) → Idle` on every tick until it reaches the
//! terminal `Stopped` state, either because the [StopSignal] was raised or because the source
//! failed for good.
use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;

use crate::{
    sources::{CursorPosition, SourceError},
    types::PartitionId,
};

mod config;
mod looping;

pub use config::LoopConfig;
pub use looping::AggregationLoop;

/// Where an [AggregationLoop] currently is in its cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Between two ticks
    Idle,
    /// Waiting for the source
    Polling,
    /// Folding a batch into the window
    Processing,
    /// Handing a snapshot to the emitter
    Draining,
    /// The loop will not tick again
    Stopped(StopReason),
}

/// Why an [AggregationLoop] stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The [StopSignal] was raised
    Cancelled,
    /// The source failed with a non-retryable error
    SourceFailed(String),
}

/// Result of a single [AggregationLoop::tick]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The poll returned no records and nothing was drained
    Idle,
    /// Records were read or a window was drained
    Processed {
        /// Records read in this tick, including skipped ones
        records: usize,
        /// Windows drained in this tick
        drains: usize,
    },
    /// The loop is stopped
    Stopped(StopReason),
}

/// Counters kept by an [AggregationLoop] over its whole lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Ticks executed
    pub ticks: u64,
    /// Records absorbed into a window
    pub absorbed: u64,
    /// Records skipped as empty or malformed
    pub skipped: u64,
    /// Polls which returned no records
    pub empty_polls: u64,
    /// Polls which failed even after retrying
    pub transient_failures: u64,
    /// Snapshots delivered to the emitter.
    /// Emitters delivering in the background count a snapshot once it is queued, late delivery
    /// failures are moved to `emit_failures` when the loop finishes.
    pub snapshots_emitted: u64,
    /// Snapshots the emitter failed to deliver
    pub emit_failures: u64,
    /// Drains forced by the window's memory bound
    pub forced_drains: u64,
}

/// Final summary of a stopped [AggregationLoop]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopReport {
    /// Partition the loop read from
    pub partition: Option<PartitionId>,
    #[allow(missing_docs)]
    pub stats: LoopStats,
    #[allow(missing_docs)]
    pub stop_reason: StopReason,
    /// Read position at the time the loop stopped
    pub position: CursorPosition,
}

/// Errors of an [AggregationLoop]
#[derive(Debug, Error)]
pub enum LoopError {
    /// The partition could not be opened
    #[error("Failed to open partition {partition:?}")]
    Open {
        #[allow(missing_docs)]
        partition: Option<PartitionId>,
        #[source]
        #[allow(missing_docs)]
        source: SourceError,
    },
    /// The source failed while polling, the loop is stopped
    #[error("Source failed, stopping aggregation")]
    Source(#[source] SourceError),
}

/// Cooperative cancellation shared by any number of loops.
///
/// Loops check the signal at the start of every tick. Loops waiting out their poll interval
/// wake up as soon as the signal is raised.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// Create a signal which is not raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. There is no way to lower it again.
    pub fn stop(&self) {
        let (stopped, cvar) = &*self.inner;
        *stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// True once [StopSignal::stop] was called on any clone
    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for at most `timeout` or until the signal is raised.
    /// Returns whether the signal is raised.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (stopped, cvar) = &*self.inner;
        let guard = stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
