//! Emitters deliver drained [Snapshot]s to a sink
mod buffered;
mod fanout;
mod json_file;
mod stdout;

pub use buffered::BufferedEmitter;
pub use fanout::FanOutEmitter;
pub use json_file::JsonFileEmitter;
pub use stdout::StdOutEmitter;

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{errorhandling::BoxError, types::Snapshot};

/// Delivers snapshots to a sink
pub trait Emitter: Send + 'static {
    /// Deliver one snapshot. Snapshots are always emitted in window order.
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError>;

    /// Called once the aggregation loop stopped.
    /// Use this method to flush buffers and clean up any resources like external connections or
    /// file handles
    fn suspend(&mut self) {}

    /// Snapshots accepted by [emit](Emitter::emit) whose delivery failed later on.
    /// Only emitters delivering in the background report anything here, the count is final
    /// once [suspend](Emitter::suspend) returned.
    fn undelivered(&self) -> u64 {
        0
    }
}

impl<F> Emitter for F
where
    F: FnMut(&Snapshot, &SinkId) -> Result<(), EmitError> + Send + 'static,
{
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError> {
        self(snapshot, sink)
    }
}

/// Identifies where an emitter puts a snapshot, e.g. a file name prefix, an object key or the
/// name of a live view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SinkId(String);

impl SinkId {
    /// Create a sink identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SinkId {
    fn default() -> Self {
        Self::new("dashboard_snapshot")
    }
}

impl Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors delivering a snapshot
#[derive(Debug, Error)]
pub enum EmitError {
    /// Delivery may succeed on retry
    #[error("Transient failure emitting snapshot")]
    Transient(#[source] BoxError),
    /// Delivery of this snapshot failed for good
    #[error("Failed to emit snapshot")]
    Failed(#[source] BoxError),
    /// The emitter was shut down
    #[error("Emitter is closed")]
    Closed,
}

impl EmitError {
    /// True if emitting may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, EmitError::Transient(_))
    }
}
