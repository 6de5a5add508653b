//! Types shared between sources, the window accumulator and emitters
mod record;
mod sentiment;
mod snapshot;

pub use record::{DecodeError, PayloadFormat, RawRecord, Record, DEFAULT_TEXT_FIELD};
pub use sentiment::SentimentClass;
pub use snapshot::{DrainReason, Histogram, SentimentCounts, Snapshot, TokenCount};

/// Identifies an independently ordered sub-stream of a source
pub type PartitionId = i32;
