//! Revstream turns an unbounded stream of review texts into bounded, periodically emitted
//! snapshots of token frequencies and sentiment.
//!
//! Records are read from a partitioned log through a [sources::StreamCursor], scored and
//! tokenized by the [text] module, folded into a [window::WindowAccumulator] and handed to an
//! [emitters::Emitter] whenever a drain trigger fires. The [aggregation::AggregationLoop]
//! orchestrates these steps for one partition, [runtime::run_partitions] runs one loop per
//! partition.
pub mod aggregation;
pub mod emitters;
pub mod errorhandling;
pub mod runtime;
pub mod sources;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod text;
pub mod types;
pub mod window;
