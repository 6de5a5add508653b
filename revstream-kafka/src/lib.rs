//! Kafka integration for revstream.
//!
//! [KafkaSource] reads review records from the partitions of a topic, every Kafka partition
//! maps to one aggregation loop. [KafkaEmitter] publishes snapshots as JSON to a topic.
mod emitter;
mod record;
mod source;

pub use emitter::{KafkaEmitter, KafkaEmitterError};
pub use source::{KafkaSource, KafkaSourceError, KafkaSourcePartition};
