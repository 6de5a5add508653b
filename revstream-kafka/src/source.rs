use std::collections::HashMap;
use std::time::Duration;

use kafka_source_builder::SetAtLeastOneBroker;
use revstream::errorhandling::Classify;
use revstream::sources::{
    CursorPosition, PartitionedSource, PollBatch, SourceError, SourcePartition, StartPolicy,
};
use revstream::types::PartitionId;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, DefaultConsumerContext};
use rdkafka::error::KafkaError;

use bon::Builder;
use rdkafka::{Offset, TopicPartitionList};
use thiserror::Error;
use tracing::{debug, info};

use crate::record::{is_fatal, raw_record};

/// Create a new KafkaSource for a given topic.
/// This is a partitioned source with each Kafka partition mapping to one [SourcePartition].
///
/// Offsets are never committed automatically. The aggregation loop commits the offset after
/// the last record of every drained window, so a restarted consumer group resumes where the
/// last emitted snapshot ended.
///
/// # Usage
///
/// The source can be instantiated using the builder.
/// Custom [rdkafka configuration](https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md)
/// can be provided by calling `.conf(key, value)`.
///
/// ```
/// use revstream_kafka::KafkaSource;
///
/// let kafka_source = KafkaSource::builder()
///     .broker("mybroker.com") // at least one broker must be provided
///     .broker("myotherbroker.com")
///     .topic("reviews")
///     .group_id("review-dashboard")
///     .conf("log_level", "3") // additional custom config
///     .conf("security.protocol", "ssl");
/// ```
#[derive(Builder, Debug)]
#[builder(on(String, into))]
pub struct KafkaSource {
    #[builder(field)]
    kafka_config: HashMap<String, String>,
    #[builder(field)]
    brokers: Vec<String>,
    /// this is a workaround to check if at least one broker was provided
    #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
    _at_least_one_broker: (),
    topic: String,
    group_id: String,
    /// Where to continue if a committed or requested offset is out of range
    #[builder(default = "earliest".to_owned())]
    auto_offset_reset: String,
    /// Longest time a single poll waits for the first record
    #[builder(default = Duration::from_secs(1))]
    poll_timeout: Duration,
    /// Timeout for fetching Kafka Broker metadata
    #[builder(default = Duration::from_secs(10))]
    metadata_fetch_timeout: Duration,
}

impl<S: kafka_source_builder::State> KafkaSourceBuilder<S> {
    /// Provide an additional config for the Kafka consumer.
    /// Note that `bootstrap.servers`, `group.id`, `auto.offset.reset` and `enable.auto.commit`
    /// configs are ignored. Use the respective builder methods to supply these
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to consume from
    pub fn broker(mut self, url: impl Into<String>) -> KafkaSourceBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl KafkaSource {
    fn create_consumer(&self) -> Result<BaseConsumer, SourceError> {
        let mut kafka_conf = ClientConfig::new();
        for (k, v) in self.kafka_config.iter() {
            kafka_conf.set(k, v);
        }
        kafka_conf
            .set("group.id", &self.group_id)
            .set("bootstrap.servers", self.brokers.join(","))
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "false");
        kafka_conf
            .create()
            .map_err(KafkaSourceError::CreateConsumer)
            .fatal()
    }
}

impl PartitionedSource for KafkaSource {
    type Partition = KafkaSourcePartition;

    fn list_parts(&self) -> Result<Vec<PartitionId>, SourceError> {
        let consumer = self.create_consumer()?;
        let metadata = classified(
            consumer.fetch_metadata(Some(&self.topic), self.metadata_fetch_timeout),
            KafkaSourceError::FetchMetadata,
        )?;
        // we asked for a single topic
        let partitions: Vec<PartitionId> = metadata
            .topics()
            .first()
            .map(|t| t.partitions().iter().map(|p| p.id()).collect())
            .unwrap_or_default();
        if partitions.is_empty() {
            return Err(KafkaSourceError::UnknownTopic(self.topic.clone())).fatal();
        }
        Ok(partitions)
    }

    fn build_part(&mut self, part: PartitionId) -> Result<Self::Partition, SourceError> {
        let consumer = self.create_consumer()?;
        Ok(KafkaSourcePartition {
            consumer,
            topic: self.topic.clone(),
            partition: part,
            poll_timeout: self.poll_timeout,
        })
    }
}

/// A single partition of [KafkaSource].
/// This type can not be constructed directly, use [KafkaSource] instead.
pub struct KafkaSourcePartition {
    consumer: BaseConsumer<DefaultConsumerContext>,
    topic: String,
    partition: PartitionId,
    poll_timeout: Duration,
}

impl SourcePartition for KafkaSourcePartition {
    fn open(&mut self, policy: StartPolicy) -> Result<CursorPosition, SourceError> {
        let (offset, position) = match policy {
            StartPolicy::FromOldest => (Offset::Beginning, CursorPosition::Oldest),
            StartPolicy::FromNewest => (Offset::End, CursorPosition::Newest),
            StartPolicy::At(offset) => {
                let kafka_offset = i64::try_from(offset)
                    .map_err(|_| SourceError::InvalidStartPolicy(offset.to_string()))?;
                (Offset::Offset(kafka_offset), CursorPosition::Offset(offset))
            }
        };
        let mut tpl = TopicPartitionList::with_capacity(1);
        tpl.add_partition_offset(&self.topic, self.partition, offset)
            .map_err(KafkaSourceError::Assign)
            .fatal()?;
        self.consumer
            .assign(&tpl)
            .map_err(KafkaSourceError::Assign)
            .fatal()?;
        info!(
            "Assigned {}/{} starting at {policy}",
            self.topic, self.partition
        );
        Ok(position)
    }

    fn poll(
        &mut self,
        position: &CursorPosition,
        max_records: usize,
    ) -> Result<PollBatch, SourceError> {
        let mut records = Vec::new();
        // only the first poll may block, afterwards we take what is already buffered
        let mut timeout = self.poll_timeout;
        while records.len() < max_records {
            match self.consumer.poll(timeout) {
                None => break,
                Some(Ok(msg)) => records.push(raw_record(&msg)),
                Some(Err(e)) if records.is_empty() => {
                    return classified(Err(e), KafkaSourceError::Poll);
                }
                Some(Err(e)) => {
                    debug!("Returning partial batch of {} records: {e}", records.len());
                    break;
                }
            }
            timeout = Duration::ZERO;
        }
        let next_position = records
            .last()
            .and_then(|r| r.offset)
            .map(|offset| CursorPosition::Offset(offset + 1))
            .unwrap_or(*position);
        Ok(PollBatch {
            records,
            next_position,
        })
    }

    fn commit(&mut self, position: &CursorPosition) -> Result<(), SourceError> {
        // nothing was read yet
        let CursorPosition::Offset(offset) = position else {
            return Ok(());
        };
        let mut tpl = TopicPartitionList::with_capacity(1);
        tpl.add_partition_offset(
            &self.topic,
            self.partition,
            Offset::Offset(i64::try_from(*offset).unwrap_or(i64::MAX)),
        )
        .map_err(KafkaSourceError::Commit)
        .fatal()?;
        classified(
            self.consumer.commit(&tpl, CommitMode::Async),
            KafkaSourceError::Commit,
        )
    }
}

fn classified<T>(
    result: Result<T, KafkaError>,
    wrap: fn(KafkaError) -> KafkaSourceError,
) -> Result<T, SourceError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if is_fatal(&e) => Err(wrap(e)).fatal(),
        Err(e) => Err(wrap(e)).transient(),
    }
}

/// Possible errors which can occur in the Kafka consumer
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum KafkaSourceError {
    #[error("Error polling Kafka consumer")]
    Poll(#[source] KafkaError),
    #[error("Failed to create Kafka consumer")]
    CreateConsumer(#[source] KafkaError),
    #[error("Could not assign topic-partition to consumer")]
    Assign(#[source] KafkaError),
    #[error("Failed to fetch metadata from Kafka broker")]
    FetchMetadata(#[source] KafkaError),
    #[error("Failed to commit offset")]
    Commit(#[source] KafkaError),
    #[error("Topic `{0}` does not exist or has no partitions")]
    UnknownTopic(String),
}

/// Doctests to assert some bad builders do not compile
/// see: https://stackoverflow.com/a/55327334
/// this should not compile because the broker is missing
/// ```compile_fail
/// use revstream_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("foobar")
/// .group_id("groupid")
/// .build();
/// ```
/// missing topic
/// ```compile_fail
/// use revstream_kafka::KafkaSource;
/// KafkaSource::builder()
/// .group_id("groupid")
/// .broker("broker.com")
/// .build();
/// ```
/// missing group id
/// ```compile_fail
/// use revstream_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("foobar")
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;
