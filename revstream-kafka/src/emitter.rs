use kafka_emitter_builder::SetAtLeastOneBroker;
use revstream::emitters::{EmitError, Emitter, SinkId};
use revstream::errorhandling::Classify as _;
use revstream::types::Snapshot;
use rdkafka::error::KafkaError;
use rdkafka::producer::{BaseProducer, BaseRecord, DefaultProducerContext, Producer};
use rdkafka::ClientConfig;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tracing::{debug, error};

use bon::bon;

use crate::record::is_fatal;

/// Publishes every snapshot as a JSON document to a Kafka topic.
///
/// Records are keyed by the [SinkId], so all snapshots of one sink land in the same Kafka
/// partition and keep their order.
pub struct KafkaEmitter {
    producer: BaseProducer<DefaultProducerContext>,
    topic: String,
    flush_timeout: Duration,
}

#[bon]
impl KafkaEmitter {
    /// Create the emitter and its producer
    #[builder]
    #[builder(on(String, into))]
    pub fn new(
        #[builder(field)] kafka_config: HashMap<String, String>,
        #[builder(field)] brokers: Vec<String>,
        /// this is a workaround to check if at least one broker was provided
        #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
        _at_least_one_broker: (),
        topic: String,
        /// How long to wait for outstanding deliveries when the emitter is suspended
        #[builder(default = Duration::from_secs(5))]
        flush_timeout: Duration,
    ) -> Result<Self, KafkaEmitterError> {
        let mut kafka_conf = ClientConfig::new();
        for (k, v) in kafka_config.iter() {
            kafka_conf.set(k, v);
        }
        let producer = kafka_conf
            .set("bootstrap.servers", brokers.join(","))
            .create()
            .map_err(KafkaEmitterError::CreateProducer)?;
        Ok(Self {
            producer,
            topic,
            flush_timeout,
        })
    }
}

impl<S: kafka_emitter_builder::State> KafkaEmitterBuilder<S> {
    /// Provide an additional config for the Kafka producer.
    /// Note that the `bootstrap.servers` config is ignored, use [Self::broker] instead.
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to produce records to
    pub fn broker(mut self, url: impl Into<String>) -> KafkaEmitterBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl Emitter for KafkaEmitter {
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError> {
        let payload = serde_json::to_vec(snapshot)
            .map_err(KafkaEmitterError::Serialize)
            .emit_failed()?;
        let record = BaseRecord::to(&self.topic)
            .payload(&payload)
            .key(sink.as_str());
        let sent = self.producer.send(record).map_err(|(e, _)| e);
        // serve delivery callbacks
        self.producer.poll(Duration::ZERO);
        match sent {
            Ok(()) => {
                debug!("Produced window {} to {}", snapshot.window, self.topic);
                Ok(())
            }
            Err(e) if is_fatal(&e) => Err(KafkaEmitterError::Send(e)).emit_failed(),
            // a full queue or a broker hiccup, both may clear up on retry
            Err(e) => Err(KafkaEmitterError::Send(e)).emit_transient(),
        }
    }

    fn suspend(&mut self) {
        if let Err(e) = self.producer.flush(self.flush_timeout) {
            error!("Failed to flush snapshots to {}: {e}", self.topic);
        }
    }
}

/// Possible errors which can occur in the Kafka producer
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum KafkaEmitterError {
    #[error("Failed to send snapshot")]
    Send(#[source] KafkaError),
    #[error("Failed to create Kafka Producer")]
    CreateProducer(#[source] KafkaError),
    #[error("Failed to serialize snapshot")]
    Serialize(#[source] serde_json::Error),
}

/// Doctests to assert some bad builders do not compile
/// see: https://stackoverflow.com/a/55327334
/// this should not compile because the broker is missing
/// ```compile_fail
/// use revstream_kafka::KafkaEmitter;
/// KafkaEmitter::builder()
/// .topic("snapshots")
/// .build();
/// ```
/// missing topic
/// ```compile_fail
/// use revstream_kafka::KafkaEmitter;
/// KafkaEmitter::builder()
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;
