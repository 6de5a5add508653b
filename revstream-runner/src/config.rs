use std::{path::PathBuf, time::Duration};

use envconfig::Envconfig;
use revstream::{
    aggregation::LoopConfig,
    emitters::SinkId,
    sources::{RetryPolicy, StartPolicy},
    types::{PartitionId, PayloadFormat},
};
use thiserror::Error;

/// Runner configuration, read from `REVSTREAM_*` environment variables
#[derive(Envconfig, Debug, Clone)]
pub struct Config {
    #[envconfig(nested)]
    pub kafka: KafkaConfig,

    #[envconfig(nested)]
    pub window: WindowConfig,

    #[envconfig(nested)]
    pub output: OutputConfig,
}

#[derive(Envconfig, Debug, Clone)]
pub struct KafkaConfig {
    /// Comma separated list of bootstrap brokers
    #[envconfig(from = "REVSTREAM_KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,
    /// Topic carrying the reviews
    #[envconfig(from = "REVSTREAM_KAFKA_TOPIC", default = "reviews")]
    pub topic: String,
    /// Consumer group used for offset commits
    #[envconfig(from = "REVSTREAM_KAFKA_GROUP_ID", default = "revstream")]
    pub group_id: String,
    /// `oldest`, `newest` or an offset to resume from
    #[envconfig(from = "REVSTREAM_START", default = "newest")]
    pub start: StartPolicy,
    /// Comma separated partitions to aggregate, all partitions if unset
    #[envconfig(from = "REVSTREAM_PARTITIONS")]
    pub partitions: Option<String>,
    /// `json`, `json:<field>` or `text`
    #[envconfig(from = "REVSTREAM_PAYLOAD_FORMAT", default = "json")]
    pub payload_format: PayloadFormat,
    /// Longest time a poll waits for records, in milliseconds
    #[envconfig(from = "REVSTREAM_KAFKA_POLL_TIMEOUT_MS", default = "1000")]
    pub poll_timeout_ms: u64,
}

#[derive(Envconfig, Debug, Clone)]
pub struct WindowConfig {
    /// max records read per poll
    #[envconfig(from = "REVSTREAM_BATCH_SIZE", default = "100")]
    pub batch_size: usize,
    /// pause after an empty poll in milliseconds
    #[envconfig(from = "REVSTREAM_POLL_INTERVAL_MS", default = "1000")]
    pub poll_interval_ms: u64,
    /// drain interval in seconds, 0 disables it
    #[envconfig(from = "REVSTREAM_DRAIN_INTERVAL_SEC", default = "10")]
    pub drain_interval_sec: u64,
    /// drain after this many records, 0 disables it
    #[envconfig(from = "REVSTREAM_DRAIN_THRESHOLD", default = "50")]
    pub drain_threshold: u64,
    #[envconfig(from = "REVSTREAM_MAX_WINDOW_RECORDS", default = "10000")]
    pub max_window_records: u64,
    #[envconfig(from = "REVSTREAM_TOP_K", default = "10")]
    pub top_k: usize,
    #[envconfig(from = "REVSTREAM_HISTOGRAM_BINS", default = "30")]
    pub histogram_bins: usize,
    #[envconfig(from = "REVSTREAM_RECENT_EXCERPTS", default = "5")]
    pub recent_excerpts: usize,
    /// drop tokens containing digits
    #[envconfig(from = "REVSTREAM_ALPHABETIC_ONLY", default = "false")]
    pub alphabetic_only: bool,
    /// retries for transient source and emitter failures
    #[envconfig(from = "REVSTREAM_MAX_RETRIES", default = "5")]
    pub max_retries: usize,
}

#[derive(Envconfig, Debug, Clone)]
pub struct OutputConfig {
    /// Prefix of snapshot files and key of snapshot records
    #[envconfig(from = "REVSTREAM_SINK_ID", default = "dashboard_snapshot")]
    pub sink_id: String,
    /// Directory for JSON snapshot files
    #[envconfig(from = "REVSTREAM_OUTPUT_DIR")]
    pub dir: Option<PathBuf>,
    /// Kafka topic for JSON snapshots
    #[envconfig(from = "REVSTREAM_OUTPUT_TOPIC")]
    pub topic: Option<String>,
    /// Print a summary of every snapshot
    #[envconfig(from = "REVSTREAM_STDOUT", default = "false")]
    pub stdout: bool,
    /// Snapshots buffered per partition before the loop waits for the emitter
    #[envconfig(from = "REVSTREAM_EMIT_BUFFER", default = "16")]
    pub buffer: usize,
}

impl Config {
    /// Translate the window settings into the aggregation loop configuration
    pub fn loop_config(&self) -> LoopConfig {
        let w = &self.window;
        LoopConfig::builder()
            .batch_size(w.batch_size)
            .poll_interval(Duration::from_millis(w.poll_interval_ms))
            .drain_interval(Duration::from_secs(w.drain_interval_sec))
            .drain_record_threshold(w.drain_threshold)
            .max_window_records(w.max_window_records)
            .top_k(w.top_k)
            .histogram_bins(w.histogram_bins)
            .recent_excerpts(w.recent_excerpts)
            .alphabetic_only(w.alphabetic_only)
            .start_policy(self.kafka.start)
            .payload_format(self.kafka.payload_format.clone())
            .sink(SinkId::new(self.output.sink_id.clone()))
            .retry(RetryPolicy {
                max_retries: w.max_retries,
                ..RetryPolicy::default()
            })
            .build()
    }
}

impl KafkaConfig {
    /// Brokers joined the way `bootstrap.servers` expects them
    pub fn bootstrap_servers(&self) -> Result<String, ConfigError> {
        let brokers: Vec<&str> = self
            .brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .collect();
        if brokers.is_empty() {
            return Err(ConfigError::NoBrokers);
        }
        Ok(brokers.join(","))
    }

    /// Explicitly selected partitions
    pub fn partitions(&self) -> Result<Option<Vec<PartitionId>>, ConfigError> {
        let Some(list) = self.partitions.as_deref() else {
            return Ok(None);
        };
        list.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<PartitionId>()
                    .map_err(|_| ConfigError::InvalidPartition(p.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No Kafka broker configured")]
    NoBrokers,
    #[error("Invalid partition `{0}`, expected a number")]
    InvalidPartition(String),
}
