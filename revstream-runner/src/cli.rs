use std::path::PathBuf;

use revstream::{sources::StartPolicy, types::PayloadFormat};

use crate::config::Config;

/// Aggregate product reviews from a Kafka topic into windowed sentiment snapshots.
///
/// Every option may also be given as `REVSTREAM_*` environment variable, options given on the
/// command line take precedence.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Comma separated list of Kafka brokers
    #[arg(short, long)]
    pub brokers: Option<String>,

    /// Topic to read reviews from
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Where to start reading: `oldest`, `newest` or an offset
    #[arg(short, long)]
    pub start: Option<StartPolicy>,

    /// Comma separated partitions to aggregate
    #[arg(short, long)]
    pub partitions: Option<String>,

    /// Payload format: `json`, `json:<field>` or `text`
    #[arg(long)]
    pub format: Option<PayloadFormat>,

    /// Drain after this many reviews, 0 disables the threshold
    #[arg(long)]
    pub drain_threshold: Option<u64>,

    /// Drain at least every n seconds, 0 disables the interval
    #[arg(long)]
    pub drain_interval_sec: Option<u64>,

    /// Write JSON snapshots into this directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Publish JSON snapshots to this Kafka topic
    #[arg(long)]
    pub output_topic: Option<String>,

    /// Print a summary line per snapshot
    #[arg(long)]
    pub stdout: bool,
}

impl Cli {
    /// Override the environment configuration with the given arguments
    pub fn apply(self, config: &mut Config) {
        if let Some(brokers) = self.brokers {
            config.kafka.brokers = brokers;
        }
        if let Some(topic) = self.topic {
            config.kafka.topic = topic;
        }
        if let Some(start) = self.start {
            config.kafka.start = start;
        }
        if let Some(partitions) = self.partitions {
            config.kafka.partitions = Some(partitions);
        }
        if let Some(format) = self.format {
            config.kafka.payload_format = format;
        }
        if let Some(threshold) = self.drain_threshold {
            config.window.drain_threshold = threshold;
        }
        if let Some(interval) = self.drain_interval_sec {
            config.window.drain_interval_sec = interval;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = Some(dir);
        }
        if let Some(topic) = self.output_topic {
            config.output.topic = Some(topic);
        }
        config.output.stdout |= self.stdout;
    }
}
