//! Aggregates reviews from Kafka into windowed sentiment snapshots
use clap::Parser;
use envconfig::Envconfig;
use revstream::aggregation::StopSignal;
use revstream::emitters::{
    BufferedEmitter, EmitError, FanOutEmitter, JsonFileEmitter, StdOutEmitter,
};
use revstream::errorhandling::Classify as _;
use revstream::runtime::run_partitions;
use revstream::sources::RetryPolicy;
use revstream::text::LexiconModel;
use revstream::types::PartitionId;
use revstream_kafka::{KafkaEmitter, KafkaSource};
use tracing::{debug, info, warn};

use crate::config::{Config, OutputConfig};

mod cli;
mod config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = Config::init_from_env()?;
    cli::Cli::parse().apply(&mut config);
    debug!("Running with config {config:?}");

    let bootstrap_servers = config.kafka.bootstrap_servers()?;
    let partitions = config.kafka.partitions()?;
    let loop_config = config.loop_config();
    let source = KafkaSource::builder()
        .broker(bootstrap_servers.clone())
        .topic(config.kafka.topic.clone())
        .group_id(config.kafka.group_id.clone())
        .poll_timeout(config.kafka.poll_timeout())
        .build();

    let stop = StopSignal::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, draining and stopping");
                on_signal.stop();
            }
            Err(e) => warn!("Can not listen for Ctrl-C: {e}"),
        }
    });

    let output = config.output.clone();
    let retry = loop_config.retry;
    let reports = tokio::task::spawn_blocking(move || {
        run_partitions(
            source,
            partitions,
            loop_config,
            |_| LexiconModel::default(),
            |partition| build_emitter(&output, &bootstrap_servers, retry, partition),
            stop,
        )
    })
    .await??;

    for report in reports {
        info!(
            "Partition {:?} stopped ({:?}) at {:?}: {} reviews, {} skipped, {} snapshots, {} emit failures",
            report.partition,
            report.stop_reason,
            report.position,
            report.stats.absorbed,
            report.stats.skipped,
            report.stats.snapshots_emitted,
            report.stats.emit_failures,
        );
    }
    Ok(())
}

/// Every partition gets its own emitter chain, delivered from a dedicated thread so slow
/// sinks do not stall polling. Transient sink failures are retried on that thread.
fn build_emitter(
    output: &OutputConfig,
    bootstrap_servers: &str,
    retry: RetryPolicy,
    partition: PartitionId,
) -> Result<BufferedEmitter, EmitError> {
    let mut emitter = FanOutEmitter::new();
    if let Some(dir) = &output.dir {
        emitter = emitter.with(JsonFileEmitter::new(dir.clone()));
    }
    if let Some(topic) = &output.topic {
        let kafka = KafkaEmitter::builder()
            .broker(bootstrap_servers)
            .topic(topic.clone())
            .build()
            .emit_failed()?;
        emitter = emitter.with(kafka);
    }
    if output.stdout || emitter.is_empty() {
        emitter = emitter.with(StdOutEmitter);
    }
    debug!("Partition {partition} emits to {} targets", emitter.len());
    Ok(BufferedEmitter::new(emitter, output.buffer, retry))
}
