//! Runs one [AggregationLoop] per partition, each on its own thread
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::{error, info};

use crate::{
    aggregation::{AggregationLoop, LoopConfig, LoopError, LoopReport, StopSignal},
    emitters::{EmitError, Emitter},
    sources::{PartitionedSource, SourceError},
    text::SentimentModel,
    types::PartitionId,
};

/// Errors starting or running the partition loops
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The source could not list its partitions
    #[error("Failed to list partitions")]
    ListPartitions(#[source] SourceError),
    /// A partition reader could not be created
    #[error("Failed to build reader for partition {partition}")]
    BuildPartition {
        #[allow(missing_docs)]
        partition: PartitionId,
        #[source]
        #[allow(missing_docs)]
        source: SourceError,
    },
    /// The emitter of a partition could not be created
    #[error("Failed to create emitter for partition {partition}")]
    Emitter {
        #[allow(missing_docs)]
        partition: PartitionId,
        #[source]
        #[allow(missing_docs)]
        source: EmitError,
    },
    /// The operating system refused to spawn a thread
    #[error("Failed to spawn thread for partition {partition}")]
    Spawn {
        #[allow(missing_docs)]
        partition: PartitionId,
        #[source]
        #[allow(missing_docs)]
        source: std::io::Error,
    },
    /// A loop failed to start
    #[error("Loop for partition {partition} failed")]
    Loop {
        #[allow(missing_docs)]
        partition: PartitionId,
        #[source]
        #[allow(missing_docs)]
        source: LoopError,
    },
    /// A loop thread panicked
    #[error("Thread of partition {0} panicked")]
    Panicked(PartitionId),
}

/// Run one aggregation loop per partition of `source` until `stop` is raised.
///
/// `partitions` restricts the loops to the given partitions, `None` runs all partitions the
/// source lists. Every loop gets its own model from `make_model` and its own emitter from
/// `make_emitter`, loops share nothing but the stop signal. Emitters may hold connections, so
/// creating them is fallible.
///
/// Loops stopping because their source failed do not affect the other loops. If a loop fails
/// to start, all other loops are stopped and the first such error is returned once every
/// thread finished. Reports are returned in partition order.
pub fn run_partitions<S, M, E, FM, FE>(
    mut source: S,
    partitions: Option<Vec<PartitionId>>,
    config: LoopConfig,
    make_model: FM,
    make_emitter: FE,
    stop: StopSignal,
) -> Result<Vec<LoopReport>, RuntimeError>
where
    S: PartitionedSource,
    M: SentimentModel,
    E: Emitter,
    FM: Fn(PartitionId) -> M,
    FE: Fn(PartitionId) -> Result<E, EmitError>,
{
    let partitions = match partitions {
        Some(p) => p,
        None => source.list_parts().map_err(RuntimeError::ListPartitions)?,
    };
    info!("Starting aggregation of partitions {partitions:?}");

    let mut threads: Vec<(PartitionId, JoinHandle<Result<LoopReport, LoopError>>)> =
        Vec::with_capacity(partitions.len());
    let mut first_err = None;
    for partition in partitions {
        let spawned = make_emitter(partition)
            .map_err(|source| RuntimeError::Emitter { partition, source })
            .and_then(|emitter| {
                spawn_loop(
                    &mut source,
                    partition,
                    config.clone(),
                    make_model(partition),
                    emitter,
                    stop.clone(),
                )
            });
        match spawned {
            Ok(handle) => threads.push((partition, handle)),
            Err(e) => {
                error!("Could not start partition {partition}: {e}");
                stop.stop();
                first_err = Some(e);
                break;
            }
        }
    }

    let mut reports = Vec::with_capacity(threads.len());
    for (partition, handle) in threads {
        match handle.join() {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(source)) => {
                error!("Loop for partition {partition} failed: {source}");
                stop.stop();
                first_err.get_or_insert(RuntimeError::Loop { partition, source });
            }
            Err(_) => {
                error!("Thread of partition {partition} panicked");
                stop.stop();
                first_err.get_or_insert(RuntimeError::Panicked(partition));
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}

fn spawn_loop<S, M, E>(
    source: &mut S,
    partition: PartitionId,
    config: LoopConfig,
    model: M,
    emitter: E,
    stop: StopSignal,
) -> Result<JoinHandle<Result<LoopReport, LoopError>>, RuntimeError>
where
    S: PartitionedSource,
    M: SentimentModel,
    E: Emitter,
{
    let part = source
        .build_part(partition)
        .map_err(|source| RuntimeError::BuildPartition { partition, source })?;
    std::thread::Builder::new()
        .name(format!("revstream-p{partition}"))
        .spawn(move || {
            let aggregation = AggregationLoop::builder()
                .partition(part)
                .model(model)
                .emitter(emitter)
                .partition_id(partition)
                .config(config)
                .stop(stop)
                .build()?;
            Ok(aggregation.run())
        })
        .map_err(|source| RuntimeError::Spawn { partition, source })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        aggregation::StopReason,
        sources::{RetryPolicy, StartPolicy},
        testing::{FixedModel, ScriptedSource, Step, VecEmitter},
        types::PayloadFormat,
    };

    fn config() -> LoopConfig {
        LoopConfig::builder()
            .start_policy(StartPolicy::FromOldest)
            .payload_format(PayloadFormat::PlainText)
            .poll_interval(Duration::from_millis(5))
            .drain_record_threshold(2)
            .retry(RetryPolicy::immediate(0))
            .build()
    }

    #[test]
    fn one_loop_per_partition() {
        let source = ScriptedSource::new()
            .with_partition(0, vec![Step::records(["a", "b"])])
            .with_partition(1, vec![Step::records(["c", "d", "e", "f"])])
            .with_partition(2, vec![Step::Fatal]);
        let collected = [VecEmitter::new(), VecEmitter::new(), VecEmitter::new()];
        let stop = StopSignal::new();

        let remote = stop.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            remote.stop();
        });
        let reports = run_partitions(
            source,
            None,
            config(),
            |_| FixedModel::default(),
            |p| Ok(collected[p as usize].clone()),
            stop,
        )
        .unwrap();
        stopper.join().unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].partition, Some(0));
        assert_eq!(reports[0].stop_reason, StopReason::Cancelled);
        assert_eq!(reports[1].stats.snapshots_emitted, 2);
        assert!(matches!(
            reports[2].stop_reason,
            StopReason::SourceFailed(_)
        ));
        assert_eq!(collected[0].len(), 1);
        assert_eq!(collected[1].len(), 2);
        assert!(collected[2].is_empty());
        assert!(collected[1].drain_vec(..).iter().all(|s| s.partition == Some(1)));
    }

    #[test]
    fn unknown_partition_is_an_error() {
        let source = ScriptedSource::new().with_partition(0, vec![]);
        let stop = StopSignal::new();
        let res = run_partitions(
            source,
            Some(vec![0, 7]),
            config(),
            |_| FixedModel::default(),
            |_| Ok(VecEmitter::new()),
            stop.clone(),
        );
        assert!(matches!(
            res,
            Err(RuntimeError::BuildPartition { partition: 7, .. })
        ));
        assert!(stop.is_stopped());
    }

    #[test]
    fn emitter_failure_stops_started_loops() {
        let source = ScriptedSource::new()
            .with_partition(0, vec![])
            .with_partition(1, vec![]);
        let stop = StopSignal::new();
        let res = run_partitions(
            source,
            None,
            config(),
            |_| FixedModel::default(),
            |p| match p {
                0 => Ok(VecEmitter::new()),
                _ => Err(EmitError::Failed("no route to broker".into())),
            },
            stop.clone(),
        );
        assert!(matches!(
            res,
            Err(RuntimeError::Emitter { partition: 1, .. })
        ));
        assert!(stop.is_stopped());
    }
}
