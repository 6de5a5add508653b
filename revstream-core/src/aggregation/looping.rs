use backon::BlockingRetryable;
use bon::bon;
use tracing::{debug, error, info, info_span, warn, Span};

use super::{
    LoopConfig, LoopError, LoopReport, LoopState, LoopStats, StopReason, StopSignal, TickOutcome,
};
use crate::{
    emitters::{EmitError, Emitter},
    sources::{CursorPosition, SourcePartition, StreamCursor},
    text::SentimentModel,
    types::{DrainReason, PartitionId, Record},
    window::{Absorbed, DrainTrigger, WindowAccumulator, WindowState, WindowStats},
};

/// Reads one partition, folds its records into windows and emits a snapshot per window.
///
/// The loop is strictly sequential: every [tick](AggregationLoop::tick) polls one batch,
/// processes it in partition order and drains the window whenever a trigger fires. A drain
/// always clears the window, even if the emitter fails, so a window is emitted at most once.
///
/// # Example
/// ```
/// use revstream::aggregation::{AggregationLoop, LoopConfig, TickOutcome};
/// use revstream::sources::StartPolicy;
/// use revstream::testing::{FixedModel, ScriptedPartition, Step, VecEmitter};
/// use revstream::types::PayloadFormat;
///
/// let snapshots = VecEmitter::new();
/// let mut aggregation = AggregationLoop::builder()
///     .partition(ScriptedPartition::new(vec![Step::records(["nice", "meh"])]))
///     .model(FixedModel::new([("nice", 0.5)]))
///     .emitter(snapshots.clone())
///     .config(
///         LoopConfig::builder()
///             .start_policy(StartPolicy::FromOldest)
///             .payload_format(PayloadFormat::PlainText)
///             .drain_record_threshold(2)
///             .build(),
///     )
///     .build()
///     .unwrap();
///
/// let outcome = aggregation.tick().unwrap();
/// assert_eq!(outcome, TickOutcome::Processed { records: 2, drains: 1 });
/// assert_eq!(snapshots.len(), 1);
/// ```
pub struct AggregationLoop<P, M, E> {
    cursor: StreamCursor<P>,
    accumulator: WindowAccumulator<M>,
    emitter: E,
    config: LoopConfig,
    interval: Box<dyn DrainTrigger>,
    threshold: Box<dyn DrainTrigger>,
    stop: StopSignal,
    state: LoopState,
    stats: LoopStats,
    partition: Option<PartitionId>,
    // offset of the newest record folded into the current window
    last_offset: Option<u64>,
    span: Span,
}

#[bon]
impl<P, M, E> AggregationLoop<P, M, E>
where
    P: SourcePartition,
    M: SentimentModel,
    E: Emitter,
{
    /// Open `partition` according to the configured start policy and create an idle loop
    #[builder]
    pub fn new(
        partition: P,
        model: M,
        emitter: E,
        partition_id: Option<PartitionId>,
        #[builder(default)] config: LoopConfig,
        #[builder(default)] stop: StopSignal,
    ) -> Result<Self, LoopError> {
        let span = info_span!("aggregation", partition = ?partition_id);
        let cursor = span
            .in_scope(|| StreamCursor::open(partition, config.start_policy, config.retry))
            .map_err(|source| LoopError::Open {
                partition: partition_id,
                source,
            })?;
        span.in_scope(|| {
            info!(
                "Aggregating from {:?} into sink {}",
                cursor.position(),
                config.sink
            )
        });
        Ok(Self {
            cursor,
            accumulator: config.accumulator(model, partition_id),
            emitter,
            interval: config.interval_trigger(),
            threshold: config.threshold_trigger(),
            config,
            stop,
            state: LoopState::Idle,
            stats: LoopStats::default(),
            partition: partition_id,
            last_offset: None,
            span,
        })
    }
}

impl<P, M, E> AggregationLoop<P, M, E>
where
    P: SourcePartition,
    M: SentimentModel,
    E: Emitter,
{
    /// Execute one cycle: poll a batch, fold it into the window and drain if a trigger fires.
    ///
    /// Transient source failures which persist after retrying leave the cursor in place, the
    /// drain interval is still checked. A fatal source failure stops the loop and is returned as
    /// error.
    pub fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        let span = self.span.clone();
        let _entered = span.enter();

        if let LoopState::Stopped(reason) = &self.state {
            return Ok(TickOutcome::Stopped(reason.clone()));
        }
        if self.stop.is_stopped() {
            info!("Stop requested");
            self.state = LoopState::Stopped(StopReason::Cancelled);
            return Ok(TickOutcome::Stopped(StopReason::Cancelled));
        }
        self.stats.ticks += 1;

        self.state = LoopState::Polling;
        let polled = match self.cursor.poll(self.config.batch_size) {
            Ok(records) => Some(records),
            Err(e) if e.is_transient() => {
                warn!("Poll failed after retrying, trying again next tick: {e}");
                self.stats.transient_failures += 1;
                None
            }
            Err(e) => {
                error!("Fatal source failure: {e}");
                self.state = LoopState::Stopped(StopReason::SourceFailed(e.to_string()));
                return Err(LoopError::Source(e));
            }
        };

        let read = polled.as_ref().map_or(0, Vec::len);
        let mut drains = 0;
        match polled {
            // the interval below still applies while the source is unavailable
            None => (),
            Some(records) if records.is_empty() => {
                self.stats.empty_polls += 1;
                debug!("Empty poll at {:?}", self.cursor.position());
            }
            Some(records) => {
                self.state = LoopState::Processing;
                for raw in records.iter() {
                    if let Some(offset) = raw.offset {
                        self.last_offset = Some(offset);
                    }
                    let record = match Record::decode(raw, &self.config.payload_format) {
                        Ok(record) => record,
                        Err(e) => {
                            warn!("Skipping record at offset {:?}: {e}", raw.offset);
                            self.accumulator.record_skip();
                            self.stats.skipped += 1;
                            continue;
                        }
                    };
                    match self.accumulator.absorb(&record) {
                        Absorbed::Counted(_) => {
                            self.stats.absorbed += 1;
                            drains += self.drain_on_volume();
                        }
                        Absorbed::Skipped => self.stats.skipped += 1,
                    }
                }
            }
        }

        let window = self.accumulator.stats();
        if self.interval.should_drain(&window) {
            if window == WindowStats::default() {
                debug!("Interval elapsed on empty window");
                self.interval.reset();
            } else {
                self.drain(DrainReason::Interval);
                drains += 1;
            }
        }

        self.state = LoopState::Idle;
        if read == 0 && drains == 0 {
            Ok(TickOutcome::Idle)
        } else {
            Ok(TickOutcome::Processed {
                records: read,
                drains,
            })
        }
    }

    /// Tick until the [StopSignal] is raised or the source fails, then [finish](Self::finish).
    ///
    /// After a poll without records the loop waits for the poll interval or until the stop
    /// signal is raised, whichever comes first.
    pub fn run(mut self) -> LoopReport {
        loop {
            match self.tick() {
                Ok(TickOutcome::Stopped(_)) | Err(_) => break,
                Ok(TickOutcome::Idle) | Ok(TickOutcome::Processed { records: 0, .. }) => {
                    self.stop.wait(self.config.poll_interval);
                }
                Ok(TickOutcome::Processed { .. }) => {}
            }
        }
        self.finish()
    }

    /// Stop the loop, drain the partially filled window if configured and release the emitter
    pub fn finish(mut self) -> LoopReport {
        let span = self.span.clone();
        let _entered = span.enter();

        let stop_reason = match &self.state {
            LoopState::Stopped(reason) => reason.clone(),
            _ => {
                self.state = LoopState::Stopped(StopReason::Cancelled);
                StopReason::Cancelled
            }
        };
        if self.config.drain_on_stop && self.accumulator.stats() != WindowStats::default() {
            self.drain(DrainReason::Shutdown);
        }
        self.emitter.suspend();
        let undelivered = self.emitter.undelivered();
        if undelivered > 0 {
            error!("{undelivered} snapshots were accepted but never delivered");
            self.stats.emit_failures += undelivered;
            self.stats.snapshots_emitted = self.stats.snapshots_emitted.saturating_sub(undelivered);
        }
        info!(
            "Stopped aggregation ({stop_reason:?}) after {} ticks, {} snapshots emitted",
            self.stats.ticks, self.stats.snapshots_emitted
        );
        LoopReport {
            partition: self.partition,
            stats: std::mem::take(&mut self.stats),
            stop_reason,
            position: self.cursor.position(),
        }
    }

    /// Current state of the loop
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Counters since the loop was created
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// The window currently being filled
    pub fn window(&self) -> &WindowState {
        self.accumulator.state()
    }

    /// Read position of the underlying cursor
    pub fn position(&self) -> CursorPosition {
        self.cursor.position()
    }

    /// Drain if the window reached the record threshold or its memory bound.
    /// Returns the number of drains.
    fn drain_on_volume(&mut self) -> usize {
        let window = self.accumulator.stats();
        if self.threshold.should_drain(&window) {
            self.drain(DrainReason::RecordThreshold);
            1
        } else if window.records >= self.config.max_window_records {
            warn!(
                "Window reached {} records, forcing a drain",
                window.records
            );
            self.stats.forced_drains += 1;
            self.drain(DrainReason::MemoryBound);
            1
        } else {
            0
        }
    }

    fn drain(&mut self, reason: DrainReason) {
        let previous = std::mem::replace(&mut self.state, LoopState::Draining);
        let snapshot = self.accumulator.drain(reason);
        self.interval.reset();
        self.threshold.reset();

        let sink = &self.config.sink;
        let emitter = &mut self.emitter;
        let emitted = (|| emitter.emit(&snapshot, sink))
            .retry(self.config.retry.backoff())
            .sleep(std::thread::sleep)
            .when(EmitError::is_transient)
            .notify(|e, after| {
                warn!(
                    "Emitting window {} failed, retrying in {after:?}: {e}",
                    snapshot.window
                )
            })
            .call();
        match emitted {
            Ok(()) => {
                self.stats.snapshots_emitted += 1;
                info!(
                    "Drained window {} ({:?}) with {} reviews, mean sentiment {:.3}",
                    snapshot.window, reason, snapshot.sample_size, snapshot.mean_polarity
                );
            }
            Err(e) => {
                self.stats.emit_failures += 1;
                error!("Dropping window {} after emit failure: {e}", snapshot.window);
            }
        }

        // later records of the current batch already belong to the next window
        let committed = match self.last_offset {
            Some(offset) => self.cursor.commit_at(CursorPosition::Offset(offset + 1)),
            None => self.cursor.commit(),
        };
        if let Err(e) = committed {
            warn!("Failed to commit read position: {e}");
        }
        self.state = previous;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        emitters::{BufferedEmitter, SinkId},
        sources::{RetryPolicy, SourceError, StartPolicy},
        testing::{FixedModel, ScriptedPartition, Step, VecEmitter},
        types::{PayloadFormat, Snapshot},
    };

    fn config(threshold: u64) -> LoopConfig {
        LoopConfig::builder()
            .start_policy(StartPolicy::FromOldest)
            .payload_format(PayloadFormat::PlainText)
            .drain_record_threshold(threshold)
            .drain_interval(Duration::ZERO)
            .retry(RetryPolicy::immediate(0))
            .build()
    }

    fn aggregation<E: Emitter>(
        steps: Vec<Step>,
        model: FixedModel,
        emitter: E,
        config: LoopConfig,
    ) -> AggregationLoop<ScriptedPartition, FixedModel, E> {
        AggregationLoop::builder()
            .partition(ScriptedPartition::new(steps))
            .model(model)
            .emitter(emitter)
            .partition_id(0)
            .config(config)
            .build()
            .unwrap()
    }

    #[test]
    fn three_reviews_one_per_class() {
        let model = FixedModel::new([
            ("great product", 0.8),
            ("terrible battery", -0.6),
            ("it's fine", 0.0),
        ]);
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::records(["great product", "terrible battery", "it's fine"])],
            model,
            snapshots.clone(),
            config(3),
        );
        agg.tick().unwrap();

        let snaps: Vec<Snapshot> = snapshots.into_iter().collect();
        assert_eq!(snaps.len(), 1);
        let snap = &snaps[0];
        assert_eq!(snap.sentiment.positive, 1);
        assert_eq!(snap.sentiment.negative, 1);
        assert_eq!(snap.sentiment.neutral, 1);
        assert_eq!(snap.sample_size, 3);
        assert!((snap.mean_polarity - 0.0667).abs() < 1e-3);
        assert_eq!(snap.reason, DrainReason::RecordThreshold);
        assert_eq!(snap.partition, Some(0));
    }

    #[test]
    fn empty_polls_change_nothing() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::Empty, Step::Empty],
            FixedModel::default(),
            snapshots.clone(),
            config(2),
        );
        let before = agg.position();
        assert_eq!(agg.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(agg.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(agg.position(), before);
        assert_eq!(agg.state(), &LoopState::Idle);
        assert_eq!(agg.window().records(), 0);
        assert_eq!(agg.stats().empty_polls, 2);
        assert!(snapshots.is_empty());
    }

    #[test]
    fn threshold_drains_mid_batch() {
        let model = FixedModel::new([("a", 0.5), ("b", 0.5), ("c", -0.5)]);
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::records(["a", "b", "c"])],
            model,
            snapshots.clone(),
            config(2),
        );
        assert_eq!(
            agg.tick().unwrap(),
            TickOutcome::Processed {
                records: 3,
                drains: 1
            }
        );
        assert_eq!(snapshots.len(), 1);
        assert_eq!(agg.window().records(), 1);
        assert_eq!(agg.window().token_count("c"), 1);
        assert_eq!(agg.window().token_count("a"), 0);

        let first = snapshots.drain_vec(..).remove(0);
        assert_eq!(first.sample_size, 2);
        assert_eq!(first.sentiment.positive, 2);
    }

    #[test]
    fn commits_after_last_drained_record() {
        let part = ScriptedPartition::new(vec![Step::records(["a", "b", "c"])]);
        let commits = part.commit_log();
        let mut agg = AggregationLoop::builder()
            .partition(part)
            .model(FixedModel::default())
            .emitter(VecEmitter::new())
            .config(config(2))
            .build()
            .unwrap();
        agg.tick().unwrap();
        assert_eq!(commits.all(), vec![CursorPosition::Offset(2)]);

        let report = agg.finish();
        assert_eq!(commits.last(), Some(CursorPosition::Offset(3)));
        assert_eq!(report.stats.snapshots_emitted, 2);
        assert_eq!(report.partition, None);
    }

    #[test]
    fn emit_failure_still_clears_window() {
        let failing = |_: &Snapshot, _: &SinkId| -> Result<(), EmitError> {
            Err(EmitError::Failed("disk full".into()))
        };
        let mut agg = aggregation(
            vec![Step::records(["x", "y"])],
            FixedModel::default(),
            failing,
            config(1),
        );
        agg.tick().unwrap();
        assert_eq!(agg.stats().emit_failures, 2);
        assert_eq!(agg.stats().snapshots_emitted, 0);
        assert_eq!(agg.window().records(), 0);
        assert_eq!(agg.state(), &LoopState::Idle);
    }

    #[test]
    fn transient_emit_failures_are_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let flaky = move |_: &Snapshot, _: &SinkId| -> Result<(), EmitError> {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EmitError::Transient("busy".into()))
            } else {
                Ok(())
            }
        };
        let mut agg = aggregation(
            vec![Step::records(["x"])],
            FixedModel::default(),
            flaky,
            LoopConfig {
                retry: RetryPolicy::immediate(3),
                ..config(1)
            },
        );
        agg.tick().unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(agg.stats().snapshots_emitted, 1);
        assert_eq!(agg.stats().emit_failures, 0);
    }

    #[test]
    fn background_delivery_is_retried_and_reported() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let snapshots = VecEmitter::new();
        let mut collect = snapshots.clone();
        let flaky_once = move |snapshot: &Snapshot, sink: &SinkId| -> Result<(), EmitError> {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(EmitError::Transient("timeout".into()));
            }
            collect.emit(snapshot, sink)
        };
        let mut agg = aggregation(
            vec![Step::records(["x"])],
            FixedModel::default(),
            BufferedEmitter::new(flaky_once, 4, RetryPolicy::immediate(5)),
            config(1),
        );
        agg.tick().unwrap();
        let report = agg.finish();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(report.stats.snapshots_emitted, 1);
        assert_eq!(report.stats.emit_failures, 0);

        let lost = |_: &Snapshot, _: &SinkId| -> Result<(), EmitError> {
            Err(EmitError::Transient("timeout".into()))
        };
        let mut agg = aggregation(
            vec![Step::records(["x", "y"])],
            FixedModel::default(),
            BufferedEmitter::new(lost, 4, RetryPolicy::immediate(1)),
            config(1),
        );
        agg.tick().unwrap();
        assert_eq!(agg.stats().snapshots_emitted, 2);
        let report = agg.finish();
        assert_eq!(report.stats.snapshots_emitted, 0);
        assert_eq!(report.stats.emit_failures, 2);
    }

    #[test]
    fn memory_bound_forces_drain() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::records(["a", "b", "c", "d", "e"])],
            FixedModel::default(),
            snapshots.clone(),
            LoopConfig {
                max_window_records: 2,
                ..config(0)
            },
        );
        agg.tick().unwrap();
        assert_eq!(agg.stats().forced_drains, 2);
        let reasons: Vec<DrainReason> = snapshots.into_iter().map(|s| s.reason).collect();
        assert_eq!(reasons, vec![DrainReason::MemoryBound; 2]);
        assert_eq!(agg.window().records(), 1);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::records([
                r#"{"reviews.text": "solid build"}"#,
                "not json at all",
                r#"{"reviews.rating": 4}"#,
                r#"{"reviews.text": "   "}"#,
            ])],
            FixedModel::default(),
            snapshots.clone(),
            LoopConfig {
                payload_format: PayloadFormat::default(),
                ..config(0)
            },
        );
        agg.tick().unwrap();
        assert_eq!(agg.stats().absorbed, 1);
        assert_eq!(agg.stats().skipped, 3);
        assert_eq!(agg.window().skipped(), 3);

        let report = agg.finish();
        let snap = snapshots.drain_vec(..).remove(0);
        assert_eq!(snap.sample_size, 1);
        assert_eq!(snap.skipped, 3);
        assert_eq!(snap.reason, DrainReason::Shutdown);
        assert_eq!(report.stop_reason, StopReason::Cancelled);
    }

    #[test]
    fn transient_poll_failure_keeps_position() {
        let mut agg = aggregation(
            vec![Step::records(["a"]), Step::Transient, Step::records(["b"])],
            FixedModel::default(),
            VecEmitter::new(),
            config(0),
        );
        agg.tick().unwrap();
        let position = agg.position();
        assert_eq!(agg.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(agg.position(), position);
        assert_eq!(agg.stats().transient_failures, 1);
        agg.tick().unwrap();
        assert_eq!(agg.window().records(), 2);
    }

    #[test]
    fn interval_drains_during_source_outage() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![
                Step::records(["a"]),
                Step::Transient,
                Step::Transient,
                Step::Transient,
            ],
            FixedModel::default(),
            snapshots.clone(),
            LoopConfig {
                drain_interval: Duration::from_millis(20),
                ..config(0)
            },
        );
        agg.tick().unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(
            agg.tick().unwrap(),
            TickOutcome::Processed {
                records: 0,
                drains: 1
            }
        );
        assert_eq!(agg.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(agg.tick().unwrap(), TickOutcome::Idle);

        assert_eq!(agg.stats().transient_failures, 3);
        assert_eq!(agg.window().records(), 0);
        let snaps: Vec<Snapshot> = snapshots.into_iter().collect();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].reason, DrainReason::Interval);
        assert_eq!(snaps[0].sample_size, 1);
    }

    #[test]
    fn fatal_source_failure_stops() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::records(["a"]), Step::Fatal, Step::records(["b"])],
            FixedModel::default(),
            snapshots.clone(),
            config(0),
        );
        agg.tick().unwrap();
        assert!(matches!(
            agg.tick(),
            Err(LoopError::Source(SourceError::Fatal(_)))
        ));
        assert!(matches!(
            agg.tick().unwrap(),
            TickOutcome::Stopped(StopReason::SourceFailed(_))
        ));
        let report = agg.finish();
        assert!(matches!(report.stop_reason, StopReason::SourceFailed(_)));
        // the partial window is still emitted on the way out
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn rewinding_source_stops() {
        let mut agg = aggregation(
            vec![
                Step::records(["a", "b"]),
                Step::Rewind(CursorPosition::Offset(0)),
            ],
            FixedModel::default(),
            VecEmitter::new(),
            config(0),
        );
        agg.tick().unwrap();
        assert!(matches!(
            agg.tick(),
            Err(LoopError::Source(SourceError::Rewound { .. }))
        ));
    }

    #[test]
    fn stop_signal_is_checked_first() {
        let stop = StopSignal::new();
        let snapshots = VecEmitter::new();
        let mut agg = AggregationLoop::builder()
            .partition(ScriptedPartition::new(vec![Step::records(["a"])]))
            .model(FixedModel::default())
            .emitter(snapshots.clone())
            .config(config(0))
            .stop(stop.clone())
            .build()
            .unwrap();
        stop.stop();
        assert_eq!(
            agg.tick().unwrap(),
            TickOutcome::Stopped(StopReason::Cancelled)
        );
        assert_eq!(agg.stats().ticks, 0);
        let report = agg.finish();
        assert_eq!(report.position, CursorPosition::Oldest);
        assert!(snapshots.is_empty());
    }

    #[test]
    fn run_until_stopped_from_emitter() {
        let stop = StopSignal::new();
        let snapshots = VecEmitter::new();
        let mut collect = snapshots.clone();
        let remote = stop.clone();
        let emitter = move |snapshot: &Snapshot, sink: &SinkId| -> Result<(), EmitError> {
            collect.emit(snapshot, sink)?;
            remote.stop();
            Ok(())
        };
        let agg = AggregationLoop::builder()
            .partition(ScriptedPartition::new(vec![Step::records(["a", "b", "c"])]))
            .model(FixedModel::default())
            .emitter(emitter)
            .config(config(2))
            .stop(stop)
            .build()
            .unwrap();
        let report = agg.run();

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert_eq!(report.stats.snapshots_emitted, 2);
        assert_eq!(report.position, CursorPosition::Offset(3));
        let sizes: Vec<(u64, DrainReason)> = snapshots
            .into_iter()
            .map(|s| (s.sample_size, s.reason))
            .collect();
        assert_eq!(
            sizes,
            vec![(2, DrainReason::RecordThreshold), (1, DrainReason::Shutdown)]
        );
    }

    #[test]
    fn interval_skips_empty_windows() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::Empty, Step::records(["a"]), Step::Empty],
            FixedModel::default(),
            snapshots.clone(),
            LoopConfig {
                drain_interval: Duration::from_millis(20),
                ..config(0)
            },
        );
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(agg.tick().unwrap(), TickOutcome::Idle);
        assert!(snapshots.is_empty());

        agg.tick().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        agg.tick().unwrap();
        let snaps: Vec<Snapshot> = snapshots.into_iter().collect();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].reason, DrainReason::Interval);
        assert_eq!(snaps[0].sample_size, 1);
    }

    #[test]
    fn windows_are_numbered_in_order() {
        let snapshots = VecEmitter::new();
        let mut agg = aggregation(
            vec![Step::records(["a", "b", "c", "d", "e", "f"])],
            FixedModel::default(),
            snapshots.clone(),
            config(2),
        );
        agg.tick().unwrap();
        let windows: Vec<u64> = snapshots.into_iter().map(|s| s.window).collect();
        assert_eq!(windows, vec![0, 1, 2]);
    }
}
