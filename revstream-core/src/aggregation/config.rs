use std::time::Duration;

use bon::Builder;

use crate::{
    emitters::SinkId,
    sources::{RetryPolicy, StartPolicy},
    text::SentimentModel,
    types::{PartitionId, PayloadFormat},
    window::{DrainTrigger, IntervalTrigger, NoTrigger, RecordCountTrigger, WindowAccumulator},
};

/// Settings of an [AggregationLoop](super::AggregationLoop).
///
/// Every setting has a default, `LoopConfig::default()` is a sensible starting point.
///
/// ```
/// use std::time::Duration;
/// use revstream::aggregation::LoopConfig;
///
/// let config = LoopConfig::builder()
///     .drain_interval(Duration::from_secs(30))
///     .drain_record_threshold(0)
///     .build();
/// assert_eq!(config.batch_size, 100);
/// assert_eq!(config.top_k, 10);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct LoopConfig {
    /// Maximum number of records read per poll
    #[builder(default = 100)]
    pub batch_size: usize,
    /// Time to wait after a poll returned no records
    #[builder(default = Duration::from_secs(1))]
    pub poll_interval: Duration,
    /// Drain at least this often. `Duration::ZERO` disables the interval trigger.
    #[builder(default = Duration::from_secs(10))]
    pub drain_interval: Duration,
    /// Drain once the window holds this many records. `0` disables the threshold trigger.
    #[builder(default = 50)]
    pub drain_record_threshold: u64,
    /// Hard upper bound of records per window, reaching it always forces a drain
    #[builder(default = 10_000)]
    pub max_window_records: u64,
    /// Number of tokens in a snapshot's top list
    #[builder(default = 10)]
    pub top_k: usize,
    /// Bins of the polarity histogram
    #[builder(default = 30)]
    pub histogram_bins: usize,
    /// Review excerpts kept per snapshot
    #[builder(default = 5)]
    pub recent_excerpts: usize,
    /// Maximum characters per excerpt
    #[builder(default = 200)]
    pub excerpt_chars: usize,
    /// Drop tokens containing digits
    #[builder(default)]
    pub alphabetic_only: bool,
    /// Emit the partially filled window when the loop stops
    #[builder(default = true)]
    pub drain_on_stop: bool,
    /// Where the partition is read from when the loop starts
    #[builder(default)]
    pub start_policy: StartPolicy,
    /// How record payloads are turned into review texts
    #[builder(default)]
    pub payload_format: PayloadFormat,
    /// Sink identifier passed to the emitter
    #[builder(default)]
    pub sink: SinkId,
    /// Backoff for transient source and emitter failures
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LoopConfig {
    pub(crate) fn accumulator<M: SentimentModel>(
        &self,
        model: M,
        partition: Option<PartitionId>,
    ) -> WindowAccumulator<M> {
        WindowAccumulator::builder()
            .model(model)
            .maybe_partition(partition)
            .top_k(self.top_k)
            .histogram_bins(self.histogram_bins)
            .recent_capacity(self.recent_excerpts)
            .excerpt_chars(self.excerpt_chars)
            .alphabetic_only(self.alphabetic_only)
            .build()
    }

    pub(crate) fn interval_trigger(&self) -> Box<dyn DrainTrigger> {
        if self.drain_interval.is_zero() {
            Box::new(NoTrigger)
        } else {
            Box::new(IntervalTrigger::new(self.drain_interval))
        }
    }

    pub(crate) fn threshold_trigger(&self) -> Box<dyn DrainTrigger> {
        match self.drain_record_threshold {
            0 => Box::new(NoTrigger),
            n => Box::new(RecordCountTrigger::new(n)),
        }
    }
}
