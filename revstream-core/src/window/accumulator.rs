use std::collections::VecDeque;

use bon::bon;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    text::{Score, SentimentModel, SentimentScorer, Tokenizer},
    types::{
        DrainReason, Histogram, PartitionId, Record, SentimentClass, SentimentCounts, Snapshot,
        TokenCount,
    },
};

use super::{wall_clock_ms, WindowStats};

/// Aggregate of all records absorbed since the last drain.
///
/// A fresh state is created for every window. Draining moves the state out of the accumulator
/// and replaces it, so nothing is carried over between windows.
#[derive(Debug, Clone)]
pub struct WindowState {
    // insertion order of the map is first-seen order, used to break ties in the top-K
    token_counts: IndexMap<String, u64>,
    scores: Vec<f64>,
    records: u64,
    skipped: u64,
    total_tokens: u64,
    recent: VecDeque<String>,
    opened_at_ms: u64,
}

impl WindowState {
    fn open() -> Self {
        Self {
            token_counts: IndexMap::new(),
            scores: Vec::new(),
            records: 0,
            skipped: 0,
            total_tokens: 0,
            recent: VecDeque::new(),
            opened_at_ms: wall_clock_ms(),
        }
    }

    /// Records absorbed into this window
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Records skipped during this window
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Occurrences of a single token
    pub fn token_count(&self, token: &str) -> u64 {
        self.token_counts.get(token).copied().unwrap_or_default()
    }

    /// Polarity scores in arrival order
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}

/// Outcome of [WindowAccumulator::absorb]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Absorbed {
    /// The record was counted with the given score
    Counted(Score),
    /// The record had no text and was only counted as skipped
    Skipped,
}

/// Folds records into a [WindowState] and turns it into [Snapshot]s.
///
/// # Example
/// ```
/// use revstream::text::LexiconModel;
/// use revstream::types::Record;
/// use revstream::window::WindowAccumulator;
///
/// let mut acc = WindowAccumulator::builder()
///     .model(LexiconModel::default())
///     .top_k(2)
///     .build();
/// acc.absorb(&Record::new("Great sound, great battery"));
/// acc.absorb(&Record::new("   "));
///
/// let snapshot = acc.drain_snapshot();
/// assert_eq!(snapshot.sample_size, 1);
/// assert_eq!(snapshot.skipped, 1);
/// assert_eq!(snapshot.top_tokens[0].token, "great");
/// assert_eq!(acc.drain_snapshot().sample_size, 0);
/// ```
pub struct WindowAccumulator<M> {
    state: WindowState,
    scorer: SentimentScorer<M>,
    tokenizer: Tokenizer,
    partition: Option<PartitionId>,
    top_k: usize,
    histogram_bins: usize,
    recent_capacity: usize,
    excerpt_chars: usize,
    next_window: u64,
}

#[bon]
impl<M: SentimentModel> WindowAccumulator<M> {
    /// Create an accumulator with an empty first window
    #[builder]
    pub fn new(
        model: M,
        partition: Option<PartitionId>,
        #[builder(default = 10)] top_k: usize,
        #[builder(default = 30)] histogram_bins: usize,
        #[builder(default = 5)] recent_capacity: usize,
        #[builder(default = 200)] excerpt_chars: usize,
        #[builder(default)] alphabetic_only: bool,
    ) -> Self {
        Self {
            state: WindowState::open(),
            scorer: SentimentScorer::new(model),
            tokenizer: Tokenizer::default().alphabetic_only(alphabetic_only),
            partition,
            top_k,
            histogram_bins,
            recent_capacity,
            excerpt_chars,
            next_window: 0,
        }
    }
}

impl<M: SentimentModel> WindowAccumulator<M> {
    /// Fold a record into the current window.
    /// Records with empty or whitespace-only text are counted as skipped.
    pub fn absorb(&mut self, record: &Record) -> Absorbed {
        let text = record.text().trim();
        if text.is_empty() {
            self.record_skip();
            return Absorbed::Skipped;
        }
        for token in self.tokenizer.tokenize(text) {
            *self.state.token_counts.entry(token).or_insert(0) += 1;
            self.state.total_tokens += 1;
        }
        let score = self.scorer.score(text);
        self.state.scores.push(score.polarity);
        self.state.records += 1;

        if self.recent_capacity > 0 {
            if self.state.recent.len() == self.recent_capacity {
                self.state.recent.pop_back();
            }
            self.state
                .recent
                .push_front(text.chars().take(self.excerpt_chars).collect());
        }
        Absorbed::Counted(score)
    }

    /// Count a record which could not be decoded
    pub fn record_skip(&mut self) {
        self.state.skipped += 1;
    }

    /// Read-only view of the current window
    pub fn state(&self) -> &WindowState {
        &self.state
    }

    /// Size of the current window as seen by drain triggers
    pub fn stats(&self) -> WindowStats {
        WindowStats {
            records: self.state.records,
            skipped: self.state.skipped,
        }
    }

    /// Drain the current window outside of an aggregation loop
    pub fn drain_snapshot(&mut self) -> Snapshot {
        self.drain(DrainReason::Manual)
    }

    /// Summarize the current window into a [Snapshot] and start a new, empty window.
    ///
    /// The state is swapped out before it is summarized, every absorbed record is reflected in
    /// exactly one snapshot.
    pub fn drain(&mut self, reason: DrainReason) -> Snapshot {
        let state = std::mem::replace(&mut self.state, WindowState::open());
        let window = self.next_window;
        self.next_window += 1;

        let mut sentiment = SentimentCounts::default();
        let mut histogram = Histogram::new(self.histogram_bins);
        for polarity in state.scores.iter().copied() {
            sentiment.record(SentimentClass::from_polarity(polarity));
            histogram.record(polarity);
        }
        let mean_polarity = if state.scores.is_empty() {
            0.0
        } else {
            state.scores.iter().sum::<f64>() / state.scores.len() as f64
        };

        // sorted_by is stable, equal counts keep first-seen order
        let top_tokens = state
            .token_counts
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .take(self.top_k)
            .map(|(token, count)| TokenCount { token, count })
            .collect();

        Snapshot {
            partition: self.partition,
            window,
            opened_at_ms: state.opened_at_ms,
            closed_at_ms: wall_clock_ms(),
            reason,
            top_tokens,
            total_tokens: state.total_tokens,
            sentiment,
            mean_polarity,
            sample_size: state.records,
            skipped: state.skipped,
            histogram,
            recent: state.recent.into_iter().collect(),
        }
    }
}
