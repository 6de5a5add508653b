use serde::{Deserialize, Serialize};

use super::{PartitionId, SentimentClass};

/// Immutable summary of one completed window.
///
/// A snapshot owns all of its data and shares nothing with the accumulator which produced it,
/// so it may be handed to another thread for emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Partition the window was aggregated from, if the loop is bound to one
    pub partition: Option<PartitionId>,
    /// Sequence number of this window, starting at 0 and increasing by 1 per drain
    pub window: u64,
    /// Wall clock time the window was opened, ms since the unix epoch
    pub opened_at_ms: u64,
    /// Wall clock time the window was drained, ms since the unix epoch
    pub closed_at_ms: u64,
    /// Why the window was drained
    pub reason: DrainReason,
    /// Most frequent tokens, descending by count, ties in first-seen order
    pub top_tokens: Vec<TokenCount>,
    /// Total token occurrences in the window
    pub total_tokens: u64,
    /// Records per sentiment class
    pub sentiment: SentimentCounts,
    /// Mean polarity of all scored records, 0 for an empty window
    pub mean_polarity: f64,
    /// Number of records absorbed into this window
    pub sample_size: u64,
    /// Number of records skipped as empty or malformed during this window
    pub skipped: u64,
    /// Distribution of polarity scores
    pub histogram: Histogram,
    /// Latest review texts, newest first
    pub recent: Vec<String>,
}

impl Snapshot {
    /// True if no record was absorbed or skipped during the window
    pub fn is_empty(&self) -> bool {
        self.sample_size == 0 && self.skipped == 0
    }
}

/// A token and its number of occurrences in a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    #[allow(missing_docs)]
    pub token: String,
    #[allow(missing_docs)]
    pub count: u64,
}

/// Number of records per [SentimentClass]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    #[allow(missing_docs)]
    pub positive: u64,
    #[allow(missing_docs)]
    pub neutral: u64,
    #[allow(missing_docs)]
    pub negative: u64,
}

impl SentimentCounts {
    /// Count one record of the given class
    pub fn record(&mut self, class: SentimentClass) {
        match class {
            SentimentClass::Positive => self.positive += 1,
            SentimentClass::Neutral => self.neutral += 1,
            SentimentClass::Negative => self.negative += 1,
        }
    }

    /// Count for a single class
    pub fn get(&self, class: SentimentClass) -> u64 {
        match class {
            SentimentClass::Positive => self.positive,
            SentimentClass::Neutral => self.neutral,
            SentimentClass::Negative => self.negative,
        }
    }

    /// Sum over all classes
    pub fn total(&self) -> u64 {
        self.positive + self.neutral + self.negative
    }
}

/// Fixed width histogram of polarity scores over [-1, 1]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    /// Occurrences per bin, bin `i` covers `[-1 + i * w, -1 + (i + 1) * w)` with the last bin
    /// closed on the right
    pub bins: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with `bins` empty bins. At least one bin is always created.
    pub fn new(bins: usize) -> Self {
        Self {
            bins: vec![0; bins.max(1)],
        }
    }

    /// Count a polarity score. Values outside [-1, 1] are clamped.
    pub fn record(&mut self, polarity: f64) {
        let n = self.bins.len();
        let scaled = ((polarity.clamp(-1.0, 1.0) + 1.0) / 2.0 * n as f64).floor();
        // NaN casts to 0
        let idx = (scaled as usize).min(n - 1);
        self.bins[idx] += 1;
    }

    /// Width of a single bin
    pub fn bin_width(&self) -> f64 {
        2.0 / self.bins.len() as f64
    }

    /// Sum over all bins
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }
}

/// What caused a window to be drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainReason {
    /// The drain interval elapsed
    Interval,
    /// The record count threshold was reached
    RecordThreshold,
    /// The window hit its memory bound
    MemoryBound,
    /// The loop stopped with a partially filled window
    Shutdown,
    /// Drained outside of the loop, e.g. by a caller holding the accumulator
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_edges() {
        let mut hist = Histogram::new(4);
        hist.record(-1.0);
        hist.record(-0.5);
        hist.record(0.0);
        hist.record(1.0);
        hist.record(7.0);
        assert_eq!(hist.bins, vec![1, 1, 1, 2]);
        assert_eq!(hist.total(), 5);
        assert!((hist.bin_width() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn histogram_has_at_least_one_bin() {
        let mut hist = Histogram::new(0);
        hist.record(0.3);
        assert_eq!(hist.bins, vec![1]);
    }

    #[test]
    fn sentiment_counts_total() {
        let mut counts = SentimentCounts::default();
        counts.record(SentimentClass::Positive);
        counts.record(SentimentClass::Negative);
        counts.record(SentimentClass::Negative);
        assert_eq!(counts.get(SentimentClass::Negative), 2);
        assert_eq!(counts.total(), 3);
    }
}
