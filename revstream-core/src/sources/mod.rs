//! Partitioned sources and the cursor tracking the read position within one partition.
//!
//! A [PartitionedSource] lists the partitions of a log and builds a [SourcePartition] for each
//! of them. The [StreamCursor] drives a single partition: it owns the current
//! [CursorPosition], retries transient failures and refuses to move backwards.
use std::{fmt::Display, str::FromStr, time::Duration};

use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    errorhandling::BoxError,
    types::{PartitionId, RawRecord},
};

mod cursor;

pub use cursor::StreamCursor;

/// A source whose data is split into independently ordered partitions
pub trait PartitionedSource: 'static {
    /// Reader for a single partition
    type Partition: SourcePartition;

    /// List all partitions of this source
    fn list_parts(&self) -> Result<Vec<PartitionId>, SourceError>;

    /// Create a reader for one partition
    fn build_part(&mut self, part: PartitionId) -> Result<Self::Partition, SourceError>;
}

/// Reader of a single partition
pub trait SourcePartition: Send + 'static {
    /// Resolve a start policy into the initial read position
    fn open(&mut self, policy: StartPolicy) -> Result<CursorPosition, SourceError>;

    /// Read at most `max_records` records starting at `position`.
    ///
    /// Returning zero records is not an error. The returned batch must always carry a position
    /// from which the next poll continues, for an empty batch this is usually `position` itself.
    fn poll(
        &mut self,
        position: &CursorPosition,
        max_records: usize,
    ) -> Result<PollBatch, SourceError>;

    /// Durably record that everything before `position` has been aggregated
    fn commit(&mut self, _position: &CursorPosition) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Result of a single [SourcePartition::poll]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollBatch {
    /// Records in partition order
    pub records: Vec<RawRecord>,
    /// Where the next poll should continue
    pub next_position: CursorPosition,
}

/// Where a partition is read from when it is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPolicy {
    /// Replay the full retained history
    FromOldest,
    /// Skip to the live edge, only records arriving after opening are read
    #[default]
    FromNewest,
    /// Resume at an explicit offset, e.g. a previously committed one
    At(u64),
}

impl FromStr for StartPolicy {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oldest" | "earliest" | "trim_horizon" => Ok(StartPolicy::FromOldest),
            "newest" | "latest" => Ok(StartPolicy::FromNewest),
            other => other
                .parse::<u64>()
                .map(StartPolicy::At)
                .map_err(|_| SourceError::InvalidStartPolicy(s.to_owned())),
        }
    }
}

impl Display for StartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartPolicy::FromOldest => f.write_str("oldest"),
            StartPolicy::FromNewest => f.write_str("newest"),
            StartPolicy::At(offset) => write!(f, "{offset}"),
        }
    }
}

/// Read position within a partition.
///
/// `Oldest` and `Newest` are unresolved positions handed out by [SourcePartition::open] before
/// the first record is read. `Offset` is the offset of the next record to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorPosition {
    /// Beginning of the retained history
    Oldest,
    /// Live edge of the partition
    Newest,
    /// Offset of the next record to read
    Offset(u64),
}

impl CursorPosition {
    /// True if moving from `self` to `next` does not go back to already consumed data
    pub fn may_advance_to(&self, next: &CursorPosition) -> bool {
        match (self, next) {
            (CursorPosition::Offset(current), CursorPosition::Offset(next)) => next >= current,
            (CursorPosition::Offset(_), _) => false,
            (_, CursorPosition::Offset(_)) => true,
            (current, next) => current == next,
        }
    }
}

/// Backoff applied to transient source and emitter failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub min_delay: Duration,
    /// Upper bound for the exponentially growing delay
    pub max_delay: Duration,
    /// Retries after the first attempt, 0 disables retrying
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, useful for tests
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_retries,
        }
    }

    pub(crate) fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Errors reading from a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// A failure which may go away on retry, e.g. a network timeout
    #[error("Transient failure reading from source")]
    Transient(#[source] BoxError),
    /// The partition can not be read anymore, e.g. it was deleted
    #[error("Source partition is not readable anymore")]
    Fatal(#[source] BoxError),
    /// The source handed out a position before the current one
    #[error("Source moved cursor back from {current:?} to {next:?}")]
    Rewound {
        #[allow(missing_docs)]
        current: CursorPosition,
        #[allow(missing_docs)]
        next: CursorPosition,
    },
    /// A commit asked for a position the cursor has not reached yet
    #[error("Cannot commit {requested:?}, cursor is only at {current:?}")]
    CommitAhead {
        #[allow(missing_docs)]
        current: CursorPosition,
        #[allow(missing_docs)]
        requested: CursorPosition,
    },
    /// Unknown textual start policy
    #[error("Invalid start policy `{0}`, expected `oldest`, `newest` or an offset")]
    InvalidStartPolicy(String),
}

impl SourceError {
    /// True if the operation may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_start_policy() {
        assert_eq!(
            "oldest".parse::<StartPolicy>().unwrap(),
            StartPolicy::FromOldest
        );
        assert_eq!(
            "TRIM_HORIZON".parse::<StartPolicy>().unwrap(),
            StartPolicy::FromOldest
        );
        assert_eq!(
            "latest".parse::<StartPolicy>().unwrap(),
            StartPolicy::FromNewest
        );
        assert_eq!("42".parse::<StartPolicy>().unwrap(), StartPolicy::At(42));
        assert!("sometime".parse::<StartPolicy>().is_err());
        assert_eq!(StartPolicy::At(7).to_string(), "7");
    }

    #[test]
    fn position_monotonicity() {
        use CursorPosition::*;
        assert!(Oldest.may_advance_to(&Oldest));
        assert!(Oldest.may_advance_to(&Offset(0)));
        assert!(Newest.may_advance_to(&Offset(10)));
        assert!(Offset(3).may_advance_to(&Offset(3)));
        assert!(Offset(3).may_advance_to(&Offset(4)));
        assert!(!Offset(3).may_advance_to(&Offset(2)));
        assert!(!Offset(3).may_advance_to(&Oldest));
        assert!(!Oldest.may_advance_to(&Newest));
    }
}
