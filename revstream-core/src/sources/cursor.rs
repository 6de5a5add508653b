use backon::BlockingRetryable;
use tracing::{debug, warn};

use super::{CursorPosition, RetryPolicy, SourceError, SourcePartition, StartPolicy};
use crate::types::RawRecord;

/// Read position of a single partition.
///
/// The cursor only ever moves forward: a poll whose next position lies before the current one
/// is rejected with [SourceError::Rewound] and the position is left untouched. Transient
/// failures are retried according to the [RetryPolicy] before they are returned.
pub struct StreamCursor<P> {
    partition: P,
    position: CursorPosition,
    retry: RetryPolicy,
}

impl<P: SourcePartition> StreamCursor<P> {
    /// Open the partition at the position selected by `policy`
    pub fn open(
        mut partition: P,
        policy: StartPolicy,
        retry: RetryPolicy,
    ) -> Result<Self, SourceError> {
        let position = (|| partition.open(policy))
            .retry(retry.backoff())
            .sleep(std::thread::sleep)
            .when(SourceError::is_transient)
            .notify(|e, after| warn!("Opening partition failed, retrying in {after:?}: {e}"))
            .call()?;
        debug!("Opened partition with policy {policy} at {position:?}");
        Ok(Self {
            partition,
            position,
            retry,
        })
    }

    /// Read the next batch of at most `max_records` records and advance the cursor past them.
    ///
    /// On error the position is unchanged, so no unread data is skipped.
    pub fn poll(&mut self, max_records: usize) -> Result<Vec<RawRecord>, SourceError> {
        let current = self.position;
        let partition = &mut self.partition;
        let batch = (|| partition.poll(&current, max_records))
            .retry(self.retry.backoff())
            .sleep(std::thread::sleep)
            .when(SourceError::is_transient)
            .notify(|e, after| warn!("Polling partition failed, retrying in {after:?}: {e}"))
            .call()?;

        if !current.may_advance_to(&batch.next_position) {
            return Err(SourceError::Rewound {
                current,
                next: batch.next_position,
            });
        }
        self.position = batch.next_position;
        Ok(batch.records)
    }

    /// Commit the current position to the partition
    pub fn commit(&mut self) -> Result<(), SourceError> {
        self.commit_at(self.position)
    }

    /// Commit a position at or before the current one, e.g. the position just after the last
    /// record of a drained window while later records of the same batch are still pending.
    pub fn commit_at(&mut self, position: CursorPosition) -> Result<(), SourceError> {
        if !position.may_advance_to(&self.position) {
            return Err(SourceError::CommitAhead {
                current: self.position,
                requested: position,
            });
        }
        let partition = &mut self.partition;
        (|| partition.commit(&position))
            .retry(self.retry.backoff())
            .sleep(std::thread::sleep)
            .when(SourceError::is_transient)
            .call()
    }

    /// Current read position
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    /// The partition this cursor reads from
    pub fn partition(&self) -> &P {
        &self.partition
    }
}
