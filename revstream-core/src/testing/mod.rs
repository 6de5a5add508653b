//! Utilities for testing aggregation pipelines without external systems
use std::{
    collections::{HashMap, VecDeque},
    ops::RangeBounds,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    emitters::{EmitError, Emitter, SinkId},
    sources::{
        CursorPosition, PartitionedSource, PollBatch, SourceError, SourcePartition, StartPolicy,
    },
    text::SentimentModel,
    types::{PartitionId, RawRecord, Snapshot},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted response of a [ScriptedPartition]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Hand out these payloads. If a poll asks for fewer records the rest is kept for the
    /// next poll.
    Records(Vec<Vec<u8>>),
    /// A poll returning zero records
    Empty,
    /// A poll failing with a transient error
    Transient,
    /// A poll failing with a fatal error
    Fatal,
    /// A poll returning no records but moving the position to the given one
    Rewind(CursorPosition),
}

impl Step {
    /// Hand out the given payloads
    pub fn records<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Step::Records(payloads.into_iter().map(Into::into).collect())
    }
}

/// Shared view of the positions committed by a [ScriptedPartition]
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    inner: Arc<Mutex<Vec<CursorPosition>>>,
}

impl CommitLog {
    /// The most recently committed position
    pub fn last(&self) -> Option<CursorPosition> {
        lock(&self.inner).last().copied()
    }

    /// All commits in the order they happened
    pub fn all(&self) -> Vec<CursorPosition> {
        lock(&self.inner).clone()
    }
}

/// A partition which plays back a fixed script of poll results.
///
/// Offsets are assigned sequentially starting at 0, or at the offset given by
/// [StartPolicy::At]. Once the script is exhausted every poll returns zero records.
#[derive(Debug, Clone)]
pub struct ScriptedPartition {
    steps: VecDeque<Step>,
    next_offset: u64,
    commits: CommitLog,
}

impl ScriptedPartition {
    /// Create a partition playing back `steps`
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            next_offset: 0,
            commits: CommitLog::default(),
        }
    }

    /// The most recently committed position
    pub fn committed(&self) -> Option<CursorPosition> {
        self.commits.last()
    }

    /// Handle to observe commits after the partition was moved into a loop
    pub fn commit_log(&self) -> CommitLog {
        self.commits.clone()
    }
}

impl SourcePartition for ScriptedPartition {
    fn open(&mut self, policy: StartPolicy) -> Result<CursorPosition, SourceError> {
        Ok(match policy {
            StartPolicy::FromOldest => CursorPosition::Oldest,
            StartPolicy::FromNewest => CursorPosition::Newest,
            StartPolicy::At(offset) => {
                self.next_offset = offset;
                CursorPosition::Offset(offset)
            }
        })
    }

    fn poll(
        &mut self,
        position: &CursorPosition,
        max_records: usize,
    ) -> Result<PollBatch, SourceError> {
        let idle = PollBatch {
            records: Vec::new(),
            next_position: *position,
        };
        let Some(step) = self.steps.pop_front() else {
            return Ok(idle);
        };
        match step {
            Step::Records(mut payloads) => {
                if payloads.len() > max_records {
                    let rest = payloads.split_off(max_records);
                    self.steps.push_front(Step::Records(rest));
                }
                let records = payloads
                    .into_iter()
                    .map(|payload| {
                        let record = RawRecord::new(payload).with_offset(self.next_offset);
                        self.next_offset += 1;
                        record
                    })
                    .collect();
                Ok(PollBatch {
                    records,
                    next_position: CursorPosition::Offset(self.next_offset),
                })
            }
            Step::Empty => Ok(idle),
            Step::Transient => Err(SourceError::Transient("scripted timeout".into())),
            Step::Fatal => Err(SourceError::Fatal("scripted partition loss".into())),
            Step::Rewind(next_position) => Ok(PollBatch {
                records: Vec::new(),
                next_position,
            }),
        }
    }

    fn commit(&mut self, position: &CursorPosition) -> Result<(), SourceError> {
        lock(&self.commits.inner).push(*position);
        Ok(())
    }
}

/// A source made of [ScriptedPartition]s
#[derive(Debug, Default)]
pub struct ScriptedSource {
    parts: Vec<(PartitionId, ScriptedPartition)>,
}

impl ScriptedSource {
    /// Create a source without partitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a partition playing back `steps`
    pub fn with_partition(mut self, part: PartitionId, steps: Vec<Step>) -> Self {
        self.parts.push((part, ScriptedPartition::new(steps)));
        self
    }

    /// Commit log of a partition, if it exists
    pub fn commit_log(&self, part: PartitionId) -> Option<CommitLog> {
        self.parts
            .iter()
            .find(|(id, _)| *id == part)
            .map(|(_, p)| p.commit_log())
    }
}

impl PartitionedSource for ScriptedSource {
    type Partition = ScriptedPartition;

    fn list_parts(&self) -> Result<Vec<PartitionId>, SourceError> {
        Ok(self.parts.iter().map(|(id, _)| *id).collect())
    }

    fn build_part(&mut self, part: PartitionId) -> Result<Self::Partition, SourceError> {
        let idx = self
            .parts
            .iter()
            .position(|(id, _)| *id == part)
            .ok_or_else(|| SourceError::Fatal(format!("no partition {part}").into()))?;
        Ok(self.parts.remove(idx).1)
    }
}

/// An emitter which collects all snapshots into a shared `Vec`.
///
/// Clones share the same storage, keep a clone to inspect the snapshots after the emitter
/// was moved into a loop.
#[derive(Debug, Clone, Default)]
pub struct VecEmitter {
    inner: Arc<Mutex<Vec<Snapshot>>>,
}

impl VecEmitter {
    /// Create an emitter collecting into an empty `Vec`
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a snapshot into this emitter
    pub fn give(&self, snapshot: Snapshot) {
        lock(&self.inner).push(snapshot)
    }

    /// Take the given range out of this emitter
    pub fn drain_vec<R: RangeBounds<usize>>(&self, range: R) -> Vec<Snapshot> {
        lock(&self.inner).drain(range).collect()
    }

    /// Number of collected snapshots
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    /// True if nothing was collected
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}

impl IntoIterator for VecEmitter {
    type Item = Snapshot;

    type IntoIter = std::vec::IntoIter<Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.drain_vec(..).into_iter()
    }
}

impl Emitter for VecEmitter {
    fn emit(&mut self, snapshot: &Snapshot, _sink: &SinkId) -> Result<(), EmitError> {
        self.give(snapshot.clone());
        Ok(())
    }
}

/// A sentiment model returning preset polarities for known texts and `0.0` for anything else
#[derive(Debug, Clone, Default)]
pub struct FixedModel {
    polarities: HashMap<String, f64>,
}

impl FixedModel {
    /// Create a model from `(text, polarity)` pairs
    pub fn new<I, S>(polarities: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            polarities: polarities
                .into_iter()
                .map(|(text, p)| (text.into(), p))
                .collect(),
        }
    }
}

impl SentimentModel for FixedModel {
    fn polarity(&self, text: &str) -> f64 {
        self.polarities.get(text).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_hands_out_partitions_once() {
        let mut source = ScriptedSource::new()
            .with_partition(0, vec![Step::Empty])
            .with_partition(3, vec![]);
        assert_eq!(source.list_parts().unwrap(), vec![0, 3]);
        assert!(source.build_part(3).is_ok());
        assert!(source.build_part(3).is_err());
    }

    #[test]
    fn start_at_offset() {
        let mut part = ScriptedPartition::new(vec![Step::records(["x"])]);
        let pos = part.open(StartPolicy::At(40)).unwrap();
        let batch = part.poll(&pos, 10).unwrap();
        assert_eq!(batch.records[0].offset, Some(40));
        assert_eq!(batch.next_position, CursorPosition::Offset(41));
    }

    #[test]
    fn vec_emitter_shares_storage() {
        let collected = VecEmitter::new();
        let mut emitter = collected.clone();
        let mut acc = crate::window::WindowAccumulator::builder()
            .model(FixedModel::default())
            .build();
        emitter
            .emit(&acc.drain_snapshot(), &SinkId::default())
            .unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected.drain_vec(..).len(), 1);
        assert!(collected.is_empty());
    }
}
