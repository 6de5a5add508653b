use tracing::error;

use super::{EmitError, Emitter, SinkId};
use crate::types::Snapshot;

/// Emits every snapshot to several emitters.
///
/// All emitters are tried even if one of them fails. The first error is returned, transient
/// errors are only reported if no emitter failed permanently so a retry does not duplicate
/// snapshots on healthy sinks more than necessary.
#[derive(Default)]
pub struct FanOutEmitter {
    emitters: Vec<Box<dyn Emitter>>,
}

impl FanOutEmitter {
    /// Create an emitter without targets
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target
    pub fn with(mut self, emitter: impl Emitter) -> Self {
        self.emitters.push(Box::new(emitter));
        self
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    /// True if there are no targets
    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}

impl Emitter for FanOutEmitter {
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError> {
        let mut first_err: Option<EmitError> = None;
        for emitter in self.emitters.iter_mut() {
            if let Err(e) = emitter.emit(snapshot, sink) {
                match &first_err {
                    None => first_err = Some(e),
                    Some(prev) if prev.is_transient() && !e.is_transient() => {
                        first_err = Some(e)
                    }
                    Some(_) => error!("Additional emitter failure: {e}"),
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn suspend(&mut self) {
        for emitter in self.emitters.iter_mut() {
            emitter.suspend();
        }
    }

    fn undelivered(&self) -> u64 {
        self.emitters.iter().map(|e| e.undelivered()).sum()
    }
}
