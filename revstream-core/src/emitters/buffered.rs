use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use backon::BlockingRetryable;
use tracing::{error, warn};

use super::{EmitError, Emitter, SinkId};
use crate::{sources::RetryPolicy, types::Snapshot};

/// Emits snapshots on a dedicated thread so the aggregation loop does not wait for slow sinks.
///
/// Snapshots pass through a bounded FIFO channel, they are delivered in the order they were
/// emitted. When the channel is full `emit` blocks until the worker caught up, which bounds
/// memory use. The worker retries transient failures of the inner emitter according to its
/// [RetryPolicy]. Snapshots it still can not deliver are logged and reported through
/// [Emitter::undelivered].
pub struct BufferedEmitter {
    tx: Option<flume::Sender<(Snapshot, SinkId)>>,
    worker: Option<JoinHandle<()>>,
    failures: Arc<AtomicU64>,
}

impl BufferedEmitter {
    /// Spawn a worker thread delivering to `inner` with room for `capacity` pending snapshots
    pub fn new<E: Emitter>(mut inner: E, capacity: usize, retry: RetryPolicy) -> Self {
        let (tx, rx) = flume::bounded::<(Snapshot, SinkId)>(capacity.max(1));
        let failures = Arc::new(AtomicU64::new(0));
        let worker_failures = Arc::clone(&failures);
        let worker = std::thread::spawn(move || {
            for (snapshot, sink) in rx.iter() {
                let delivered = (|| inner.emit(&snapshot, &sink))
                    .retry(retry.backoff())
                    .sleep(std::thread::sleep)
                    .when(EmitError::is_transient)
                    .notify(|e, after| {
                        warn!(
                            "Delivering window {} failed, retrying in {after:?}: {e}",
                            snapshot.window
                        )
                    })
                    .call();
                if let Err(e) = delivered {
                    error!("Failed to emit window {} to {sink}: {e}", snapshot.window);
                    worker_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            inner.suspend();
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
            failures,
        }
    }

    fn shutdown(&mut self) {
        // closing the channel ends the worker loop after the backlog is delivered
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Buffered emitter worker panicked");
            }
        }
    }
}

impl Emitter for BufferedEmitter {
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError> {
        let tx = self.tx.as_ref().ok_or(EmitError::Closed)?;
        tx.send((snapshot.clone(), sink.clone()))
            .map_err(|_| EmitError::Closed)
    }

    fn suspend(&mut self) {
        self.shutdown();
    }

    fn undelivered(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Drop for BufferedEmitter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
