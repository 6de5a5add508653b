use itertools::Itertools;

use super::{EmitError, Emitter, SinkId};
use crate::types::Snapshot;

/// Prints a one-line summary of every snapshot to stdout
pub struct StdOutEmitter;

impl StdOutEmitter {
    pub(crate) fn summary(snapshot: &Snapshot, sink: &SinkId) -> String {
        let top = snapshot
            .top_tokens
            .iter()
            .map(|t| format!("{}:{}", t.token, t.count))
            .join(", ");
        format!(
            "{{ sink: {sink}, partition: {:?}, window: {}, reviews: {}, skipped: {}, avg sentiment: {:.2}, positive: {}, neutral: {}, negative: {}, top: [{top}] }}",
            snapshot.partition,
            snapshot.window,
            snapshot.sample_size,
            snapshot.skipped,
            snapshot.mean_polarity,
            snapshot.sentiment.positive,
            snapshot.sentiment.neutral,
            snapshot.sentiment.negative,
        )
    }
}

impl Emitter for StdOutEmitter {
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError> {
        println!("{}", Self::summary(snapshot, sink));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::FixedModel, types::Record, window::WindowAccumulator};

    #[test]
    fn summary_lists_top_tokens() {
        let mut acc = WindowAccumulator::builder()
            .model(FixedModel::new([("good good bad", 0.25)]))
            .partition(3)
            .build();
        acc.absorb(&Record::new("good good bad"));
        let snap = acc.drain_snapshot();
        let line = StdOutEmitter::summary(&snap, &SinkId::new("live"));
        assert!(line.contains("sink: live"));
        assert!(line.contains("partition: Some(3)"));
        assert!(line.contains("avg sentiment: 0.25"));
        assert!(line.contains("top: [good:2, bad:1]"));
        assert!(StdOutEmitter.emit(&snap, &SinkId::default()).is_ok());
    }
}
