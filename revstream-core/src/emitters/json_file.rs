use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{EmitError, Emitter, SinkId};
use crate::{errorhandling::Classify, types::Snapshot};

/// Writes every snapshot as a pretty-printed JSON artifact into a directory.
///
/// Files are named `<sink>_<partition>_<window>.json`, e.g.
/// `dashboard_snapshot_p0_000042.json`. Files are written to a temporary name first and renamed
/// afterwards, so readers never observe half written snapshots.
pub struct JsonFileEmitter {
    dir: PathBuf,
}

impl JsonFileEmitter {
    /// Create an emitter writing into `dir`. The directory is created on first emit.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the given snapshot is written to
    pub fn path_for(&self, snapshot: &Snapshot, sink: &SinkId) -> PathBuf {
        let partition = snapshot
            .partition
            .map(|p| format!("p{p}"))
            .unwrap_or_else(|| "all".to_owned());
        self.dir
            .join(format!("{sink}_{partition}_{:06}.json", snapshot.window))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    }
}

impl Emitter for JsonFileEmitter {
    fn emit(&mut self, snapshot: &Snapshot, sink: &SinkId) -> Result<(), EmitError> {
        let bytes = serde_json::to_vec_pretty(snapshot).emit_failed()?;
        fs::create_dir_all(&self.dir).emit_transient()?;
        let path = self.path_for(snapshot, sink);
        Self::write_atomic(&path, &bytes).emit_transient()?;
        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::FixedModel, types::Record, window::WindowAccumulator};

    #[test]
    fn writes_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = JsonFileEmitter::new(dir.path().join("out"));
        let mut acc = WindowAccumulator::builder()
            .model(FixedModel::default())
            .partition(1)
            .build();
        acc.absorb(&Record::new("fine fine"));
        let snap = acc.drain_snapshot();
        let sink = SinkId::new("reviews");

        emitter.emit(&snap, &sink).unwrap();

        let path = dir.path().join("out").join("reviews_p1_000000.json");
        assert_eq!(emitter.path_for(&snap, &sink), path);
        let read: Snapshot = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(read, snap);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn unpartitioned_file_name() {
        let emitter = JsonFileEmitter::new("/tmp");
        let mut acc = WindowAccumulator::builder()
            .model(FixedModel::default())
            .build();
        let _ = acc.drain_snapshot();
        let snap = acc.drain_snapshot();
        assert_eq!(
            emitter.path_for(&snap, &SinkId::default()),
            PathBuf::from("/tmp/dashboard_snapshot_all_000001.json")
        );
    }
}
