use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use readmevec_core::BatchRecord;

use crate::error::{EmbedError, EmbedResult};

/// Persisted `batchId -> BatchRecord` map used for crash recovery across the
/// Batch Embed Driver's submit/poll/download cycle. Every mutation rewrites
/// the whole file — state is small (thousands of entries at most) and this
/// keeps the store trivially crash-consistent: there is never a partial
/// write visible to a reader, since `persist` writes to a temp file and
/// renames it into place.
pub struct BatchStateStore {
    path: PathBuf,
    records: Mutex<HashMap<String, BatchRecord>>,
}

impl BatchStateStore {
    /// Loads the store from `path`, treating a missing file as empty state.
    pub fn load(path: impl Into<PathBuf>) -> EmbedResult<Self> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| EmbedError::BatchState(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(EmbedError::BatchState(e.to_string())),
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Inserts or overwrites one batch's record and persists immediately.
    pub fn put(&self, record: BatchRecord) -> EmbedResult<()> {
        let mut records = self.records.lock();
        records.insert(record.batch_id.clone(), record);
        persist(&self.path, &records)
    }

    /// Removes one batch's record, if present, and persists immediately.
    pub fn remove(&self, batch_id: &str) -> EmbedResult<()> {
        let mut records = self.records.lock();
        records.remove(batch_id);
        persist(&self.path, &records)
    }

    /// Returns a snapshot of every currently tracked batch.
    #[must_use]
    pub fn all(&self) -> Vec<BatchRecord> {
        self.records.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

fn persist(path: &Path, records: &HashMap<String, BatchRecord>) -> EmbedResult<()> {
    let bytes = serde_json::to_vec_pretty(records).map_err(|e| EmbedError::BatchState(e.to_string()))?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, bytes).map_err(|e| EmbedError::BatchState(e.to_string()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| EmbedError::BatchState(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use readmevec_core::BatchItemMeta;
    use uuid::Uuid;

    fn record(batch_id: &str, n: usize) -> BatchRecord {
        BatchRecord::new(
            batch_id,
            (0..n)
                .map(|i| BatchItemMeta {
                    id: Uuid::new_v4(),
                    repo: format!("repo/{i}"),
                    content_hash: format!("hash{i}"),
                })
                .collect(),
        )
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStateStore::load(dir.path().join("batch-state.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn put_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch-state.json");
        let store = BatchStateStore::load(&path).unwrap();
        store.put(record("b1", 10)).unwrap();

        let reloaded = BatchStateStore::load(&path).unwrap();
        assert_eq!(reloaded.all().len(), 1);
        assert_eq!(reloaded.all()[0].batch_id, "b1");
    }

    #[test]
    fn remove_deletes_the_entry_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch-state.json");
        let store = BatchStateStore::load(&path).unwrap();
        store.put(record("b1", 10)).unwrap();
        store.remove("b1").unwrap();

        let reloaded = BatchStateStore::load(&path).unwrap();
        assert!(reloaded.is_empty());
    }
}
