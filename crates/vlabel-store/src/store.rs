//! Filesystem checkpoint store.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use vlabel_models::{CheckpointRecord, WorkUnitKey, WorkUnitKind};

use crate::error::{StoreError, StoreResult};

/// Content-addressed checkpoint store.
///
/// One JSON file per work-unit key, flat under the cache root; derived media
/// files live under `videos/` in the same tree, mirroring the dataset layout.
/// Records are write-once: `put` publishes atomically and refuses to clobber,
/// so concurrent writers for the same key resolve to exactly one persisted
/// record and concurrent writers for different keys never contend.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for a key.
    pub fn record_path(&self, key: &WorkUnitKey) -> PathBuf {
        self.root.join(format!("{}.json", key.storage_stem()))
    }

    /// Path of the derived media file for a key.
    pub fn media_path(&self, key: &WorkUnitKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Whether a record exists for the key.
    pub fn exists(&self, key: &WorkUnitKey) -> bool {
        self.record_path(key).exists()
    }

    /// Read the record for a key. Absent records are `None`; an unreadable
    /// record is a corruption error, not a miss.
    pub fn get(&self, key: &WorkUnitKey) -> StoreResult<Option<CheckpointRecord>> {
        let path = self.record_path(key);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record =
            serde_json::from_str(&data).map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(record))
    }

    /// Persist a record, write-once.
    ///
    /// The record is serialized to a temp file in the store root and
    /// published with a no-clobber rename, so readers never observe a partial
    /// record and the first writer wins any same-key race.
    pub fn put(&self, key: &WorkUnitKey, record: &CheckpointRecord) -> StoreResult<()> {
        let path = self.record_path(key);
        if path.exists() {
            return Err(StoreError::AlreadyExists(path));
        }

        let tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&tmp, record)
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(key = %key, "Checkpoint record written");
                Ok(())
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(path))
            }
            Err(e) => Err(e.error.into()),
        }
    }

    /// Rewrite non-identity fields of an existing record in place.
    ///
    /// The mutation closure may touch denormalized fields (series name,
    /// release date, file name); status and payload are restored afterwards
    /// so a backfill can never turn into a new completion.
    pub fn backfill<F>(&self, key: &WorkUnitKey, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut CheckpointRecord),
    {
        let path = self.record_path(key);
        let data = std::fs::read_to_string(&path)?;
        let mut record: CheckpointRecord = serde_json::from_str(&data)
            .map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let status = record.status;
        let query = record.query.clone();
        mutate(&mut record);
        record.status = status;
        record.query = query;

        let tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&tmp, &record)
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Enumerate all records of one kind, in deterministic key order.
    ///
    /// Corrupt entries are skipped with a warning so one bad file cannot
    /// block manifest publication for the rest of the level.
    pub fn list(&self, kind: WorkUnitKind) -> StoreResult<Vec<CheckpointRecord>> {
        let prefix = format!("{}_", kind.prefix());
        let mut entries: Vec<(PathBuf, String)> = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".json") {
                entries.push((entry.path(), name));
            }
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));

        let mut records = Vec::with_capacity(entries.len());
        for (path, _) in entries {
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<CheckpointRecord>(&data) {
                Ok(record) if record.kind() == kind => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt record");
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlabel_models::{CheckpointStatus, QueryPayload};

    fn record_for(key: &WorkUnitKey) -> CheckpointRecord {
        CheckpointRecord {
            series_name: key.series.clone(),
            episode_id: key.episode.clone(),
            segment_index: key.index,
            release_date: None,
            file_name: key.file_name(),
            status: CheckpointStatus::Ok,
            query: QueryPayload::default(),
            segments: None,
            episode_order: None,
            release_dates: None,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let key = WorkUnitKey::segment("High Card", "1", 0);

        assert!(!store.exists(&key));
        store.put(&key, &record_for(&key)).unwrap();
        assert!(store.exists(&key));

        let loaded = store.get(&key).unwrap().unwrap();
        assert_eq!(loaded.key(), key);
        assert_eq!(loaded.status, CheckpointStatus::Ok);
    }

    #[test]
    fn second_put_for_same_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let key = WorkUnitKey::episode("High Card", "1");

        store.put(&key, &record_for(&key)).unwrap();
        let err = store.put(&key, &record_for(&key)).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn concurrent_same_key_puts_persist_exactly_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let key = WorkUnitKey::segment("Race", "1", 0);

        let wins: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    let key = key.clone();
                    scope.spawn(move || store.put(&key, &record_for(&key)).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).filter(|&ok| ok).count()
        });

        assert_eq!(wins, 1, "exactly one writer must win");
        assert!(store.get(&key).unwrap().is_some());
    }

    #[test]
    fn corrupt_record_is_a_hard_error_not_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let key = WorkUnitKey::series("Broken");

        std::fs::write(store.record_path(&key), "{not json").unwrap();
        let err = store.get(&key).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn backfill_rewrites_fields_but_preserves_status_and_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let key = WorkUnitKey::episode("High Card", "2");

        let mut original = record_for(&key);
        original.status = CheckpointStatus::Blocked;
        original.file_name = String::new();
        store.put(&key, &original).unwrap();

        store
            .backfill(&key, |rec| {
                rec.ensure_file_name();
                // A buggy caller flipping status must not stick.
                rec.status = CheckpointStatus::Ok;
            })
            .unwrap();

        let loaded = store.get(&key).unwrap().unwrap();
        assert_eq!(loaded.file_name, key.file_name());
        assert_eq!(loaded.status, CheckpointStatus::Blocked);
    }

    #[test]
    fn list_filters_by_kind_and_skips_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();

        for idx in 0..3 {
            let key = WorkUnitKey::segment("S", "1", idx);
            store.put(&key, &record_for(&key)).unwrap();
        }
        let ep = WorkUnitKey::episode("S", "1");
        store.put(&ep, &record_for(&ep)).unwrap();
        std::fs::write(dir.path().join("segment_broken.json"), "oops").unwrap();

        let segments = store.list(WorkUnitKind::Segment).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|r| r.kind() == WorkUnitKind::Segment));

        let episodes = store.list(WorkUnitKind::Episode).unwrap();
        assert_eq!(episodes.len(), 1);
    }

    #[test]
    fn media_path_lives_under_the_videos_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let key = WorkUnitKey::segment("High Card", "1", 4);
        assert_eq!(
            store.media_path(&key),
            dir.path().join("videos/High_Card/segment_High_Card_1_seg4.mp4")
        );
    }
}
