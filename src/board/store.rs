use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

use super::models::PlacementRecord;
use crate::errors::StoreError;

/// Key the board placement is stored under.
pub const PLACEMENT_KEY: &str = "production-kanban-state";

/// Durable stage/order cache for the board.
///
/// `load` returns `Ok(None)` when nothing was saved yet and
/// `Err(StoreError::Corrupt)` when something was saved but cannot be read.
/// Callers treat both the same way.
pub trait PlacementStore: Send + Sync {
    fn load(&self) -> Result<Option<PlacementRecord>, StoreError>;

    fn save(&self, placement: &PlacementRecord) -> Result<(), StoreError>;
}

/// One JSON file per key inside a storage directory.
#[derive(Debug, Clone)]
pub struct FilePlacementStore {
    dir: PathBuf,
    key: String,
}

impl FilePlacementStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_key(dir, PLACEMENT_KEY)
    }

    pub fn with_key(dir: impl Into<PathBuf>, key: &str) -> Self {
        Self {
            dir: dir.into(),
            key: key.to_string(),
        }
    }

    /// Path of the placement file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.key))
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl PlacementStore for FilePlacementStore {
    fn load(&self) -> Result<Option<PlacementRecord>, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(Self::io_err(&path))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: self.key.clone(),
                source,
            })
    }

    fn save(&self, placement: &PlacementRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(Self::io_err(&self.dir))?;
        let json = serde_json::to_string(placement).map_err(StoreError::Serialize)?;

        let lock_path = self.lock_path();
        let lock = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(Self::io_err(&lock_path))?;
        lock.lock_exclusive().map_err(Self::io_err(&lock_path))?;

        let path = self.path();
        let tmp_path = self.dir.join(format!("{}.json.tmp", self.key));
        let result = (|| {
            let mut tmp = fs::File::create(&tmp_path).map_err(Self::io_err(&tmp_path))?;
            tmp.write_all(json.as_bytes())
                .and_then(|_| tmp.sync_all())
                .map_err(Self::io_err(&tmp_path))?;
            fs::rename(&tmp_path, &path).map_err(Self::io_err(&path))
        })();

        // Dropping the handle releases the lock as well.
        let _ = FileExt::unlock(&lock);
        result
    }
}

/// Process-local store, used by tests and by callers without a data dir.
///
/// Holds the raw serialized form so that unreadable content can be
/// represented.
#[derive(Debug, Default)]
pub struct MemoryPlacementStore {
    raw: Mutex<Option<String>>,
}

impl MemoryPlacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub fn with_placement(placement: &PlacementRecord) -> Result<Self, StoreError> {
        let raw = serde_json::to_string(placement).map_err(StoreError::Serialize)?;
        Ok(Self::with_raw(raw))
    }

    /// The raw stored payload, if any.
    pub fn raw(&self) -> Result<Option<String>, StoreError> {
        self.raw
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::LockPoisoned)
    }
}

impl PlacementStore for MemoryPlacementStore {
    fn load(&self) -> Result<Option<PlacementRecord>, StoreError> {
        let Some(raw) = self.raw()? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: PLACEMENT_KEY.to_string(),
                source,
            })
    }

    fn save(&self, placement: &PlacementRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(placement).map_err(StoreError::Serialize)?;
        let mut guard = self.raw.lock().map_err(|_| StoreError::LockPoisoned)?;
        *guard = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::Stage;
    use tempfile::TempDir;

    fn sample() -> PlacementRecord {
        [
            (Stage::Orcamento, vec!["1".to_string()]),
            (Stage::Projeto, vec!["2".to_string(), "3".to_string()]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_file_store_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FilePlacementStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FilePlacementStore::new(dir.path().join("nested"));
        store.save(&sample()).unwrap();

        assert!(store.path().ends_with("production-kanban-state.json"));
        let loaded = store.load().unwrap().expect("placement should exist");
        assert_eq!(loaded, sample());

        // A second store over the same dir sees the same data.
        let reopened = FilePlacementStore::new(dir.path().join("nested"));
        assert_eq!(reopened.load().unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_store_overwrites_previous_placement() {
        let dir = TempDir::new().unwrap();
        let store = FilePlacementStore::new(dir.path());
        store.save(&sample()).unwrap();

        let replacement: PlacementRecord =
            [(Stage::Finalizado, vec!["9".to_string()])].into_iter().collect();
        store.save(&replacement).unwrap();

        assert_eq!(store.load().unwrap(), Some(replacement));
        assert!(!dir.path().join("production-kanban-state.json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let store = FilePlacementStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        match store.load() {
            Err(StoreError::Corrupt { key, .. }) => assert_eq!(key, PLACEMENT_KEY),
            other => panic!("Expected Corrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_file_store_written_format_is_flat_object() {
        let dir = TempDir::new().unwrap();
        let store = FilePlacementStore::new(dir.path());
        store.save(&sample()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["projeto"], serde_json::json!(["2", "3"]));
    }

    #[test]
    fn test_memory_store_roundtrip_and_corruption() {
        let store = MemoryPlacementStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));

        let broken = MemoryPlacementStore::with_raw("[]");
        assert!(matches!(broken.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_partial_record_loads_missing_stages_empty() {
        let store = MemoryPlacementStore::with_raw(r#"{"corte":["1","2"]}"#);
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.ids(Stage::Corte), ["1".to_string(), "2".to_string()]);
        assert!(loaded.ids(Stage::Orcamento).is_empty());
    }

    #[test]
    fn test_malformed_payloads_are_corrupt() {
        for raw in ["not json", r#"{"corte":"1"}"#, r#"{"pintura":["1"]}"#] {
            let store = MemoryPlacementStore::with_raw(raw);
            assert!(
                matches!(store.load(), Err(StoreError::Corrupt { .. })),
                "{} should be rejected",
                raw
            );
        }
    }
}
