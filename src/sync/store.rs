use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use log::debug;
use serde_json::Value as JsonValue;

use crate::sync::cache::{LocalCache, ThingRecord};
use crate::sync::error::{SyncError, SyncResult};

const RECORD_PREFIX: &str = "record:";

/// Durable local cache backed by sled.
///
/// Records are JSON-serialized under `record:{thing}:{key}` keys and
/// flushed on every write. A write lock serializes merges so read-modify-
/// write cycles are atomic with respect to readers.
pub struct SledCache {
    db: sled::Db,
    write_lock: Mutex<()>,
}

impl SledCache {
    /// Opens (or creates) a cache at the given path
    pub fn open(path: &Path) -> SyncResult<Self> {
        let db = sled::open(path)
            .map_err(|e| SyncError::Cache(format!("Failed to open cache: {}", e)))?;
        debug!("Opened sled cache at {}", path.display());
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn record_key(thing: &str, key: &str) -> String {
        format!("{}{}:{}", RECORD_PREFIX, thing, key)
    }

    fn read(&self, record_key: &str) -> SyncResult<Option<ThingRecord>> {
        match self.db.get(record_key.as_bytes()) {
            Ok(Some(bytes)) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    SyncError::Cache(format!("Failed to deserialize record: {}", e))
                })?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(SyncError::Cache(format!("Failed to read record: {}", e))),
        }
    }

    fn write(&self, record_key: &str, record: &ThingRecord) -> SyncResult<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| SyncError::Cache(format!("Failed to serialize record: {}", e)))?;
        self.db
            .insert(record_key.as_bytes(), bytes)
            .map_err(|e| SyncError::Cache(format!("Failed to store record: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| SyncError::Cache(format!("Failed to flush cache: {}", e)))?;
        Ok(())
    }
}

impl LocalCache for SledCache {
    fn get(&self, thing: &str, key: &str) -> SyncResult<Option<ThingRecord>> {
        self.read(&Self::record_key(thing, key))
    }

    fn put(&self, record: ThingRecord) -> SyncResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        self.write(&Self::record_key(&record.thing, &record.key), &record)
    }

    fn merge(
        &self,
        thing: &str,
        key: &str,
        patch: &HashMap<String, JsonValue>,
    ) -> SyncResult<ThingRecord> {
        let _guard = self.write_lock.lock().unwrap();
        let record_key = Self::record_key(thing, key);
        let mut record = self
            .read(&record_key)?
            .unwrap_or_else(|| ThingRecord::new(thing, key));
        record.apply(patch);
        self.write(&record_key, &record)?;
        Ok(record)
    }

    fn remove(&self, thing: &str, key: &str) -> SyncResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let removed = self
            .db
            .remove(Self::record_key(thing, key).as_bytes())
            .map_err(|e| SyncError::Cache(format!("Failed to remove record: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| SyncError::Cache(format!("Failed to flush cache: {}", e)))?;
        Ok(removed.is_some())
    }

    fn len(&self) -> usize {
        self.db.scan_prefix(RECORD_PREFIX.as_bytes()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_records_survive_round_trip() {
        let dir = tempdir().unwrap();
        let cache = SledCache::open(&dir.path().join("cache")).unwrap();

        let mut patch = HashMap::new();
        patch.insert("title".to_string(), serde_json::json!("hello"));
        let merged = cache.merge("Bookmark", "https://example.com", &patch).unwrap();

        let read = cache.get("Bookmark", "https://example.com").unwrap().unwrap();
        assert_eq!(read, merged);
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("Bookmark", "https://example.com").unwrap());
        assert_eq!(cache.get("Bookmark", "https://example.com").unwrap(), None);
    }
}
