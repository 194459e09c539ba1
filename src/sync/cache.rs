use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::sync::error::SyncResult;

/// Cached state of a thing instance.
///
/// Identified by the owning thing definition's name plus a caller-supplied
/// key (a URL, an external id). Field values are dynamic JSON; the schema
/// graph describes their shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingRecord {
    /// Name of the thing definition this record instantiates
    pub thing: String,
    /// Caller-supplied identity key
    pub key: String,
    /// Stable record identity
    pub id: Uuid,
    /// Field values, keyed by field name
    pub fields: HashMap<String, JsonValue>,
    /// Bumped on every applied patch
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl ThingRecord {
    pub fn new(thing: &str, key: &str) -> Self {
        Self {
            thing: thing.to_string(),
            key: key.to_string(),
            id: Uuid::new_v4(),
            fields: HashMap::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Builder method setting initial field values
    pub fn with_fields(mut self, fields: HashMap<String, JsonValue>) -> Self {
        self.fields = fields;
        self
    }

    /// Applies a field patch in place, bumping version and timestamp
    pub fn apply(&mut self, patch: &HashMap<String, JsonValue>) {
        for (field, value) in patch {
            self.fields.insert(field.clone(), value.clone());
        }
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Keyed get/merge/put boundary over thing records.
///
/// The storage engine behind it is external. Implementations must make
/// `merge` atomic with respect to readers: a concurrent `get` observes the
/// record before or after the whole patch, never a field-by-field mix.
pub trait LocalCache: Send + Sync {
    /// Record for the given thing and key, if cached
    fn get(&self, thing: &str, key: &str) -> SyncResult<Option<ThingRecord>>;

    /// Replaces (or inserts) a whole record atomically
    fn put(&self, record: ThingRecord) -> SyncResult<()>;

    /// Applies a field patch atomically, creating the record when absent.
    ///
    /// Returns the post-merge record.
    fn merge(
        &self,
        thing: &str,
        key: &str,
        patch: &HashMap<String, JsonValue>,
    ) -> SyncResult<ThingRecord>;

    /// Removes a record, returning whether it was present
    fn remove(&self, thing: &str, key: &str) -> SyncResult<bool>;

    /// Number of cached records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory cache used by tests and headless tooling.
///
/// A single map lock makes every merge and put linearizable per record.
#[derive(Default)]
pub struct MemoryCache {
    records: RwLock<HashMap<(String, String), ThingRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, thing: &str, key: &str) -> SyncResult<Option<ThingRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.get(&(thing.to_string(), key.to_string())).cloned())
    }

    fn put(&self, record: ThingRecord) -> SyncResult<()> {
        let mut records = self.records.write().unwrap();
        records.insert((record.thing.clone(), record.key.clone()), record);
        Ok(())
    }

    fn merge(
        &self,
        thing: &str,
        key: &str,
        patch: &HashMap<String, JsonValue>,
    ) -> SyncResult<ThingRecord> {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry((thing.to_string(), key.to_string()))
            .or_insert_with(|| ThingRecord::new(thing, key));
        record.apply(patch);
        Ok(record.clone())
    }

    fn remove(&self, thing: &str, key: &str) -> SyncResult<bool> {
        let mut records = self.records.write().unwrap();
        Ok(records
            .remove(&(thing.to_string(), key.to_string()))
            .is_some())
    }

    fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }
}
