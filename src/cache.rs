//! Process-lifetime cache of resolved schema documents.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Maps normalized schema identifiers to parsed schema documents.
///
/// Entries are never evicted; a schema lives for the lifetime of the
/// cache. Concurrent validation runs may share one cache: reads and
/// inserts are guarded, and re-resolving the same schema from two runs
/// at once merely wastes a fetch.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<Value>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a schema document by its normalized identifier.
    pub fn get(&self, id: &str) -> Option<Arc<Value>> {
        self.read().get(id).cloned()
    }

    /// Store a schema document under its normalized identifier,
    /// replacing any previous entry for the same identifier.
    pub fn put(&self, id: &str, document: Arc<Value>) {
        self.write().insert(id.to_string(), document);
    }

    /// Drop every cached document. Intended for test isolation.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic in another thread while holding the lock cannot leave the
    // map in a partial state (inserts are single operations), so a
    // poisoned lock is still safe to use.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Value>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Value>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
