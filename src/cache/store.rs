//! Per-class document tables.
//!
//! One `DashMap` per object class, keyed by uuid. The synchronizer is the
//! sole writer; any number of readers see atomic per-key visibility and
//! take no explicit lock.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::Value;

use crate::object::ObjectClass;

/// The document cache: one table per mirrored class.
pub struct CacheStore {
    tables: [DashMap<String, Value>; ObjectClass::ALL.len()],
}

impl CacheStore {
    /// An empty store with a table for every class.
    pub fn new() -> Self {
        Self {
            tables: Default::default(),
        }
    }

    fn table(&self, class: ObjectClass) -> &DashMap<String, Value> {
        &self.tables[class.index()]
    }

    /// Insert or overwrite a document. Last write wins.
    pub fn upsert(&self, class: ObjectClass, uuid: &str, document: Value) {
        self.table(class).insert(uuid.to_string(), document);
    }

    /// Remove a document. Removing an absent key is a no-op.
    pub fn remove(&self, class: ObjectClass, uuid: &str) -> bool {
        self.table(class).remove(uuid).is_some()
    }

    /// Replace a class's entire contents with the given documents.
    ///
    /// Anything cached before that is absent from `documents` is gone
    /// afterward; used by cold-start enumeration.
    pub fn replace_all(&self, class: ObjectClass, documents: HashMap<String, Value>) {
        let table = self.table(class);
        table.clear();
        for (uuid, document) in documents {
            table.insert(uuid, document);
        }
    }

    /// Read one document by uuid.
    pub fn get(&self, class: ObjectClass, uuid: &str) -> Option<Value> {
        self.table(class).get(uuid).map(|entry| entry.value().clone())
    }

    /// Snapshot all documents of a class.
    pub fn all(&self, class: ObjectClass) -> Vec<Value> {
        self.table(class)
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Whether a document is cached.
    pub fn contains(&self, class: ObjectClass, uuid: &str) -> bool {
        self.table(class).contains_key(uuid)
    }

    /// Number of cached documents for a class.
    pub fn len(&self, class: ObjectClass) -> usize {
        self.table(class).len()
    }

    /// Whether a class's table is empty.
    pub fn is_empty(&self, class: ObjectClass) -> bool {
        self.table(class).is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
