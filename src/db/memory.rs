// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Process-local store over ordered maps

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{document_key, Collection, Document, ScanQuery, Store};
use crate::error::StoreError;

/// In-memory [`Store`]; contents vanish when dropped
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let key = document_key(collection, &doc)?;
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .insert(key, doc);
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|docs| docs.get(key).cloned()))
    }

    async fn scan_page(
        &self,
        collection: Collection,
        query: &ScanQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .values()
            .filter(|doc| query.matches(doc))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.collections.write().clear();
        debug!("Cleared memory store");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        debug!("Closed memory store");
        Ok(())
    }
}
