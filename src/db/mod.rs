// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Persistent keyed document collections
//!
//! The engine only talks to the [`Store`] trait. Backends hold JSON
//! documents keyed by their string `id` and support upsert, exact lookup,
//! and an equality-filtered ascending scan with offset/limit.

mod memory;
mod sqlite;
mod url;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use url::ConnectionUrl;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{AppErrors, ErrorCode, StoreError};

/// A stored record
pub type Document = Map<String, Value>;

/// Key field of every document
pub const KEY_FIELD: &str = "id";

/// Document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    SensorTypes,
    Sensors,
    Readings,
    Envelopes,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::SensorTypes,
        Collection::Sensors,
        Collection::Readings,
        Collection::Envelopes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::SensorTypes => "sensor_types",
            Collection::Sensors => "sensors",
            Collection::Readings => "readings",
            Collection::Envelopes => "envelopes",
        }
    }
}

/// Equality filter plus pagination window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanQuery {
    /// Every field must equal the document's field exactly
    pub filter: Document,
    pub offset: usize,
    pub limit: usize,
}

impl ScanQuery {
    pub fn new(filter: Document, offset: usize, limit: usize) -> Self {
        Self {
            filter,
            offset,
            limit,
        }
    }

    /// Key named by the filter, if any
    pub fn key(&self) -> Option<&str> {
        self.filter.get(KEY_FIELD).and_then(Value::as_str)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filter
            .iter()
            .all(|(field, wanted)| doc.get(field).map_or(false, |v| values_equal(v, wanted)))
    }
}

/// JSON equality with numbers compared by value, so `10` matches `10.0`
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Storage backend
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Replace the document sharing `doc`'s key, or insert it
    async fn upsert(&self, collection: Collection, doc: Document) -> Result<(), StoreError>;

    /// Exact key lookup
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Document>, StoreError>;

    /// Documents matching `query.filter`, ascending by key, windowed
    async fn scan_page(
        &self,
        collection: Collection,
        query: &ScanQuery,
    ) -> Result<Vec<Document>, StoreError>;

    /// Empty every collection
    async fn clear(&self) -> Result<(), StoreError>;

    /// Release the connection
    async fn close(&self) -> Result<(), StoreError>;

    /// Like [`Store::scan_page`], but a keyed filter bypasses pagination and
    /// returns the single match or nothing.
    async fn scan(
        &self,
        collection: Collection,
        query: &ScanQuery,
    ) -> Result<Vec<Document>, StoreError> {
        if let Some(key) = query.key() {
            let found = self.get(collection, key).await?;
            return Ok(found.into_iter().filter(|doc| query.matches(doc)).collect());
        }
        self.scan_page(collection, query).await
    }
}

/// Open the backend named by `url`
pub async fn connect(
    url: &ConnectionUrl,
    config: &DatabaseConfig,
) -> Result<Arc<dyn Store>, AppErrors> {
    let store: Arc<dyn Store> = match url.scheme.as_str() {
        "sqlite" => {
            let path = config.data_dir.join(format!("{}.db", url.database));
            Arc::new(SqliteStore::open(&path, config.busy_timeout_ms)?)
        }
        "memory" => Arc::new(MemoryStore::new()),
        other => {
            return Err(AppErrors::single(
                ErrorCode::BadUrl,
                format!("unsupported scheme '{}' in '{}'", other, url),
            ))
        }
    };
    info!("Connected to {} store for {}", store.backend(), url);
    Ok(store)
}

pub(crate) fn document_key(collection: Collection, doc: &Document) -> Result<String, StoreError> {
    doc.get(KEY_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(StoreError::MissingKey {
            collection: collection.name(),
        })
}

/// Serialize a record into a document
pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Json(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            other
        )))),
    }
}

/// Deserialize a stored document
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_matches_is_conjunction() {
        let query = ScanQuery::new(doc(json!({ "unit": "C", "quantity": "temperature" })), 0, 5);
        assert!(query.matches(&doc(json!({ "id": "a", "unit": "C", "quantity": "temperature" }))));
        assert!(!query.matches(&doc(json!({ "id": "b", "unit": "C", "quantity": "pressure" }))));
        assert!(!query.matches(&doc(json!({ "id": "c", "unit": "C" }))));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(values_equal(&json!(10), &json!(10.0)));
        assert!(!values_equal(&json!(10), &json!("10")));
        assert!(values_equal(&json!({ "min": 0, "max": 1.5 }), &json!({ "max": 1.5, "min": 0.0 })));
    }

    #[test]
    fn test_key() {
        assert_eq!(ScanQuery::new(doc(json!({ "id": "S1" })), 0, 1).key(), Some("S1"));
        assert_eq!(ScanQuery::default().key(), None);
    }

    #[test]
    fn test_document_round_trip() {
        let envelope = crate::model::EnvelopeRecord {
            id: "S1".into(),
            envelope: crate::model::Envelope::starting_at(5),
        };
        let stored = to_document(&envelope).unwrap();
        assert_eq!(document_key(Collection::Envelopes, &stored).unwrap(), "S1");
        let back: crate::model::EnvelopeRecord = from_document(stored).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_document_requires_string_key() {
        let err = document_key(Collection::Sensors, &doc(json!({ "id": 3 }))).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { collection: "sensors" }));
    }
}
