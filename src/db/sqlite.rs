// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! SQLite-backed store
//!
//! Each collection is a table of `(id TEXT PRIMARY KEY, doc TEXT)` rows where
//! `doc` is the JSON document. String and number filters are pushed into SQL
//! through `json_extract`; any other filter value is compared in Rust and the
//! window is applied after it.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{document_key, values_equal, Collection, Document, ScanQuery, Store};
use crate::error::StoreError;

/// SQLite [`Store`]; statements run on tokio's blocking pool
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open or create the database file at `path`
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let store = Self::with_connection(conn)?;
        info!("Database opened at {:?}", path);
        Ok(store)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        for collection in Collection::ALL {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    doc TEXT NOT NULL
                );",
                collection.name()
            ))?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Run `f` against the open connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }
}

/// JSON path of a top-level field
fn field_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

/// Strings and numbers compare the same way in SQL as in [`values_equal`].
/// Everything else (objects, arrays, booleans, null) is matched in Rust.
fn sql_comparable(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_))
}

/// A scan split into the part SQLite evaluates and the rest
#[derive(Debug)]
struct ScanPlan {
    sql: String,
    args: Vec<String>,
    /// Filter fields left for Rust; when non-empty the window is applied
    /// after them instead of in SQL
    residual: Document,
}

fn plan_scan(collection: Collection, query: &ScanQuery) -> ScanPlan {
    let mut sql = format!("SELECT doc FROM {}", collection.name());
    let mut args = Vec::new();
    let mut residual = Document::new();
    for (field, value) in &query.filter {
        if !sql_comparable(value) {
            residual.insert(field.clone(), value.clone());
            continue;
        }
        sql.push_str(if args.is_empty() { " WHERE " } else { " AND " });
        let n = args.len();
        sql.push_str(&format!(
            "json_extract(doc, ?{}) = json_extract(?{}, '$')",
            n + 1,
            n + 2
        ));
        args.push(field_path(field));
        args.push(value.to_string());
    }
    sql.push_str(" ORDER BY id");
    if residual.is_empty() {
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            query.limit.min(i64::MAX as usize),
            query.offset.min(i64::MAX as usize)
        ));
    }
    ScanPlan {
        sql,
        args,
        residual,
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let key = document_key(collection, &doc)?;
        let text = serde_json::to_string(&doc)?;
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, doc) VALUES (?1, ?2)",
                    collection.name()
                ),
                params![key, text],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Document>, StoreError> {
        let key = key.to_string();
        let text: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT doc FROM {} WHERE id = ?1", collection.name()),
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn scan_page(
        &self,
        collection: Collection,
        query: &ScanQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let ScanPlan {
            sql,
            args,
            residual,
        } = plan_scan(collection, query);
        let rows: Vec<String> = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(args.iter()), |row| row.get(0))?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await?;

        let docs = rows
            .iter()
            .map(|text| serde_json::from_str::<Document>(text).map_err(StoreError::from));
        if residual.is_empty() {
            return docs.collect();
        }

        let mut page = Vec::new();
        let mut skipped = 0;
        for doc in docs {
            let doc = doc?;
            let matched = residual
                .iter()
                .all(|(field, wanted)| doc.get(field).map_or(false, |v| values_equal(v, wanted)));
            if !matched {
                continue;
            }
            if skipped < query.offset {
                skipped += 1;
                continue;
            }
            if page.len() >= query.limit {
                break;
            }
            page.push(doc);
        }
        Ok(page)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for collection in Collection::ALL {
                tx.execute(&format!("DELETE FROM {}", collection.name()), [])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        info!("Cleared all collections");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            let taken = conn.lock().take();
            match taken {
                Some(conn) => conn.close().map(|()| true).map_err(|(_, e)| e),
                None => Ok(false),
            }
        })
        .await??;
        if closed {
            debug!("Database connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for (id, unit, min) in [("t3", "C", 0), ("t1", "C", 0), ("t2", "K", 0), ("t4", "C", 5)] {
            store
                .upsert(
                    Collection::SensorTypes,
                    doc(json!({ "id": id, "unit": unit, "limits": { "max": 100.0, "min": min } })),
                )
                .await
                .unwrap();
        }
        store
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d["id"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_get_and_replace() {
        let store = seeded().await;
        store
            .upsert(Collection::SensorTypes, doc(json!({ "id": "t1", "unit": "F" })))
            .await
            .unwrap();
        let found = store.get(Collection::SensorTypes, "t1").await.unwrap().unwrap();
        assert_eq!(found["unit"], "F");
        assert!(found.get("limits").is_none());
        assert!(store.get(Collection::SensorTypes, "zz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filtered_scan_in_sql() {
        let store = seeded().await;
        let query = ScanQuery::new(doc(json!({ "unit": "C" })), 0, 10);
        let page = store.scan(Collection::SensorTypes, &query).await.unwrap();
        assert_eq!(ids(&page), vec!["t1", "t3", "t4"]);

        let query = ScanQuery::new(doc(json!({ "unit": "C" })), 1, 1);
        let page = store.scan(Collection::SensorTypes, &query).await.unwrap();
        assert_eq!(ids(&page), vec!["t3"]);
    }

    #[tokio::test]
    async fn test_filter_on_nested_object() {
        let store = seeded().await;
        let query = ScanQuery::new(doc(json!({ "limits": { "min": 5, "max": 100.0 } })), 0, 10);
        let page = store.scan(Collection::SensorTypes, &query).await.unwrap();
        assert_eq!(ids(&page), vec!["t4"]);
    }

    #[tokio::test]
    async fn test_string_does_not_match_number() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert(Collection::Sensors, doc(json!({ "id": "s1", "period": 10 })))
            .await
            .unwrap();
        let query = ScanQuery::new(doc(json!({ "period": "10" })), 0, 10);
        assert!(store.scan(Collection::Sensors, &query).await.unwrap().is_empty());
        let query = ScanQuery::new(doc(json!({ "period": 10 })), 0, 10);
        assert_eq!(store.scan(Collection::Sensors, &query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_close() {
        let store = seeded().await;
        store.clear().await.unwrap();
        let query = ScanQuery::new(Document::new(), 0, 10);
        assert!(store.scan(Collection::SensorTypes, &query).await.unwrap().is_empty());

        store.close().await.unwrap();
        let err = store.get(Collection::SensorTypes, "t1").await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[tokio::test]
    async fn test_nested_filter_compares_numbers_by_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (id, min) in [("a", 0.0), ("b", 1.5), ("c", 0.0), ("d", 0.0)] {
            store
                .upsert(
                    Collection::SensorTypes,
                    doc(json!({ "id": id, "unit": "C", "limits": { "min": min, "max": 100.0 } })),
                )
                .await
                .unwrap();
        }

        let query = ScanQuery::new(doc(json!({ "limits": { "min": 0, "max": 100 } })), 0, 10);
        let page = store.scan(Collection::SensorTypes, &query).await.unwrap();
        assert_eq!(ids(&page), vec!["a", "c", "d"]);

        // window applies after the nested match
        let query = ScanQuery::new(
            doc(json!({ "unit": "C", "limits": { "min": 0, "max": 100 } })),
            1,
            1,
        );
        let page = store.scan(Collection::SensorTypes, &query).await.unwrap();
        assert_eq!(ids(&page), vec!["c"]);

        let query = ScanQuery::new(doc(json!({ "limits": { "min": 0 } })), 0, 10);
        assert!(store.scan(Collection::SensorTypes, &query).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_waiting_on_connection_keeps_runtime_free() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let conn = Arc::clone(&store.conn);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _guard = conn.lock();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(400));
        });
        locked_rx.recv().unwrap();

        let started = std::time::Instant::now();
        let lookup = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.get(Collection::Sensors, "s1").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(300));

        assert!(lookup.await.unwrap().unwrap().is_none());
        holder.join().unwrap();
    }

    #[test]
    fn test_scan_plan_sql() {
        let query = ScanQuery::new(doc(json!({ "a": 1, "b": "x" })), 5, 2);
        let plan = plan_scan(Collection::Sensors, &query);
        assert_eq!(
            plan.sql,
            "SELECT doc FROM sensors WHERE json_extract(doc, ?1) = json_extract(?2, '$') \
             AND json_extract(doc, ?3) = json_extract(?4, '$') ORDER BY id LIMIT 2 OFFSET 5"
        );
        assert_eq!(plan.args, vec!["$.\"a\"", "1", "$.\"b\"", "\"x\""]);
        assert!(plan.residual.is_empty());
    }

    #[test]
    fn test_scan_plan_keeps_objects_out_of_sql() {
        let query = ScanQuery::new(
            doc(json!({ "expected": { "min": 1, "max": 2 }, "model": "T1", "on": true })),
            5,
            2,
        );
        let plan = plan_scan(Collection::Sensors, &query);
        assert_eq!(
            plan.sql,
            "SELECT doc FROM sensors WHERE json_extract(doc, ?1) = json_extract(?2, '$') ORDER BY id"
        );
        assert_eq!(plan.args, vec!["$.\"model\"", "\"T1\""]);
        assert_eq!(plan.residual.len(), 2);
        assert!(plan.residual.contains_key("expected"));
    }
}
