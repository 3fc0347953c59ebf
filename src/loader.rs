// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Batch loading of JSON record files

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::core::{Engine, EntityKind};

/// Outcome of loading one or more files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records added
    pub loaded: usize,
    /// One line per failed validation or integrity check
    pub failures: Vec<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.loaded += other.loaded;
        self.failures.extend(other.failures);
    }
}

/// Add every record in `records`, labelling failures with `source` and the
/// 1-based record number. Bad records do not stop the load.
pub async fn load_values(
    engine: &Engine,
    kind: EntityKind,
    source: &str,
    records: &[Value],
) -> LoadReport {
    let mut report = LoadReport::default();
    for (i, record) in records.iter().enumerate() {
        match engine.add(kind, record).await {
            Ok(()) => report.loaded += 1,
            Err(errors) => {
                for err in errors {
                    report
                        .failures
                        .push(format!("{}: record: {}: {}", source, i + 1, err));
                }
            }
        }
    }
    report
}

/// Load a file holding a JSON array of `kind` records
pub async fn load_records(engine: &Engine, kind: EntityKind, path: &Path) -> Result<LoadReport> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {:?}", path))?;
    let data: Value =
        serde_json::from_str(&content).with_context(|| format!("parsing {:?}", path))?;
    let Value::Array(records) = data else {
        bail!("{:?} does not hold a JSON array of records", path);
    };

    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let report = load_values(engine, kind, &source, &records).await;

    if report.is_clean() {
        info!("Loaded {} {} records from {}", report.loaded, kind, source);
    } else {
        warn!(
            "Loaded {} {} records from {}, {} failures",
            report.loaded,
            kind,
            source,
            report.failures.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::with_store(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_failures_are_tagged_and_load_continues() {
        let engine = engine();
        let records = vec![
            json!({ "id": "T1", "manufacturer": "Acme", "modelNumber": "1",
                    "quantity": "q", "unit": "u", "limits": { "min": 0, "max": 1 } }),
            json!({ "id": "T2", "manufacturer": "Acme" }),
            json!({ "id": "T3", "manufacturer": "Acme", "modelNumber": "3",
                    "quantity": "q", "unit": "u", "limits": { "min": 0, "max": 1 } }),
        ];
        let report = load_values(&engine, EntityKind::SensorType, "types.json", &records).await;
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failures.len(), 4);
        assert!(report
            .failures
            .iter()
            .all(|f| f.starts_with("types.json: record: 2: MISSING: ")));

        let page = engine.find_sensor_types(&json!({})).await.unwrap();
        assert_eq!(page.data.len(), 2);
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = std::env::temp_dir().join(format!("sensorbarn-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sensors.json");
        std::fs::write(
            &path,
            r#"[{ "id": "S1", "model": "T9", "period": 10, "expected": { "min": 0, "max": 1 } }]"#,
        )
        .unwrap();

        let engine = engine();
        let report = load_records(&engine, EntityKind::Sensor, &path).await.unwrap();
        assert_eq!(report.loaded, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("sensors.json: record: 1: X_ID: "));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_non_array_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("sensorbarn-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, r#"{ "id": "S1" }"#).unwrap();

        let result = load_records(&engine(), EntityKind::Sensor, &path).await;
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
