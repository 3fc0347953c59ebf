// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Paging arithmetic for index scans and backward time-series walks

use serde::Deserialize;
use serde_json::Value;

use crate::db::{Document, ScanQuery};
use crate::error::AppErrors;
use crate::model::{Page, StatusSet};
use crate::validate::{decode, Operation, Record};

/// Validated window of a sensor-type or sensor search
#[derive(Debug, Clone, Deserialize)]
struct Window {
    id: Option<String>,
    #[serde(rename = "_index")]
    index: i64,
    #[serde(rename = "_count")]
    count: i64,
}

/// An equality search over an id-ordered collection
#[derive(Debug, Clone)]
pub(crate) struct IndexSearch {
    window: Window,
    filter: Document,
    detail: bool,
}

impl IndexSearch {
    /// Build from validated search values; `_`-prefixed and null fields are
    /// not filters.
    pub fn from_values(op: Operation, values: Record) -> Result<Self, AppErrors> {
        let filter = values
            .iter()
            .filter(|(field, value)| !field.starts_with('_') && !value.is_null())
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        let detail = values
            .get("_doDetail")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let window = decode(op, values)?;
        Ok(Self {
            window,
            filter,
            detail,
        })
    }

    /// Id the search is scoped to
    pub fn id(&self) -> Option<&str> {
        self.window.id.as_deref()
    }

    pub fn detail(&self) -> bool {
        self.detail
    }

    pub fn query(&self) -> ScanQuery {
        ScanQuery::new(
            self.filter.clone(),
            self.window.index as usize,
            self.window.count as usize,
        )
    }

    pub fn page<T>(&self, data: Vec<T>) -> Page<T> {
        let keyed = self.id().is_some();
        Page {
            next_index: next_index(keyed, self.window.index, self.window.count, data.len()),
            previous_index: previous_index(keyed, self.window.index, self.window.count),
            data,
        }
    }
}

/// `_index` of the following page, -1 when there is none
pub fn next_index(keyed: bool, index: i64, count: i64, returned: usize) -> i64 {
    if keyed || (returned as i64) < count {
        -1
    } else {
        index + count
    }
}

/// `_index` of the preceding page, clamped at 0; -1 for keyed searches
pub fn previous_index(keyed: bool, index: i64, count: i64) -> i64 {
    if keyed {
        -1
    } else if index > count {
        index - count
    } else {
        0
    }
}

/// Validated sensor-data search
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataSearch {
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    pub timestamp: i64,
    #[serde(rename = "_count")]
    pub count: i64,
    pub statuses: StatusSet,
    #[serde(rename = "_doDetail")]
    pub detail: bool,
}

/// First timestamp of a backward walk: `latest` when asked past it,
/// otherwise the largest period-aligned value not above `requested`,
/// aligned relative to `latest`.
pub fn start_time(latest: i64, requested: i64, period: i64) -> i64 {
    if requested > latest {
        return latest;
    }
    let (latest, period) = (latest as i128, period as i128);
    let behind = latest - requested as i128;
    let steps = (behind + period - 1) / period;
    (latest - steps * period).max(i64::MIN as i128) as i64
}

/// Timestamps visited walking back from `start` to `earliest`
pub fn walk_back(start: i64, earliest: i64, period: i64) -> impl Iterator<Item = i64> {
    std::iter::successors(Some(start), move |t| t.checked_sub(period))
        .take_while(move |t| *t >= earliest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::validate::validate;
    use serde_json::json;

    #[test]
    fn test_next_index() {
        assert_eq!(next_index(false, 0, 5, 5), 5);
        assert_eq!(next_index(false, 10, 5, 5), 15);
        assert_eq!(next_index(false, 10, 5, 4), -1);
        assert_eq!(next_index(true, 0, 5, 5), -1);
    }

    #[test]
    fn test_previous_index() {
        assert_eq!(previous_index(false, 0, 5), 0);
        assert_eq!(previous_index(false, 3, 5), 0);
        assert_eq!(previous_index(false, 5, 5), 0);
        assert_eq!(previous_index(false, 12, 5), 7);
        assert_eq!(previous_index(true, 12, 5), -1);
    }

    #[test]
    fn test_start_time() {
        // past the end starts at latest
        assert_eq!(start_time(1010, 5000, 10), 1010);
        assert_eq!(start_time(1010, 1010, 10), 1010);
        // aligned and unaligned requests inside the envelope
        assert_eq!(start_time(1010, 1000, 10), 1000);
        assert_eq!(start_time(1010, 1009, 10), 1000);
        assert_eq!(start_time(1010, 1001, 10), 1000);
        assert_eq!(start_time(1010, 999, 10), 990);
        // clamps instead of overflowing
        assert_eq!(start_time(0, i64::MIN, 7), i64::MIN);
    }

    #[test]
    fn test_walk_back() {
        let steps: Vec<i64> = walk_back(1030, 1000, 10).collect();
        assert_eq!(steps, vec![1030, 1020, 1010, 1000]);
        assert_eq!(walk_back(990, 1000, 10).count(), 0);
        assert_eq!(walk_back(i64::MIN + 1, i64::MIN, 5).count(), 1);
    }

    #[test]
    fn test_index_search_filters() {
        let values = validate(
            Operation::FindSensors,
            &json!({ "model": "T1", "_index": "5", "_count": 2, "_doDetail": "true" }),
        )
        .unwrap();
        let search = IndexSearch::from_values(Operation::FindSensors, values).unwrap();
        assert!(search.detail());
        assert_eq!(search.id(), None);

        let query = search.query();
        assert_eq!(query.offset, 5);
        assert_eq!(query.limit, 2);
        assert_eq!(query.filter.len(), 1);
        assert_eq!(query.filter["model"], "T1");

        let page = search.page(vec![1, 2]);
        assert_eq!(page.next_index, 7);
        assert_eq!(page.previous_index, 3);
    }

    #[test]
    fn test_keyed_search_page() {
        let values = validate(Operation::FindSensorTypes, &json!({ "id": "T1" })).unwrap();
        let search = IndexSearch::from_values(Operation::FindSensorTypes, values).unwrap();
        assert_eq!(search.id(), Some("T1"));
        let page = search.page(vec!["T1"; 5]);
        assert_eq!(page.next_index, -1);
        assert_eq!(page.previous_index, -1);
    }

    #[test]
    fn test_data_search_decodes() {
        let values = validate(
            Operation::FindSensorData,
            &json!({ "sensorId": "S1", "statuses": "error|outOfRange", "timestamp": "1000" }),
        )
        .unwrap();
        let search: DataSearch = decode(Operation::FindSensorData, values).unwrap();
        assert_eq!(search.timestamp, 1000);
        assert_eq!(search.count, 5);
        assert!(!search.detail);
        assert!(search.statuses.contains(&Status::Error));
        assert!(!search.statuses.contains(&Status::Ok));
    }
}
