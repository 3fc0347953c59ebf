// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Catalog records: sensor types, sensors, readings and envelopes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Inclusive numeric range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,

    /// Properties beyond `min`/`max`, kept as supplied
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            extra: Map::new(),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Declared category of sensor with hard operating limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorType {
    pub id: String,
    pub manufacturer: String,
    pub model_number: String,
    pub quantity: String,
    pub unit: String,
    pub limits: Range,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deployed instance of a [`SensorType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: String,
    /// Id of the sensor type
    pub model: String,
    /// Sampling interval, in timestamp units
    pub period: i64,
    pub expected: Range,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One stored measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Storage key, see [`Reading::key`]
    #[serde(default)]
    pub id: String,
    pub sensor_id: String,
    pub timestamp: i64,
    pub value: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reading {
    /// Key of the reading taken by `sensor_id` at `timestamp`
    pub fn key(sensor_id: &str, timestamp: i64) -> String {
        format!("{}-{}", sensor_id, timestamp)
    }
}

/// Known timestamp range of a sensor's stored readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub earliest: i64,
    pub latest: i64,
}

impl Envelope {
    /// Envelope holding a single timestamp
    pub fn starting_at(timestamp: i64) -> Self {
        Self {
            earliest: timestamp,
            latest: timestamp,
        }
    }

    /// True when `timestamp` is a whole number of periods from `earliest`
    pub fn is_aligned(&self, timestamp: i64, period: i64) -> bool {
        (timestamp as i128 - self.earliest as i128).rem_euclid(period as i128) == 0
    }

    /// Stretch the envelope to cover `timestamp`; returns true if it changed
    pub fn widen(&mut self, timestamp: i64) -> bool {
        let mut changed = false;
        if timestamp < self.earliest {
            self.earliest = timestamp;
            changed = true;
        }
        if timestamp > self.latest {
            self.latest = timestamp;
            changed = true;
        }
        changed
    }
}

/// Stored form of an [`Envelope`], keyed by sensor id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    pub id: String,
    #[serde(flatten)]
    pub envelope: Envelope,
}

/// Derived classification of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Ok,
    OutOfRange,
    Error,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Ok, Status::OutOfRange, Status::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::OutOfRange => "outOfRange",
            Status::Error => "error",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == token)
    }

    /// Outside the type's limits wins over outside the sensor's expected range.
    pub fn classify(value: f64, sensor_type: &SensorType, sensor: &Sensor) -> Self {
        if !sensor_type.limits.contains(value) {
            Status::Error
        } else if !sensor.expected.contains(value) {
            Status::OutOfRange
        } else {
            Status::Ok
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type StatusSet = BTreeSet<Status>;

/// Reading as returned by a sensor-data query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReading {
    pub timestamp: i64,
    pub value: f64,
    pub status: Status,
}

/// Sensor with its type optionally attached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorView {
    #[serde(flatten)]
    pub sensor: Sensor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<SensorType>,
}

/// One page of an ascending, index-paginated scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    /// `_index` of the following page, or -1
    pub next_index: i64,
    /// `_index` of the preceding page, or -1
    pub previous_index: i64,
}

/// Result of a sensor-data query, latest reading first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataPage {
    pub data: Vec<StatusReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor: Option<Sensor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<SensorType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thermometer() -> (SensorType, Sensor) {
        let sensor_type = SensorType {
            id: "T1".into(),
            manufacturer: "Acme".into(),
            model_number: "A-1".into(),
            quantity: "temperature".into(),
            unit: "C".into(),
            limits: Range::new(0.0, 100.0),
            extra: Map::new(),
        };
        let sensor = Sensor {
            id: "S1".into(),
            model: "T1".into(),
            period: 10,
            expected: Range::new(10.0, 90.0),
            extra: Map::new(),
        };
        (sensor_type, sensor)
    }

    #[test]
    fn test_status_precedence() {
        let (t, s) = thermometer();
        assert_eq!(Status::classify(50.0, &t, &s), Status::Ok);
        assert_eq!(Status::classify(95.0, &t, &s), Status::OutOfRange);
        assert_eq!(Status::classify(5.0, &t, &s), Status::OutOfRange);
        assert_eq!(Status::classify(150.0, &t, &s), Status::Error);
        assert_eq!(Status::classify(-1.0, &t, &s), Status::Error);
        // bounds are inclusive
        assert_eq!(Status::classify(90.0, &t, &s), Status::Ok);
        assert_eq!(Status::classify(100.0, &t, &s), Status::OutOfRange);
    }

    #[test]
    fn test_envelope_alignment() {
        let env = Envelope::starting_at(1000);
        assert!(env.is_aligned(1010, 10));
        assert!(env.is_aligned(990, 10));
        assert!(!env.is_aligned(1005, 10));
        assert!(!env.is_aligned(995, 10));
    }

    #[test]
    fn test_envelope_widen() {
        let mut env = Envelope::starting_at(1000);
        assert!(env.widen(1020));
        assert_eq!(env, Envelope { earliest: 1000, latest: 1020 });
        assert!(!env.widen(1010));
        assert!(env.widen(980));
        assert_eq!(env, Envelope { earliest: 980, latest: 1020 });
    }

    #[test]
    fn test_sensor_type_keeps_unknown_properties() {
        let raw = json!({
            "id": "T1",
            "manufacturer": "Acme",
            "modelNumber": "A-1",
            "quantity": "temperature",
            "unit": "C",
            "limits": { "min": 0, "max": 100, "note": "factory" },
            "color": "red"
        });
        let t: SensorType = serde_json::from_value(raw).unwrap();
        assert_eq!(t.model_number, "A-1");
        assert_eq!(t.limits.extra["note"], "factory");
        assert_eq!(t.extra["color"], "red");

        let back = serde_json::to_value(&t).unwrap();
        assert_eq!(back["color"], "red");
        assert_eq!(back["modelNumber"], "A-1");
    }

    #[test]
    fn test_sensor_view_flattens() {
        let (t, s) = thermometer();
        let view = SensorView { sensor: s, sensor_type: Some(t) };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "S1");
        assert_eq!(json["sensorType"]["id"], "T1");

        let bare = SensorView { sensor: view.sensor.clone(), sensor_type: None };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("sensorType").is_none());
    }

    #[test]
    fn test_status_tokens() {
        assert_eq!(Status::parse("outOfRange"), Some(Status::OutOfRange));
        assert_eq!(Status::parse("OK"), None);
        assert_eq!(serde_json::to_value(Status::OutOfRange).unwrap(), json!("outOfRange"));
    }
}
