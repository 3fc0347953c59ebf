// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Core engine module - catalog operations over a store

mod cursor;
mod engine;

pub use cursor::{next_index, previous_index, start_time, walk_back};
pub use engine::Engine;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of catalog record an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    SensorType,
    Sensor,
    SensorData,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::SensorType,
        EntityKind::Sensor,
        EntityKind::SensorData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::SensorType => "sensor-type",
            EntityKind::Sensor => "sensor",
            EntityKind::SensorData => "sensor-data",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_cli() {
        for kind in EntityKind::ALL {
            let parsed = EntityKind::from_str(kind.as_str(), false).unwrap();
            assert_eq!(parsed, kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::from(kind.as_str())
            );
        }
        assert!(EntityKind::from_str("sensors", false).is_err());
    }
}
