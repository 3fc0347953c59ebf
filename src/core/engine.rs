// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Catalog engine - validation, referential integrity and queries

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cursor::{start_time, walk_back, DataSearch, IndexSearch};
use super::EntityKind;
use crate::config::DatabaseConfig;
use crate::db::{self, from_document, to_document, Collection, ConnectionUrl, Store, KEY_FIELD};
use crate::error::{AppErrors, ErrorCode, StoreError};
use crate::model::{
    Envelope, EnvelopeRecord, Page, Reading, Sensor, SensorDataPage, SensorType, SensorView,
    Status, StatusReading,
};
use crate::validate::{decode, validate, validate_into, Operation};

/// Sensor catalog over a shared [`Store`]
pub struct Engine {
    store: Arc<dyn Store>,
    /// Per-sensor gate around the envelope read-modify-write
    writers: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    /// Connect with default database settings
    pub async fn open(url: &str) -> Result<Self, AppErrors> {
        Self::connect(url, &DatabaseConfig::default()).await
    }

    /// Connect to the store named by `url` (`scheme://host:port/database`)
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, AppErrors> {
        let url = ConnectionUrl::parse(url)?;
        let store = db::connect(&url, config).await?;
        Ok(Self::with_store(store))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Release the store connection
    pub async fn close(self) -> Result<(), AppErrors> {
        self.store.close().await?;
        info!("Engine closed");
        Ok(())
    }

    /// Remove every sensor type, sensor and reading
    pub async fn clear(&self) -> Result<(), AppErrors> {
        self.store.clear().await?;
        info!("Catalog cleared");
        Ok(())
    }

    /// Add or replace a sensor type
    pub async fn add_sensor_type(&self, info: &Value) -> Result<(), AppErrors> {
        let sensor_type: SensorType = validate_into(Operation::AddSensorType, info)?;
        self.put(Collection::SensorTypes, &sensor_type).await?;
        debug!("Added sensor type {}", sensor_type.id);
        Ok(())
    }

    /// Add or replace a sensor; its `model` must name a known sensor type
    pub async fn add_sensor(&self, info: &Value) -> Result<(), AppErrors> {
        let sensor: Sensor = validate_into(Operation::AddSensor, info)?;
        if self
            .lookup::<SensorType>(Collection::SensorTypes, &sensor.model)
            .await?
            .is_none()
        {
            return Err(AppErrors::single(
                ErrorCode::XId,
                format!("unknown sensor type \"{}\"", sensor.model),
            ));
        }
        self.put(Collection::Sensors, &sensor).await?;
        debug!("Added sensor {} of type {}", sensor.id, sensor.model);
        Ok(())
    }

    /// Add or replace a reading and widen the sensor's envelope
    pub async fn add_sensor_data(&self, info: &Value) -> Result<(), AppErrors> {
        let mut values = validate(Operation::AddSensorData, info)?;
        values.remove(KEY_FIELD);
        let mut reading: Reading = decode(Operation::AddSensorData, values)?;
        reading.id = Reading::key(&reading.sensor_id, reading.timestamp);

        let Some(sensor) = self
            .lookup::<Sensor>(Collection::Sensors, &reading.sensor_id)
            .await?
        else {
            return Err(AppErrors::single(
                ErrorCode::XId,
                format!("unknown sensor \"{}\"", reading.sensor_id),
            ));
        };

        let gate = self.writer_gate(&sensor.id);
        let _held = gate.lock().await;

        let timestamp = reading.timestamp;
        let (mut envelope, mut changed) = match self
            .lookup::<EnvelopeRecord>(Collection::Envelopes, &sensor.id)
            .await?
        {
            // first reading; nothing to align to yet
            None => (Envelope::starting_at(timestamp), true),
            Some(record) => {
                if !record.envelope.is_aligned(timestamp, sensor.period) {
                    warn!(
                        "Rejected reading at {} for sensor {}: not a multiple of period {} from {}",
                        timestamp, sensor.id, sensor.period, record.envelope.earliest
                    );
                    return Err(AppErrors::single(
                        ErrorCode::BadTimestamp,
                        format!(
                            "timestamp {} is not a multiple of period {} from {} for sensor \"{}\"",
                            timestamp, sensor.period, record.envelope.earliest, sensor.id
                        ),
                    ));
                }
                (record.envelope, false)
            }
        };

        self.put(Collection::Readings, &reading).await?;

        changed |= envelope.widen(timestamp);
        if changed {
            let record = EnvelopeRecord {
                id: sensor.id.clone(),
                envelope,
            };
            self.put(Collection::Envelopes, &record).await?;
            debug!(
                "Envelope of sensor {} now {}..{}",
                sensor.id, envelope.earliest, envelope.latest
            );
        }
        Ok(())
    }

    /// Sensor types matching the search, ascending by id
    pub async fn find_sensor_types(&self, spec: &Value) -> Result<Page<SensorType>, AppErrors> {
        let search = IndexSearch::from_values(
            Operation::FindSensorTypes,
            validate(Operation::FindSensorTypes, spec)?,
        )?;
        let data: Vec<SensorType> = self.scan(Collection::SensorTypes, &search).await?;
        if let Some(id) = search.id() {
            if data.is_empty() {
                return Err(AppErrors::single(
                    ErrorCode::NotFound,
                    format!("no results for sensor-type id '{}'", id),
                ));
            }
        }
        Ok(search.page(data))
    }

    /// Sensors matching the search, ascending by id, optionally with their types
    pub async fn find_sensors(&self, spec: &Value) -> Result<Page<SensorView>, AppErrors> {
        let search = IndexSearch::from_values(
            Operation::FindSensors,
            validate(Operation::FindSensors, spec)?,
        )?;
        let sensors: Vec<Sensor> = self.scan(Collection::Sensors, &search).await?;
        if let Some(id) = search.id() {
            if sensors.is_empty() {
                return Err(AppErrors::single(
                    ErrorCode::NotFound,
                    format!("no results for sensor id '{}'", id),
                ));
            }
        }

        let mut data = Vec::with_capacity(sensors.len());
        for sensor in sensors {
            let sensor_type = if search.detail() {
                Some(self.type_of(&sensor).await?)
            } else {
                None
            };
            data.push(SensorView {
                sensor,
                sensor_type,
            });
        }
        Ok(search.page(data))
    }

    /// Readings of one sensor, latest first, walking back from the requested
    /// timestamp one period at a time
    pub async fn find_sensor_data(&self, spec: &Value) -> Result<SensorDataPage, AppErrors> {
        let search: DataSearch = validate_into(Operation::FindSensorData, spec)?;

        let Some(sensor) = self
            .lookup::<Sensor>(Collection::Sensors, &search.sensor_id)
            .await?
        else {
            return Err(AppErrors::single(
                ErrorCode::XId,
                format!("unknown sensor id \"{}\"", search.sensor_id),
            ));
        };
        let sensor_type = self.type_of(&sensor).await?;

        let Some(EnvelopeRecord { envelope, .. }) = self
            .lookup::<EnvelopeRecord>(Collection::Envelopes, &sensor.id)
            .await?
        else {
            return Err(AppErrors::single(
                ErrorCode::NotFound,
                format!("no sensor data for sensor \"{}\"", sensor.id),
            ));
        };

        let start = start_time(envelope.latest, search.timestamp, sensor.period);
        let mut data = Vec::new();
        for timestamp in walk_back(start, envelope.earliest, sensor.period) {
            if data.len() as i64 >= search.count {
                break;
            }
            let key = Reading::key(&sensor.id, timestamp);
            // gaps in a sparse series are skipped
            let Some(reading) = self.lookup::<Reading>(Collection::Readings, &key).await? else {
                continue;
            };
            let status = Status::classify(reading.value, &sensor_type, &sensor);
            if search.statuses.contains(&status) {
                data.push(StatusReading {
                    timestamp,
                    value: reading.value,
                    status,
                });
            }
        }

        let (sensor, sensor_type) = if search.detail {
            (Some(sensor), Some(sensor_type))
        } else {
            (None, None)
        };
        Ok(SensorDataPage {
            data,
            sensor,
            sensor_type,
        })
    }

    /// Add a record of `kind`
    pub async fn add(&self, kind: EntityKind, info: &Value) -> Result<(), AppErrors> {
        match kind {
            EntityKind::SensorType => self.add_sensor_type(info).await,
            EntityKind::Sensor => self.add_sensor(info).await,
            EntityKind::SensorData => self.add_sensor_data(info).await,
        }
    }

    /// Run the find operation for `kind`, returning its JSON result
    pub async fn find(&self, kind: EntityKind, spec: &Value) -> Result<Value, AppErrors> {
        let result = match kind {
            EntityKind::SensorType => serde_json::to_value(self.find_sensor_types(spec).await?),
            EntityKind::Sensor => serde_json::to_value(self.find_sensors(spec).await?),
            EntityKind::SensorData => serde_json::to_value(self.find_sensor_data(spec).await?),
        };
        Ok(result.map_err(StoreError::from)?)
    }

    async fn scan<T: DeserializeOwned>(
        &self,
        collection: Collection,
        search: &IndexSearch,
    ) -> Result<Vec<T>, AppErrors> {
        let docs = self.store.scan(collection, &search.query()).await?;
        docs.into_iter()
            .map(|doc| from_document(doc).map_err(AppErrors::from))
            .collect()
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, AppErrors> {
        match self.store.get(collection, key).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + Sync>(
        &self,
        collection: Collection,
        record: &T,
    ) -> Result<(), AppErrors> {
        let doc = to_document(record)?;
        self.store.upsert(collection, doc).await?;
        Ok(())
    }

    /// Type of a stored sensor. Its existence was checked when the sensor was
    /// added, so a miss means the store is inconsistent.
    async fn type_of(&self, sensor: &Sensor) -> Result<SensorType, AppErrors> {
        match self
            .lookup::<SensorType>(Collection::SensorTypes, &sensor.model)
            .await?
        {
            Some(sensor_type) => Ok(sensor_type),
            None => panic!(
                "sensor {} references missing sensor type {}",
                sensor.id, sensor.model
            ),
        }
    }

    fn writer_gate(&self, sensor_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.writers
            .lock()
            .entry(sensor_id.to_string())
            .or_default()
            .clone()
    }
}
