// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! SensorBarn - Time-Series Sensor Telemetry Catalog
//!
//! Keeps three kinds of records and enforces the rules between them:
//! - sensor types, with hard operating limits
//! - sensors, each an instance of a known type with an expected range and
//!   a sampling period
//! - readings, aligned to their sensor's period and classified as `ok`,
//!   `outOfRange` or `error` when queried
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          CLI / batch loader                  │
//! ├──────────────────────────────────────────────┤
//! │  Engine  ─→  Validator (per-operation schema) │
//! │    │                                          │
//! │    ↓                                          │
//! │  Store trait ─→ SqliteStore | MemoryStore     │
//! └──────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, EntityKind};
pub use error::{AppError, AppErrors, ErrorCode};
pub use model::{Page, Range, Reading, Sensor, SensorDataPage, SensorType, Status};

/// SensorBarn version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
