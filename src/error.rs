// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! User-facing error types
//!
//! Every engine operation fails with an [`AppErrors`] list rather than a
//! single error, so batch loaders can tag and merge per-record failures.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Caller supplied a field reserved for internal use
    Reserved,
    /// Required field absent and no default
    Missing,
    /// Wrong type, shape or unparsable value
    Type,
    /// Referenced entity does not exist
    XId,
    /// Reading not aligned with its sensor's period
    BadTimestamp,
    /// Id- or sensor-scoped query found nothing
    NotFound,
    /// Malformed connection string
    BadUrl,
    /// Storage backend failure
    Db,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Reserved => "RESERVED",
            ErrorCode::Missing => "MISSING",
            ErrorCode::Type => "TYPE",
            ErrorCode::XId => "X_ID",
            ErrorCode::BadTimestamp => "BAD_TIMESTAMP",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::BadUrl => "BAD_URL",
            ErrorCode::Db => "DB",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single coded error
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Non-empty list of [`AppError`]s
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(transparent)]
pub struct AppErrors(Vec<AppError>);

impl<'de> Deserialize<'de> for AppErrors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let errors = Vec::<AppError>::deserialize(deserializer)?;
        Self::from_vec(errors).ok_or_else(|| de::Error::invalid_length(0, &"at least one error"))
    }
}

impl AppErrors {
    /// Wrap collected errors. Returns `None` for an empty list.
    pub fn from_vec(errors: Vec<AppError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn single(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(vec![AppError::new(code, message)])
    }

    pub fn errors(&self) -> &[AppError] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<AppError> {
        self.0
    }

    /// Code of the first error
    pub fn code(&self) -> ErrorCode {
        self.0[0].code
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.0.iter().any(|e| e.code == code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for AppErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl From<AppError> for AppErrors {
    fn from(err: AppError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for AppErrors {
    type Item = AppError;
    type IntoIter = std::vec::IntoIter<AppError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Storage backend failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("document encoding: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("document in {collection} has no string id")]
    MissingKey { collection: &'static str },

    #[error("store connection is closed")]
    Closed,

    #[error("blocking store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for AppErrors {
    fn from(err: StoreError) -> Self {
        AppErrors::single(ErrorCode::Db, err.to_string())
    }
}
