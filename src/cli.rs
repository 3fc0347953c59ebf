// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Command-line `NAME=VALUE` arguments

use serde_json::{Map, Value};

use crate::error::{AppError, AppErrors, ErrorCode};

/// Build a record from `NAME=VALUE` arguments. Dotted names nest, so
/// `limits.min=0` yields `{"limits": {"min": "0"}}`. Values stay strings;
/// validation converts them.
pub fn parse_assignments<S: AsRef<str>>(args: &[S]) -> Result<Value, AppErrors> {
    let mut record = Map::new();
    let mut errors = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        match arg.split_once('=') {
            Some((name, value)) if is_path(name) => {
                if let Err(err) = assign(&mut record, name, value) {
                    errors.push(err);
                }
            }
            _ => errors.push(AppError::new(
                ErrorCode::Type,
                format!("bad argument '{}': expected NAME=VALUE", arg),
            )),
        }
    }
    match AppErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(Value::Object(record)),
    }
}

fn is_path(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(|part| !part.is_empty())
}

fn assign(record: &mut Map<String, Value>, name: &str, value: &str) -> Result<(), AppError> {
    let (parents, leaf) = match name.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, name),
    };

    let mut target = record;
    for part in parents.into_iter().flat_map(|p| p.split('.')) {
        let slot = target
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        target = match slot {
            Value::Object(map) => map,
            _ => {
                return Err(AppError::new(
                    ErrorCode::Type,
                    format!("'{}' conflicts with an earlier value for '{}'", name, part),
                ))
            }
        };
    }

    if matches!(target.get(leaf), Some(Value::Object(_))) {
        return Err(AppError::new(
            ErrorCode::Type,
            format!("'{}' conflicts with nested values under it", name),
        ));
    }
    target.insert(leaf.to_string(), Value::String(value.to_string()));
    Ok(())
}
