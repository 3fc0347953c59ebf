// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! Schema-driven validation of untyped input records
//!
//! Each [`Operation`] owns a static table of [`FieldSpec`]s. A single generic
//! pass converts every declared field, plugs in defaults, and collects all
//! field errors before failing. Undeclared properties pass through untouched.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AppError, AppErrors, ErrorCode};
use crate::model::Status;

/// Untyped record, as received from a collaborator
pub type Record = Map<String, Value>;

/// Internal identity field callers may never supply
pub const RESERVED_FIELD: &str = "_id";

/// Page size when `_count` is not given
pub const DEFAULT_COUNT: i64 = 5;

/// Added to "now" to build the open upper bound of a sensor-data query
const FAR_FUTURE_OFFSET_MS: i64 = 999_999_999;

/// Operations whose input is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddSensorType,
    AddSensor,
    AddSensorData,
    FindSensorTypes,
    FindSensors,
    FindSensorData,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddSensorType => "addSensorType",
            Operation::AddSensor => "addSensor",
            Operation::AddSensorData => "addSensorData",
            Operation::FindSensorTypes => "findSensorTypes",
            Operation::FindSensors => "findSensors",
            Operation::FindSensorData => "findSensorData",
        }
    }

    /// Field table for this operation
    pub fn schema(&self) -> &'static [FieldSpec] {
        match self {
            Operation::AddSensorType => ADD_SENSOR_TYPE,
            Operation::AddSensor => ADD_SENSOR,
            Operation::AddSensorData => ADD_SENSOR_DATA,
            Operation::FindSensorTypes => FIND_SENSOR_TYPES,
            Operation::FindSensors => FIND_SENSORS,
            Operation::FindSensorData => FIND_SENSOR_DATA,
        }
    }
}

/// Expected shape of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Integer or integer string, optionally bounded below
    Integer { min: Option<i64> },
    /// Number or numeric string
    Number,
    /// Object with numeric `min` and `max`
    Range,
    /// `|`-separated statuses, or `all`
    Statuses,
    /// Boolean or truthy string
    Flag,
}

/// What to do when a field is blank or absent
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    Required,
    Value(fn() -> Value),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub fallback: Fallback,
}

impl FieldSpec {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            fallback: Fallback::Required,
        }
    }

    const fn defaulted(name: &'static str, kind: FieldKind, default: fn() -> Value) -> Self {
        Self {
            name,
            kind,
            fallback: Fallback::Value(default),
        }
    }
}

const STRING: FieldKind = FieldKind::String;
const INTEGER: FieldKind = FieldKind::Integer { min: None };
const POSITIVE: FieldKind = FieldKind::Integer { min: Some(1) };
const NON_NEGATIVE: FieldKind = FieldKind::Integer { min: Some(0) };

fn null() -> Value {
    Value::Null
}

fn zero() -> Value {
    Value::from(0)
}

fn default_count() -> Value {
    Value::from(DEFAULT_COUNT)
}

fn no_detail() -> Value {
    Value::Bool(false)
}

fn ok_only() -> Value {
    Value::from(vec![Status::Ok.as_str()])
}

/// Some future timestamp, recomputed per call
fn far_future() -> Value {
    Value::from(Utc::now().timestamp_millis() + FAR_FUTURE_OFFSET_MS)
}

static ADD_SENSOR_TYPE: &[FieldSpec] = &[
    FieldSpec::required("id", STRING),
    FieldSpec::required("manufacturer", STRING),
    FieldSpec::required("modelNumber", STRING),
    FieldSpec::required("quantity", STRING),
    FieldSpec::required("unit", STRING),
    FieldSpec::required("limits", FieldKind::Range),
];

static ADD_SENSOR: &[FieldSpec] = &[
    FieldSpec::required("id", STRING),
    FieldSpec::required("model", STRING),
    FieldSpec::required("period", POSITIVE),
    FieldSpec::required("expected", FieldKind::Range),
];

static ADD_SENSOR_DATA: &[FieldSpec] = &[
    FieldSpec::required("sensorId", STRING),
    FieldSpec::required("timestamp", INTEGER),
    FieldSpec::required("value", FieldKind::Number),
];

static FIND_SENSOR_TYPES: &[FieldSpec] = &[
    FieldSpec::defaulted("id", STRING, null),
    FieldSpec::defaulted("_index", NON_NEGATIVE, zero),
    FieldSpec::defaulted("_count", NON_NEGATIVE, default_count),
];

static FIND_SENSORS: &[FieldSpec] = &[
    FieldSpec::defaulted("id", STRING, null),
    FieldSpec::defaulted("_index", NON_NEGATIVE, zero),
    FieldSpec::defaulted("_count", NON_NEGATIVE, default_count),
    FieldSpec::defaulted("_doDetail", FieldKind::Flag, no_detail),
];

static FIND_SENSOR_DATA: &[FieldSpec] = &[
    FieldSpec::required("sensorId", STRING),
    FieldSpec::defaulted("timestamp", INTEGER, far_future),
    FieldSpec::defaulted("_count", NON_NEGATIVE, default_count),
    FieldSpec::defaulted("statuses", FieldKind::Statuses, ok_only),
    FieldSpec::defaulted("_doDetail", FieldKind::Flag, no_detail),
];

static RANGE: &[FieldSpec] = &[
    FieldSpec::required("min", FieldKind::Number),
    FieldSpec::required("max", FieldKind::Number),
];

/// Validate `raw` for `op`, returning a normalized copy
pub fn validate(op: Operation, raw: &Value) -> Result<Record, AppErrors> {
    let Some(info) = raw.as_object() else {
        return Err(AppErrors::single(
            ErrorCode::Type,
            format!("{} requires an object, not {}", op.name(), type_name(raw)),
        ));
    };

    let mut errors = Vec::new();
    if info.contains_key(RESERVED_FIELD) {
        errors.push(AppError::new(
            ErrorCode::Reserved,
            format!("the {} parameter is reserved for internal use only", RESERVED_FIELD),
        ));
    }
    let values = validate_fields(op.schema(), info, "", &mut errors);

    match AppErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(values),
    }
}

/// Validate and deserialize into a typed record
pub fn validate_into<T: DeserializeOwned>(op: Operation, raw: &Value) -> Result<T, AppErrors> {
    let values = validate(op, raw)?;
    decode(op, values)
}

/// Deserialize an already validated record
pub fn decode<T: DeserializeOwned>(op: Operation, values: Record) -> Result<T, AppErrors> {
    serde_json::from_value(Value::Object(values))
        .map_err(|e| AppErrors::single(ErrorCode::Type, format!("{}: {}", op.name(), e)))
}

fn validate_fields(
    schema: &[FieldSpec],
    info: &Record,
    parent: &str,
    errors: &mut Vec<AppError>,
) -> Record {
    let mut values = info.clone();
    for spec in schema {
        let name = if parent.is_empty() {
            spec.name.to_string()
        } else {
            format!("{}.{}", parent, spec.name)
        };
        let checked = match info.get(spec.name) {
            Some(value) if !is_blank(value) => check_value(&name, spec.kind, value, errors),
            _ => fallback(&name, spec.fallback, errors),
        };
        match checked {
            Some(value) => values.insert(spec.name.to_string(), value),
            None => values.remove(spec.name),
        };
    }
    values
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn fallback(name: &str, fallback: Fallback, errors: &mut Vec<AppError>) -> Option<Value> {
    match fallback {
        Fallback::Value(produce) => Some(produce()),
        Fallback::Required => {
            errors.push(AppError::new(
                ErrorCode::Missing,
                format!("missing value for {}", name),
            ));
            None
        }
    }
}

fn check_value(
    name: &str,
    kind: FieldKind,
    value: &Value,
    errors: &mut Vec<AppError>,
) -> Option<Value> {
    let checked = match kind {
        FieldKind::String => check_string(name, value),
        FieldKind::Integer { min } => check_integer(name, value, min),
        FieldKind::Number => check_number(name, value),
        FieldKind::Range => match value.as_object() {
            Some(range) => Ok(Value::Object(validate_fields(RANGE, range, name, errors))),
            None => Err(wrong_type(name, value, "Object")),
        },
        FieldKind::Statuses => check_statuses(name, value),
        FieldKind::Flag => check_flag(name, value),
    };
    match checked {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(err);
            None
        }
    }
}

fn check_string(name: &str, value: &Value) -> Result<Value, AppError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        _ => Err(wrong_type(name, value, "String")),
    }
}

fn check_integer(name: &str, value: &Value, min: Option<i64>) -> Result<Value, AppError> {
    let not_integer = || {
        AppError::new(
            ErrorCode::Type,
            format!("value {} for {} is not an integer", display(value), name),
        )
    };
    let n = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
                .ok_or_else(not_integer)?,
        },
        Value::String(s) if is_integer_text(s.trim()) => {
            s.trim().parse::<i64>().map_err(|_| not_integer())?
        }
        Value::String(_) => return Err(not_integer()),
        _ => return Err(wrong_type(name, value, "Number or String")),
    };
    if let Some(min) = min {
        if n < min {
            return Err(AppError::new(
                ErrorCode::Type,
                format!("value {} for {} must be at least {}", n, name, min),
            ));
        }
    }
    Ok(Value::from(n))
}

fn check_number(name: &str, value: &Value) -> Result<Value, AppError> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) if is_number_text(s.trim()) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(number_value)
            .ok_or_else(|| not_a_number(name, value)),
        Value::String(_) => Err(not_a_number(name, value)),
        _ => Err(wrong_type(name, value, "Number or String")),
    }
}

fn check_statuses(name: &str, value: &Value) -> Result<Value, AppError> {
    let Value::String(text) = value else {
        return Err(wrong_type(name, value, "String"));
    };
    let text = text.trim();
    if text == "all" {
        return Ok(Value::from(
            Status::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        ));
    }
    let tokens: Vec<&str> = text.split('|').map(str::trim).collect();
    let bad: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| Status::parse(t).is_none())
        .collect();
    if !bad.is_empty() {
        return Err(AppError::new(
            ErrorCode::Type,
            format!("invalid status {} in {} {}", bad.join(","), name, text),
        ));
    }
    let mut statuses: Vec<Status> = tokens.iter().filter_map(|t| Status::parse(t)).collect();
    statuses.sort();
    statuses.dedup();
    Ok(Value::from(
        statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
    ))
}

fn check_flag(name: &str, value: &Value) -> Result<Value, AppError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Number(n) => Ok(Value::Bool(n.as_f64() != Some(0.0))),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            Ok(Value::Bool(!matches!(s.as_str(), "false" | "0" | "no" | "off")))
        }
        _ => Err(wrong_type(name, value, "Boolean or String")),
    }
}

/// Integral floats come back as JSON integers
fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}

/// `[-+]?\d+`
fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix(&['-', '+'][..]).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `[-+]?\d+(\.\d+)?([eE][-+]?\d+)?`
fn is_number_text(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };
    let unsigned = mantissa.strip_prefix(&['-', '+'][..]).unwrap_or(mantissa);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (unsigned, None),
    };
    let all_digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole)
        && fraction.map_or(true, all_digits)
        && exponent.map_or(true, is_integer_text)
}

fn wrong_type(name: &str, value: &Value, expected: &str) -> AppError {
    AppError::new(
        ErrorCode::Type,
        format!(
            "require type {} for {} value {} instead of type {}",
            expected,
            name,
            display(value),
            type_name(value)
        ),
    )
}

fn not_a_number(name: &str, value: &Value) -> AppError {
    AppError::new(
        ErrorCode::Type,
        format!("value {} for {} is not a number", display(value), name),
    )
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
