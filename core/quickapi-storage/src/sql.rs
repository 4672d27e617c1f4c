//! Conversions between JSON record values and SQLite values.

use crate::error::{StorageError, StorageResult};
use quickapi_model::{Column, ColumnType};
use regex_lite::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Row;
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Whether `name` can be used as a table or column name.
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Binds a JSON value as an SQLite parameter.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

pub(crate) fn to_sql_params(values: &[Value]) -> Vec<SqlValue> {
    values.iter().map(to_sql).collect()
}

/// Checks a record field against its column type and converts it.
pub(crate) fn column_value(column: &Column, value: &Value) -> StorageResult<SqlValue> {
    let converted = match (column.column_type, value) {
        (_, Value::Null) => Some(SqlValue::Null),
        (ColumnType::Integer, Value::Number(n)) => n.as_i64().map(SqlValue::Integer),
        (ColumnType::Real, Value::Number(n)) => n.as_f64().map(SqlValue::Real),
        (ColumnType::Text, Value::String(s)) => Some(SqlValue::Text(s.clone())),
        (ColumnType::Boolean, Value::Bool(b)) => Some(SqlValue::Integer(i64::from(*b))),
        (ColumnType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(i @ (0 | 1)) => Some(SqlValue::Integer(i)),
            _ => None,
        },
        (ColumnType::Json, v) => Some(SqlValue::Text(v.to_string())),
        _ => None,
    };

    converted.ok_or_else(|| {
        StorageError::Validation(format!(
            "field '{}' expects {:?}, got {}",
            column.name, column.column_type, value
        ))
    })
}

/// Interprets a query-string value as the column's type.
pub(crate) fn coerce_filter(column: &Column, raw: &str) -> StorageResult<Value> {
    let invalid = || {
        StorageError::Validation(format!(
            "filter on '{}' expects {:?}, got '{raw}'",
            column.name, column.column_type
        ))
    };

    match column.column_type {
        ColumnType::Integer => raw.trim().parse::<i64>().map(Value::from).map_err(|_| invalid()),
        ColumnType::Real => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ColumnType::Text | ColumnType::Json => Ok(Value::String(raw.to_string())),
    }
}

/// The JSON scalar a query-string value denotes, or the string itself.
pub(crate) fn scalar_of(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => v,
        _ => Value::String(raw.to_string()),
    }
}

/// Reads `columns` from `row` starting at index 0.
pub(crate) fn row_to_object(columns: &[Column], row: &Row<'_>) -> rusqlite::Result<Map<String, Value>> {
    let mut object = Map::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let value = from_sql(column.column_type, row.get_ref(idx)?);
        object.insert(column.name.clone(), value);
    }
    Ok(object)
}

fn from_sql(column_type: ColumnType, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if column_type == ColumnType::Boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if column_type == ColumnType::Json {
                serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
            } else {
                Value::String(text.into_owned())
            }
        }
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
