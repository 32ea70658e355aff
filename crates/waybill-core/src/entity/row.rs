//! Conversion between entities, column maps and SQLite values.
//!
//! Entities cross the storage boundary as a [`Row`]: the JSON object their
//! serde representation produces. Each column's [`ColumnType`] decides how a
//! JSON value is bound to, and read back from, SQLite.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

use super::{ColumnType, Entity};
use crate::error::{WaybillError, WaybillResult};

/// Attribute values of one entity keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Serialize an entity into its column map.
pub fn to_row<E: Entity>(entity: &E) -> WaybillResult<Row> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => Err(WaybillError::parse(format!(
            "{} serialized to {} instead of an object",
            E::NAME,
            json_kind(&other)
        ))),
    }
}

/// Deserialize an entity from its column map.
pub fn from_row<E: Entity>(row: Row) -> WaybillResult<E> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Bind a JSON attribute as a SQLite value for a column of type `ty`.
pub fn to_sql(column: &str, ty: ColumnType, value: Option<&Value>) -> WaybillResult<SqlValue> {
    let value = match value {
        None | Some(Value::Null) => return Ok(SqlValue::Null),
        Some(v) => v,
    };

    let mismatch = || {
        WaybillError::parse(format!(
            "column '{}' expects {} but got {}",
            column,
            ty,
            json_kind(value)
        ))
    };

    match ty {
        ColumnType::Json => Ok(SqlValue::Text(serde_json::to_string(value)?)),
        ColumnType::Integer => match value {
            Value::Number(n) => n.as_i64().map(SqlValue::Integer).ok_or_else(mismatch),
            Value::Bool(b) => Ok(SqlValue::Integer(*b as i64)),
            _ => Err(mismatch()),
        },
        ColumnType::Real => match value {
            Value::Number(n) => n.as_f64().map(SqlValue::Real).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ColumnType::Text | ColumnType::Uuid | ColumnType::Timestamp => match value {
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            _ => Err(mismatch()),
        },
    }
}

/// Read a SQLite value back as the JSON attribute for a column of type `ty`.
pub fn from_sql(column: &str, ty: ColumnType, value: ValueRef<'_>) -> WaybillResult<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => match ty {
            ColumnType::Real => Ok(Value::from(i as f64)),
            _ => Ok(Value::from(i)),
        },
        ValueRef::Real(f) => Ok(Value::from(f)),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| WaybillError::parse(format!("column '{}': {}", column, e)))?;
            match ty {
                ColumnType::Json => Ok(serde_json::from_str(text)?),
                _ => Ok(Value::String(text.to_string())),
            }
        }
        ValueRef::Blob(_) => Err(WaybillError::parse(format!(
            "column '{}' holds a blob, which no column type maps to",
            column
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_sql_by_type() {
        assert_eq!(
            to_sql("n", ColumnType::Integer, Some(&json!(3))).unwrap(),
            SqlValue::Integer(3)
        );
        assert_eq!(
            to_sql("lat", ColumnType::Real, Some(&json!(55.75))).unwrap(),
            SqlValue::Real(55.75)
        );
        assert_eq!(
            to_sql("coords", ColumnType::Json, Some(&json!([1.0, 2.5]))).unwrap(),
            SqlValue::Text("[1.0,2.5]".to_string())
        );
        assert_eq!(to_sql("d", ColumnType::Text, None).unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_to_sql_rejects_mismatch() {
        let err = to_sql("lat", ColumnType::Real, Some(&json!("north"))).unwrap_err();
        assert!(err.to_string().contains("column 'lat' expects real"));
    }

    #[test]
    fn test_from_sql_by_type() {
        assert_eq!(
            from_sql("lat", ColumnType::Real, ValueRef::Integer(30)).unwrap(),
            json!(30.0)
        );
        assert_eq!(
            from_sql("coords", ColumnType::Json, ValueRef::Text(b"[1.5,2.0]")).unwrap(),
            json!([1.5, 2.0])
        );
        assert_eq!(
            from_sql("name", ColumnType::Text, ValueRef::Text(b"north")).unwrap(),
            json!("north")
        );
        assert_eq!(
            from_sql("name", ColumnType::Text, ValueRef::Null).unwrap(),
            Value::Null
        );
    }
}
