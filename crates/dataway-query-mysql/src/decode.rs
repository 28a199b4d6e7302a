//! MySQL row decoding into JSON maps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo};

use dataway_query::{DataError, Result};

/// Decode one row by column type name. Unknown types fall back to their
/// text representation so a new column type degrades instead of failing
/// the whole page.
pub fn row_to_json(row: &MySqlRow) -> Result<dataway_core::Row> {
    let mut map = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let idx = column.ordinal();
        let value = decode_column(row, idx, column.type_info().name())
            .map_err(|e| DataError::Serialization(format!("{}: {}", column.name(), e)))?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> sqlx::Result<Value> {
    let value = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<Option<u64>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)?
            .and_then(|v| Number::from_f64(v as f64))
            .map(Value::Number),
        "DOUBLE" => row
            .try_get::<Option<f64>, _>(idx)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|v| Value::String(v.to_rfc3339())),
        "JSON" => row.try_get::<Option<Value>, _>(idx)?,
        _ => row.try_get::<Option<String>, _>(idx)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}
