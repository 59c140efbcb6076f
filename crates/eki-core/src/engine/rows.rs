//! Decoding of BigQuery `jobs.query` result rows
//!
//! The REST API returns every cell as a string inside `{"f": [{"v": ...}]}`
//! wrappers; the schema says how to read each one.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
}

impl FieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

/// Named-column view over a single result row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(pub Map<String, Value>);

impl Row {
    fn column(&self, name: &str) -> Result<&Value> {
        match self.0.get(name) {
            Some(Value::Null) | None => Err(Error::Engine(format!(
                "result row is missing column '{}'",
                name
            ))),
            Some(v) => Ok(v),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<String> {
        match self.column(name)? {
            Value::String(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let v = self.column(name)?;
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| Error::Engine(format!("column '{}' is not numeric", name)))
    }

    pub fn get_f64_or(&self, name: &str, default: f64) -> f64 {
        self.get_f64(name).unwrap_or(default)
    }

    pub fn get_timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        let v = self.column(name)?;
        if let Some(s) = v.as_str() {
            return parse_timestamp(s)
                .ok_or_else(|| Error::Engine(format!("column '{}' is not a timestamp", name)));
        }
        v.as_f64()
            .and_then(timestamp_from_epoch_secs)
            .ok_or_else(|| Error::Engine(format!("column '{}' is not a timestamp", name)))
    }

    pub fn get_f64_array(&self, name: &str) -> Result<Vec<f64>> {
        match self.column(name)? {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_f64().ok_or_else(|| {
                        Error::Engine(format!("column '{}' holds a non-numeric element", name))
                    })
                })
                .collect(),
            _ => Err(Error::Engine(format!("column '{}' is not an array", name))),
        }
    }
}

/// Accepts epoch seconds (`"1.7E9"`, the REST encoding) or RFC 3339
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = s.trim().parse::<f64>() {
        return timestamp_from_epoch_secs(secs);
    }
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn timestamp_from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    let micros = (secs * 1_000_000.0).round() as i64;
    Utc.timestamp_micros(micros).single()
}

/// Convert REST rows into [`Row`]s according to `schema`
pub fn decode_rows(schema: &TableSchema, rows: &[Value]) -> Result<Vec<Row>> {
    rows.iter()
        .map(|raw| {
            let cells = raw
                .get("f")
                .and_then(|f| f.as_array())
                .ok_or_else(|| Error::Engine("malformed result row: missing 'f'".into()))?;
            if cells.len() != schema.fields.len() {
                return Err(Error::Engine(format!(
                    "result row has {} cells but schema has {} fields",
                    cells.len(),
                    schema.fields.len()
                )));
            }

            let mut map = Map::new();
            for (field, cell) in schema.fields.iter().zip(cells) {
                let value = cell.get("v").cloned().unwrap_or(Value::Null);
                map.insert(field.name.clone(), decode_value(field, value));
            }
            Ok(Row(map))
        })
        .collect()
}

fn decode_value(field: &FieldSchema, value: Value) -> Value {
    if field.is_repeated() {
        let items = match value {
            Value::Array(items) => items,
            _ => return Value::Array(vec![]),
        };
        return Value::Array(
            items
                .into_iter()
                .map(|item| {
                    let inner = item.get("v").cloned().unwrap_or(Value::Null);
                    decode_scalar(&field.field_type, inner)
                })
                .collect(),
        );
    }
    decode_scalar(&field.field_type, value)
}

fn decode_scalar(field_type: &str, value: Value) -> Value {
    let s = match value {
        Value::String(s) => s,
        other => return other,
    };
    match field_type {
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" | "INTEGER" | "INT64" => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(s)),
        "BOOLEAN" | "BOOL" => Value::Bool(s.eq_ignore_ascii_case("true")),
        _ => Value::String(s),
    }
}
