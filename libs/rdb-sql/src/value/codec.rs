// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Write;
use std::str::FromStr;

use bytes::Bytes;
use chrono::DateTime;

use crate::database_error::DatabaseError;
use crate::engine::SqlValue;
use crate::schema::ColumnType;

use super::Value;

pub(crate) const NULL: &str = "null";

/// Delimiter used for string, object and blob literals. Embedded delimiters are always doubled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralQuoting {
    #[default]
    Single,
    Double,
}

impl LiteralQuoting {
    fn delimiter(self) -> char {
        match self {
            LiteralQuoting::Single => '\'',
            LiteralQuoting::Double => '"',
        }
    }

    pub fn quote(self, text: &str) -> String {
        let delimiter = self.delimiter();
        let mut quoted = String::with_capacity(text.len() + 2);
        quoted.push(delimiter);
        for c in text.chars() {
            if c == delimiter {
                quoted.push(delimiter);
            }
            quoted.push(c);
        }
        quoted.push(delimiter);
        quoted
    }
}

impl FromStr for LiteralQuoting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(LiteralQuoting::Single),
            "double" => Ok(LiteralQuoting::Double),
            _ => Err("expected 'single' or 'double'".to_string()),
        }
    }
}

/// Converts [`Value`]s to SQL literal text (and stored values back) according to a column type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueCodec {
    quoting: LiteralQuoting,
}

impl ValueCodec {
    pub fn new(quoting: LiteralQuoting) -> Self {
        Self { quoting }
    }

    pub fn quoting(&self) -> LiteralQuoting {
        self.quoting
    }

    /// Raw literal text: numbers in decimal, booleans as `1`/`0`, dates as epoch milliseconds,
    /// objects as JSON, blobs as lower-case hex. Nothing is quoted.
    pub fn to_literal(&self, value: &Value, column_type: ColumnType) -> Result<String, DatabaseError> {
        let literal = match (column_type, value) {
            (_, Value::Null) => NULL.to_string(),
            (ColumnType::Integer, Value::Integer(i)) => i.to_string(),
            (ColumnType::Integer, Value::Number(n)) if n.is_finite() && n.fract() == 0.0 => {
                (*n as i64).to_string()
            }
            (ColumnType::Number, Value::Integer(i)) => i.to_string(),
            (ColumnType::Number, Value::Number(n)) if n.is_finite() => n.to_string(),
            (ColumnType::Boolean, Value::Boolean(b)) => if *b { "1" } else { "0" }.to_string(),
            (ColumnType::Boolean, Value::Integer(i @ (0 | 1))) => i.to_string(),
            (ColumnType::Date, Value::Date(d)) => d.timestamp_millis().to_string(),
            (ColumnType::Date, Value::Integer(ms)) => ms.to_string(),
            (ColumnType::String, Value::String(s)) => s.clone(),
            (ColumnType::Object, value) => value.to_json().to_string(),
            (ColumnType::Blob, Value::Blob(bytes)) if bytes.is_empty() => NULL.to_string(),
            (ColumnType::Blob, Value::Blob(bytes)) => to_hex(bytes),
            (column_type, value) => {
                return Err(DatabaseError::Type(format!(
                    "Cannot encode a {} value for a {column_type} column",
                    value.kind()
                )));
            }
        };
        Ok(literal)
    }

    /// Like [`Self::to_literal`], but string, object and blob literals are quoted.
    pub fn to_quoted_literal(
        &self,
        value: &Value,
        column_type: ColumnType,
    ) -> Result<String, DatabaseError> {
        let literal = self.to_literal(value, column_type)?;
        let needs_quotes = matches!(
            column_type,
            ColumnType::String | ColumnType::Object | ColumnType::Blob
        ) && !value.is_null()
            && !matches!(value, Value::Blob(bytes) if bytes.is_empty());

        Ok(if needs_quotes {
            self.quoting.quote(&literal)
        } else {
            literal
        })
    }

    /// Decode a stored value according to the declared column type.
    pub fn to_value(&self, raw: &SqlValue, column_type: ColumnType) -> Result<Value, DatabaseError> {
        let value = match (column_type, raw) {
            (_, SqlValue::Null) => Value::Null,
            (ColumnType::Integer, SqlValue::Integer(i)) => Value::Integer(*i),
            (ColumnType::Integer, SqlValue::Real(r)) if r.fract() == 0.0 => Value::Integer(*r as i64),
            (ColumnType::Number, SqlValue::Integer(i)) => Value::Number(*i as f64),
            (ColumnType::Number, SqlValue::Real(r)) => Value::Number(*r),
            (ColumnType::Boolean, SqlValue::Integer(i)) => Value::Boolean(*i == 1),
            (ColumnType::Date, SqlValue::Integer(ms)) => {
                let date = DateTime::from_timestamp_millis(*ms).ok_or_else(|| {
                    DatabaseError::Data(format!("Timestamp {ms} is out of range"))
                })?;
                Value::Date(date)
            }
            (ColumnType::String, SqlValue::Text(s)) => Value::String(s.clone()),
            (ColumnType::String, SqlValue::Integer(i)) => Value::String(i.to_string()),
            (ColumnType::String, SqlValue::Real(r)) => Value::String(r.to_string()),
            (ColumnType::Object, SqlValue::Text(s)) => {
                Value::Object(serde_json::from_str(s).map_err(|e| {
                    DatabaseError::Data(format!("Stored object is not valid JSON: {e}"))
                })?)
            }
            (ColumnType::Blob, SqlValue::Text(hex)) => Value::Blob(from_hex(hex)?),
            (ColumnType::Blob, SqlValue::Blob(bytes)) => Value::Blob(Bytes::from(bytes.clone())),
            (column_type, raw) => {
                return Err(DatabaseError::Data(format!(
                    "Cannot decode stored {} as {column_type}",
                    raw.kind()
                )));
            }
        };
        Ok(value)
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

pub(crate) fn from_hex(hex: &str) -> Result<Bytes, DatabaseError> {
    let invalid = || DatabaseError::Data(format!("Stored blob is not valid hex: {hex}"));

    if hex.len() % 2 != 0 {
        return Err(invalid());
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(invalid)
        })
        .collect::<Result<Vec<u8>, _>>()
        .map(Bytes::from)
}
