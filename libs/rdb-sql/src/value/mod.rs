// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Application-level values and rows, and their conversion to and from SQL text.

pub mod codec;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::schema::ColumnType;

/// A decoded result row (or a row to insert), keyed by column name (or alias).
pub type Row = IndexMap<String, Value>;

/// A typed application value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    String(String),
    Object(serde_json::Value),
    Blob(Bytes),
    /// Multiple values bound at once (membership lists and multi-row inserts)
    List(Vec<Value>),
    Row(Row),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type a value encodes under when no column type is known.
    pub fn natural_type(&self) -> ColumnType {
        match self {
            Value::Integer(_) => ColumnType::Integer,
            Value::Number(_) => ColumnType::Number,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Date(_) => ColumnType::Date,
            Value::String(_) => ColumnType::String,
            Value::Blob(_) => ColumnType::Blob,
            Value::Null | Value::Object(_) | Value::List(_) | Value::Row(_) => ColumnType::Object,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Blob(_) => "blob",
            Value::List(_) => "list",
            Value::Row(_) => "row",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::from(d.timestamp_millis()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(o) => o.clone(),
            Value::Blob(b) => serde_json::Value::String(codec::to_hex(b)),
            Value::List(values) => values.iter().map(Value::to_json).collect(),
            Value::Row(row) => serde_json::Value::Object(
                row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Build a [`Row`] from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

value_from!(
    i32 => Integer,
    u32 => Integer,
    i64 => Integer,
    f64 => Number,
    bool => Boolean,
    DateTime<Utc> => Date,
    String => String,
    &str => String,
    serde_json::Value => Object,
    Bytes => Blob,
    Vec<u8> => Blob,
    Vec<Value> => List,
    Row => Row,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn json_view_of_nested_values() {
        let value = Value::List(vec![
            Value::Row(row([("id", Value::from(1)), ("pic", Value::from(vec![0xab_u8, 0x01]))])),
            Value::Null,
        ]);

        assert_eq!(
            value.to_json(),
            serde_json::json!([{"id": 1, "pic": "ab01"}, null])
        );
    }

    #[multiplatform_test]
    fn options_map_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }
}
