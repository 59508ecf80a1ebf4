// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The single-connection SQL engine underneath the query layer.

mod sqlite;
#[cfg(test)]
pub(crate) mod test_util;

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use rusqlite::types::ValueRef;

use crate::database_error::DatabaseError;
use crate::value::Value;

pub use sqlite::SqliteEngine;

/// A value as stored by the engine, before decoding for a column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// The value as-is, for result columns without a declared type
    pub fn into_value(self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(i),
            SqlValue::Real(r) => Value::Number(r),
            SqlValue::Text(s) => Value::String(s),
            SqlValue::Blob(bytes) => Value::Blob(Bytes::from(bytes)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(text) => SqlValue::Text(String::from_utf8_lossy(text).into_owned()),
            ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

/// A result row keyed by the engine's column names, in select-list order
pub type SqlRow = IndexMap<String, SqlValue>;

/// Executes SQL text against one connection.
///
/// Statements arrive fully rendered; the engine binds nothing itself.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Run one statement and return its rows (empty for statements that return none).
    async fn get(&self, sql: &str) -> Result<Vec<SqlRow>, DatabaseError>;

    /// Run the statements in order inside one engine transaction, returning the rows of each
    /// statement. On failure the transaction is rolled back before the error is returned.
    async fn run(&self, statements: &[String]) -> Result<Vec<Vec<SqlRow>>, DatabaseError>;

    /// Run one statement, discarding any rows.
    async fn exec(&self, sql: &str) -> Result<(), DatabaseError>;

    async fn close(&self) -> Result<(), DatabaseError>;

    /// Whether `create`/`alter`/`drop table` take part in transactions and can be rolled back.
    fn supports_transactional_schema_change(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn natural_values() {
        assert_eq!(SqlValue::Integer(3).into_value(), Value::Integer(3));
        assert_eq!(
            SqlValue::Blob(vec![1, 2]).into_value(),
            Value::Blob(Bytes::from_static(&[1, 2]))
        );
        assert_eq!(
            SqlValue::from(ValueRef::Text(b"abc")),
            SqlValue::Text("abc".into())
        );
    }
}
