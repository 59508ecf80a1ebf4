// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::database_error::DatabaseError;

/// The closed set of column types. Determines storage affinity, literal encoding and
/// whether a column may participate in a key or index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Blob,
    Boolean,
    Date,
    Integer,
    Number,
    String,
    Object,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Object => "object",
        }
    }

    /// Storage type used in `create table`
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Blob => "blob",
            ColumnType::Boolean | ColumnType::Integer | ColumnType::Date => "integer",
            ColumnType::Number => "real",
            ColumnType::String | ColumnType::Object => "text",
        }
    }

    pub fn is_indexable(&self) -> bool {
        !matches!(self, ColumnType::Blob | ColumnType::Object)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Number)
    }

    /// Whether values of this type have a meaningful ordering for `min`/`max`
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Number | ColumnType::Date | ColumnType::String
        )
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "blob" => ColumnType::Blob,
            "boolean" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "integer" => ColumnType::Integer,
            "number" => ColumnType::Number,
            "string" => ColumnType::String,
            "object" => ColumnType::Object,
            _ => return Err(DatabaseError::Data(format!("Unknown column type '{s}'"))),
        })
    }
}
