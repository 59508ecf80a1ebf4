// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;

use crate::database_error::DatabaseError;
use crate::engine::SqlRow;
use crate::schema::{ColumnType, TableDefinition};
use crate::value::{Row, codec::ValueCodec};

/// A change to the in-memory catalog, applied only after the statements that persist it commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogChange {
    /// Add or replace (`Some`) or remove (`None`) a table
    Table {
        name: String,
        definition: Option<TableDefinition>,
    },
    Version(i64),
}

/// Decodes result rows using the declared type of each result column. Columns with no
/// declared type keep the engine's value.
#[derive(Debug, Clone, Default)]
pub struct ResultDecoder {
    types: HashMap<String, ColumnType>,
    codec: ValueCodec,
}

impl ResultDecoder {
    pub fn new(codec: ValueCodec) -> Self {
        Self {
            types: HashMap::new(),
            codec,
        }
    }

    /// Declare the type of a result column. The first declaration of a name wins.
    pub fn declare(&mut self, name: impl Into<String>, column_type: ColumnType) {
        self.types.entry(name.into()).or_insert(column_type);
    }

    pub fn declared(&self, name: &str) -> Option<ColumnType> {
        self.types.get(name).copied()
    }

    pub fn decode(&self, rows: Vec<SqlRow>) -> Result<Vec<Row>, DatabaseError> {
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(name, raw)| {
                        let value = match self.types.get(&name) {
                            Some(column_type) => self.codec.to_value(&raw, *column_type)?,
                            None => raw.into_value(),
                        };
                        Ok((name, value))
                    })
                    .collect::<Result<Row, DatabaseError>>()
            })
            .collect()
    }
}

/// A compiled unit of work that an execution context or transaction can run.
pub trait Query: Send + Sync {
    /// The statements to run, in order. Fails if a bindable value has no value.
    fn statements(&self) -> Result<Vec<String>, DatabaseError>;

    /// Catalog changes to apply once the statements have committed
    fn catalog_changes(&self) -> Vec<CatalogChange> {
        vec![]
    }

    /// Whether the statements create, alter or drop tables
    fn alters_schema(&self) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        false
    }

    /// Decoder for the rows of the last statement
    fn decoder(&self) -> ResultDecoder {
        ResultDecoder::default()
    }
}
