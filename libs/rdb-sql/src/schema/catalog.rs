// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use tracing::debug;
use typed_generational_arena::{Arena, IgnoreGeneration, Index};

use crate::database_error::DatabaseError;

use super::table::{TableDefinition, TableSchema};

pub type TableArena = Arena<Arc<TableDefinition>, usize, IgnoreGeneration>;
pub type TableId = Index<Arc<TableDefinition>, usize, IgnoreGeneration>;

/// The in-memory schema of one database: its name, version, and every known table.
///
/// Only the commit path of an execution context mutates the catalog (through
/// [`Schema::report_table_change`]), so readers observe either the state before a
/// transaction or the state after it.
#[derive(Clone)]
pub struct Schema {
    name: String,
    version: i64,
    tables: TableArena,
    table_ids: HashMap<String, TableId>,
}

impl Schema {
    pub fn new(name: impl Into<String>, version: i64) -> Self {
        Self {
            name: name.into(),
            version,
            tables: TableArena::new(),
            table_ids: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.table_ids.contains_key(table_name)
    }

    pub fn table_id(&self, table_name: &str) -> Option<TableId> {
        self.table_ids.get(table_name).copied()
    }

    pub fn table(&self, table_name: &str) -> Result<TableSchema, DatabaseError> {
        self.table_id(table_name)
            .and_then(|id| self.tables.get(id))
            .map(|definition| TableSchema::new(definition.clone()))
            .ok_or_else(|| DatabaseError::Syntax(format!("No such table {table_name}")))
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.table_ids.keys().cloned().collect();
        names.sort();
        names
    }

    /// Register, replace (`Some`) or remove (`None`) a table.
    pub fn report_table_change(&mut self, table_name: &str, table: Option<TableDefinition>) {
        match (self.table_ids.get(table_name).copied(), table) {
            (Some(id), Some(definition)) => {
                debug!("Replacing table {table_name} in schema {}", self.name);
                self.tables[id] = Arc::new(definition);
            }
            (None, Some(definition)) => {
                debug!("Adding table {table_name} to schema {}", self.name);
                let id = self.tables.insert(Arc::new(definition));
                self.table_ids.insert(table_name.to_string(), id);
            }
            (Some(id), None) => {
                debug!("Removing table {table_name} from schema {}", self.name);
                self.tables.remove(id);
                self.table_ids.remove(table_name);
            }
            (None, None) => {}
        }
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tables", &self.table_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;
    use crate::schema::{ColumnDefinition, ColumnType};

    fn table(name: &str, columns: &[&str]) -> TableDefinition {
        TableDefinition {
            columns: columns
                .iter()
                .map(|c| ColumnDefinition::new(*c, ColumnType::String, true))
                .collect(),
            ..TableDefinition::new(name)
        }
    }

    #[multiplatform_test]
    fn table_changes() {
        let mut schema = Schema::new("db", 0);

        schema.report_table_change("foo", Some(table("foo", &["a"])));
        schema.report_table_change("bar", Some(table("bar", &["b"])));
        assert_eq!(schema.table_names(), vec!["bar", "foo"]);

        schema.report_table_change("foo", Some(table("foo", &["a", "c"])));
        assert_eq!(schema.table("foo").unwrap().columns().len(), 2);

        schema.report_table_change("foo", None);
        assert!(!schema.contains("foo"));
        assert!(matches!(schema.table("foo"), Err(DatabaseError::Syntax(_))));

        schema.report_table_change("baz", Some(table("baz", &["z"])));
        assert_eq!(schema.table("bar").unwrap().columns()[0].name(), "b");
        assert_eq!(schema.table("baz").unwrap().columns()[0].name(), "z");
    }

    #[multiplatform_test]
    fn handles_outlive_changes() {
        let mut schema = Schema::new("db", 3);
        schema.report_table_change("foo", Some(table("foo", &["a"])));

        let handle = schema.table("foo").unwrap();
        schema.report_table_change("foo", None);

        assert_eq!(handle.columns()[0].full_name(), "foo.a");
        assert_eq!(schema.version(), 3);
    }
}
