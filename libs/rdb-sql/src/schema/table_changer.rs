// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::connection::Connection;
use crate::database_error::DatabaseError;
use crate::exec::{Attachment, CatalogChange, Query, attachable_query};
use crate::value::Value;

use super::catalog_table;
use super::table_builder::{check_index, check_new_column, column_sql, index_creation_sql};
use super::{ColumnDefinition, ColumnType, IndexSpec, TableDefinition, TableSchema, is_valid_name};

/// Builds `alter table` statements for the changes SQLite supports natively: renaming a table,
/// adding a column, and adding or dropping an index. Everything else fails with
/// [`DatabaseError::Unsupported`].
///
/// Each call validates against the table as changed by the previous calls.
#[derive(Debug, Clone)]
pub struct TableChanger {
    connection: Connection,
    original_name: String,
    definition: TableDefinition,
    statements: Vec<String>,
    catalog_statements: Vec<String>,
    /// Other tables whose foreign keys follow a rename
    referencing: Vec<TableDefinition>,
    attachment: Attachment,
}

impl TableChanger {
    pub(crate) fn new(connection: Connection, table: &TableSchema) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            original_name: table.name().to_string(),
            definition: table.definition().clone(),
            statements: vec![],
            catalog_statements: vec![],
            referencing: vec![],
        }
    }

    pub fn rename(mut self, new_name: &str) -> Result<Self, DatabaseError> {
        if !is_valid_name(new_name) {
            return Err(DatabaseError::InvalidSchema(format!(
                "Invalid table name '{new_name}'"
            )));
        }
        let schema = self.connection.schema();
        if schema.contains(new_name) || new_name == self.definition.name {
            return Err(DatabaseError::InvalidSchema(format!(
                "Table {new_name} already exists"
            )));
        }

        let old_name = std::mem::replace(&mut self.definition.name, new_name.to_string());
        let db = schema.name();

        self.statements
            .push(format!("alter table {old_name} rename to {new_name}"));
        self.catalog_statements
            .extend(catalog_table::rename_table(db, &old_name, new_name));

        // SQLite rewrites references to the renamed table; the catalog rows must follow
        let rename_remote = |remote: &mut String| {
            if let Some(column) = remote.strip_prefix(&format!("{old_name}.")) {
                *remote = format!("{new_name}.{column}");
            }
        };
        for foreign_key in self.definition.foreign_keys.iter_mut() {
            if foreign_key.remote_table()?.0 != old_name {
                continue;
            }
            foreign_key.remote_columns.iter_mut().for_each(rename_remote);
            self.catalog_statements.extend([
                catalog_table::delete_relation(db, new_name, &foreign_key.name),
                catalog_table::insert_foreign_key(db, new_name, foreign_key)?,
            ]);
        }

        for table_name in schema.table_names() {
            if table_name == self.original_name {
                continue;
            }
            let mut other = match self
                .referencing
                .iter()
                .position(|other| other.name == table_name)
            {
                Some(i) => self.referencing.remove(i),
                None => schema.table(&table_name)?.definition().clone(),
            };

            let mut changed = false;
            for foreign_key in other.foreign_keys.iter_mut() {
                if foreign_key.remote_table()?.0 != old_name {
                    continue;
                }
                foreign_key.remote_columns.iter_mut().for_each(rename_remote);
                self.catalog_statements.extend([
                    catalog_table::delete_relation(db, &other.name, &foreign_key.name),
                    catalog_table::insert_foreign_key(db, &other.name, foreign_key)?,
                ]);
                changed = true;
            }
            if changed {
                self.referencing.push(other);
            }
        }

        Ok(self)
    }

    /// Add a column. A non-null column needs a default for the rows already present.
    pub fn add_column(
        mut self,
        name: &str,
        column_type: ColumnType,
        not_null: bool,
        default: Option<Value>,
    ) -> Result<Self, DatabaseError> {
        check_new_column(&self.definition, name)?;

        let column = ColumnDefinition::new(name, column_type, !not_null);
        let mut statement = format!(
            "alter table {} add column {}",
            self.definition.name,
            column_sql(&column, false)
        );

        match default {
            Some(value) if !value.is_null() => {
                let literal = self
                    .connection
                    .codec()
                    .to_quoted_literal(&value, column_type)?;
                statement.push_str(&format!(" default {literal}"));
            }
            _ if not_null => {
                return Err(DatabaseError::InvalidSchema(format!(
                    "Non-null column {name} needs a default value"
                )));
            }
            _ => {}
        }

        self.statements.push(statement);
        self.catalog_statements.push(catalog_table::insert_column(
            &self.connection.name(),
            &self.definition.name,
            &column,
        ));
        self.definition.columns.push(column);
        Ok(self)
    }

    pub fn add_index(mut self, index: IndexSpec) -> Result<Self, DatabaseError> {
        check_index(&self.definition, &index)?;

        self.statements
            .push(index_creation_sql(&self.definition.name, &index));
        self.catalog_statements.push(catalog_table::insert_index(
            &self.connection.name(),
            &self.definition.name,
            &index,
        )?);
        self.definition.indexes.push(index);
        Ok(self)
    }

    pub fn drop_index(mut self, name: &str) -> Result<Self, DatabaseError> {
        let position = self
            .definition
            .indexes
            .iter()
            .position(|index| index.name == name)
            .ok_or_else(|| {
                DatabaseError::InvalidSchema(format!(
                    "Table {} has no index {name}",
                    self.definition.name
                ))
            })?;

        self.statements.push(format!("drop index {name}"));
        self.catalog_statements.push(catalog_table::delete_relation(
            &self.connection.name(),
            &self.definition.name,
            name,
        ));
        self.definition.indexes.remove(position);
        Ok(self)
    }

    pub fn drop_column(self, name: &str) -> Result<Self, DatabaseError> {
        Err(unsupported(&format!("dropping column {name}")))
    }

    pub fn set_column_type(self, name: &str, _column_type: ColumnType) -> Result<Self, DatabaseError> {
        Err(unsupported(&format!("changing the type of column {name}")))
    }

    pub fn add_primary_key(self) -> Result<Self, DatabaseError> {
        Err(unsupported("adding a primary key"))
    }

    pub fn drop_primary_key(self) -> Result<Self, DatabaseError> {
        Err(unsupported("dropping a primary key"))
    }

    pub fn add_foreign_key(self) -> Result<Self, DatabaseError> {
        Err(unsupported("adding a foreign key"))
    }

    pub fn drop_foreign_key(self, name: &str) -> Result<Self, DatabaseError> {
        Err(unsupported(&format!("dropping foreign key {name}")))
    }

    pub fn to_sql(&self) -> Result<Vec<String>, DatabaseError> {
        if self.statements.is_empty() {
            return Err(DatabaseError::Syntax(format!(
                "No changes to table {}",
                self.original_name
            )));
        }
        Ok(self.statements.clone())
    }

    pub fn catalog_sql(&self) -> Vec<String> {
        self.catalog_statements.clone()
    }
}

fn unsupported(what: &str) -> DatabaseError {
    DatabaseError::Unsupported(format!("SQLite cannot alter a table by {what}"))
}

attachable_query!(TableChanger);

impl Query for TableChanger {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        let mut statements = self.to_sql()?;
        statements.extend(self.catalog_sql());
        Ok(statements)
    }

    fn catalog_changes(&self) -> Vec<CatalogChange> {
        let mut changes = vec![];
        if self.original_name != self.definition.name {
            changes.push(CatalogChange::Table {
                name: self.original_name.clone(),
                definition: None,
            });
        }
        changes.push(CatalogChange::Table {
            name: self.definition.name.clone(),
            definition: Some(self.definition.clone()),
        });
        changes.extend(self.referencing.iter().map(|other| CatalogChange::Table {
            name: other.name.clone(),
            definition: Some(other.clone()),
        }));
        changes
    }

    fn alters_schema(&self) -> bool {
        true
    }
}
