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

use super::catalog_table;
use super::{
    ColumnDefinition, ColumnType, ForeignKeySpec, IndexSpec, IndexedColumn, PrimaryKey,
    TableDefinition, is_valid_name,
};

/// Builds a `create table` statement, its `create index` statements and the catalog rows that
/// record the new table.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    connection: Connection,
    definition: TableDefinition,
    attachment: Attachment,
}

impl TableBuilder {
    pub(crate) fn new(connection: Connection, name: &str) -> Result<Self, DatabaseError> {
        if !is_valid_name(name) {
            return Err(DatabaseError::InvalidSchema(format!(
                "Invalid table name '{name}'"
            )));
        }
        if connection.schema().contains(name) {
            return Err(DatabaseError::InvalidSchema(format!(
                "Table {name} already exists"
            )));
        }

        Ok(Self {
            connection,
            attachment: Attachment::default(),
            definition: TableDefinition::new(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn column(
        mut self,
        name: &str,
        column_type: ColumnType,
        not_null: bool,
    ) -> Result<Self, DatabaseError> {
        check_new_column(&self.definition, name)?;
        self.definition
            .columns
            .push(ColumnDefinition::new(name, column_type, !not_null));
        Ok(self)
    }

    /// A single or composite primary key
    pub fn primary_key<C: Into<IndexedColumn>>(
        mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> Result<Self, DatabaseError> {
        self.check_no_primary_key()?;

        let columns: Vec<IndexedColumn> = columns.into_iter().map(Into::into).collect();
        check_indexable(&self.definition, "primary key", &columns)?;

        self.definition.primary_key = Some(PrimaryKey::Columns(columns));
        Ok(self)
    }

    /// Make integer column `column` an auto-incrementing primary key.
    pub fn auto_increment_primary_key(mut self, column: &str) -> Result<Self, DatabaseError> {
        self.check_no_primary_key()?;

        match self.definition.column_mut(column) {
            Some(definition) if definition.column_type == ColumnType::Integer => {
                definition.nullable = false;
            }
            Some(definition) => {
                return Err(DatabaseError::InvalidSchema(format!(
                    "Auto-increment key {column} must be an integer column, not {}",
                    definition.column_type
                )));
            }
            None => {
                return Err(DatabaseError::InvalidSchema(format!(
                    "Primary key column {column} is not a column of {}",
                    self.definition.name
                )));
            }
        }

        self.definition.primary_key = Some(PrimaryKey::AutoIncrement(column.to_string()));
        Ok(self)
    }

    /// Add a foreign key. The referenced table must already exist (or be this table).
    pub fn foreign_key(mut self, foreign_key: ForeignKeySpec) -> Result<Self, DatabaseError> {
        check_relation_name(&self.definition, &foreign_key.name)?;

        if foreign_key.local_columns.is_empty() {
            return Err(DatabaseError::InvalidSchema(format!(
                "Foreign key {} has no local columns",
                foreign_key.name
            )));
        }
        if foreign_key.local_columns.len() != foreign_key.remote_columns.len() {
            return Err(DatabaseError::InvalidSchema(format!(
                "Foreign key {} has {} local but {} remote columns",
                foreign_key.name,
                foreign_key.local_columns.len(),
                foreign_key.remote_columns.len()
            )));
        }
        if let Some(missing) = foreign_key
            .local_columns
            .iter()
            .find(|column| self.definition.column(column).is_none())
        {
            return Err(DatabaseError::InvalidSchema(format!(
                "Foreign key {}: {missing} is not a column of {}",
                foreign_key.name, self.definition.name
            )));
        }

        let (remote_table, remote_columns) = foreign_key.remote_table()?;
        let remote = if remote_table == self.definition.name {
            self.definition.clone()
        } else {
            self.connection
                .table(remote_table)
                .map_err(|_| {
                    DatabaseError::InvalidSchema(format!(
                        "Foreign key {} references unknown table {remote_table}",
                        foreign_key.name
                    ))
                })?
                .definition()
                .clone()
        };
        if let Some(missing) = remote_columns.iter().find(|c| remote.column(c).is_none()) {
            return Err(DatabaseError::InvalidSchema(format!(
                "Foreign key {} references unknown column {remote_table}.{missing}",
                foreign_key.name
            )));
        }

        self.definition.foreign_keys.push(foreign_key);
        Ok(self)
    }

    pub fn index(mut self, index: IndexSpec) -> Result<Self, DatabaseError> {
        check_index(&self.definition, &index)?;
        self.definition.indexes.push(index);
        Ok(self)
    }

    /// The `create table` statement followed by one `create index` statement per index
    pub fn to_sql(&self) -> Result<Vec<String>, DatabaseError> {
        if self.definition.columns.is_empty() {
            return Err(DatabaseError::InvalidSchema(format!(
                "Table {} has no columns",
                self.definition.name
            )));
        }

        let mut statements = vec![creation_sql(&self.definition)?];
        statements.extend(
            self.definition
                .indexes
                .iter()
                .map(|index| index_creation_sql(&self.definition.name, index)),
        );
        Ok(statements)
    }

    /// The statements that record this table in the catalog tables
    pub fn catalog_sql(&self) -> Result<Vec<String>, DatabaseError> {
        catalog_table::insert_table(&self.connection.name(), &self.definition)
    }

    fn check_no_primary_key(&self) -> Result<(), DatabaseError> {
        match &self.definition.primary_key {
            Some(_) => Err(DatabaseError::InvalidSchema(format!(
                "Table {} already has a primary key",
                self.definition.name
            ))),
            None => Ok(()),
        }
    }
}

attachable_query!(TableBuilder);

impl Query for TableBuilder {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        let mut statements = self.to_sql()?;
        statements.extend(self.catalog_sql()?);
        Ok(statements)
    }

    fn catalog_changes(&self) -> Vec<CatalogChange> {
        vec![CatalogChange::Table {
            name: self.definition.name.clone(),
            definition: Some(self.definition.clone()),
        }]
    }

    fn alters_schema(&self) -> bool {
        true
    }
}

pub(super) fn check_new_column(definition: &TableDefinition, name: &str) -> Result<(), DatabaseError> {
    if !is_valid_name(name) {
        return Err(DatabaseError::InvalidSchema(format!(
            "Invalid column name '{name}'"
        )));
    }
    if definition.column(name).is_some() {
        return Err(DatabaseError::InvalidSchema(format!(
            "Duplicate column {name} in table {}",
            definition.name
        )));
    }
    Ok(())
}

/// Foreign keys and indexes of one table share a namespace.
fn check_relation_name(definition: &TableDefinition, name: &str) -> Result<(), DatabaseError> {
    if !is_valid_name(name) {
        return Err(DatabaseError::InvalidSchema(format!(
            "Invalid constraint or index name '{name}'"
        )));
    }

    let taken = definition.foreign_keys.iter().any(|fk| fk.name == name)
        || definition.indexes.iter().any(|index| index.name == name);
    if taken {
        return Err(DatabaseError::InvalidSchema(format!(
            "Table {} already has a key or index named {name}",
            definition.name
        )));
    }
    Ok(())
}

fn check_indexable(
    definition: &TableDefinition,
    what: &str,
    columns: &[IndexedColumn],
) -> Result<(), DatabaseError> {
    if columns.is_empty() {
        return Err(DatabaseError::InvalidSchema(format!(
            "The {what} of {} has no columns",
            definition.name
        )));
    }

    for indexed in columns {
        match definition.column(&indexed.name) {
            Some(column) if column.column_type.is_indexable() => {}
            Some(column) => {
                return Err(DatabaseError::InvalidSchema(format!(
                    "Column {} of type {} cannot be part of the {what}",
                    indexed.name, column.column_type
                )));
            }
            None => {
                return Err(DatabaseError::InvalidSchema(format!(
                    "The {what} names unknown column {} of {}",
                    indexed.name, definition.name
                )));
            }
        }
    }
    Ok(())
}

pub(super) fn check_index(definition: &TableDefinition, index: &IndexSpec) -> Result<(), DatabaseError> {
    check_relation_name(definition, &index.name)?;
    check_indexable(definition, &format!("index {}", index.name), &index.columns)
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(super) fn column_sql(column: &ColumnDefinition, auto_increment: bool) -> String {
    let mut sql = format!("{} {}", column.name, column.column_type.sql_type());
    if auto_increment {
        sql.push_str(" primary key autoincrement");
    } else if !column.nullable {
        sql.push_str(" not null");
    }
    sql
}

pub(super) fn creation_sql(definition: &TableDefinition) -> Result<String, DatabaseError> {
    let auto_increment = match &definition.primary_key {
        Some(PrimaryKey::AutoIncrement(column)) => Some(column.as_str()),
        _ => None,
    };

    let mut elements: Vec<String> = definition
        .columns
        .iter()
        .map(|column| column_sql(column, auto_increment == Some(column.name.as_str())))
        .collect();

    if let Some(PrimaryKey::Columns(columns)) = &definition.primary_key {
        elements.push(format!("primary key({})", join(columns)));
    }

    for foreign_key in &definition.foreign_keys {
        let (remote_table, remote_columns) = foreign_key.remote_table()?;
        let mut element = format!(
            "constraint {} foreign key({}) references {remote_table}({}) on delete {}",
            foreign_key.name,
            join(&foreign_key.local_columns),
            join(&remote_columns),
            foreign_key.action
        );
        if foreign_key.timing == super::ForeignKeyTiming::Deferrable {
            element.push_str(" deferrable initially deferred");
        }
        elements.push(element);
    }

    Ok(format!(
        "create table {}({})",
        definition.name,
        elements.join(", ")
    ))
}

pub(super) fn index_creation_sql(table: &str, index: &IndexSpec) -> String {
    format!(
        "create {}index {} on {table}({})",
        if index.unique { "unique " } else { "" },
        index.name,
        join(&index.columns)
    )
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;
    use crate::schema::{ForeignKeyAction, ForeignKeyTiming};
    use crate::sql::test_util::test_connection;

    fn baz() -> TableBuilder {
        test_connection()
            .create_table("baz")
            .unwrap()
            .column("id", ColumnType::Integer, false)
            .unwrap()
            .column("name", ColumnType::String, true)
            .unwrap()
            .column("foo_id", ColumnType::Number, false)
            .unwrap()
            .column("data", ColumnType::Object, false)
            .unwrap()
    }

    #[multiplatform_test]
    fn create_table_statements() {
        let builder = baz()
            .primary_key(["id", "name"])
            .unwrap()
            .foreign_key(
                ForeignKeySpec::new("fk_foo", ["foo_id"], ["foo.id"])
                    .with_action(ForeignKeyAction::Cascade)
                    .with_timing(ForeignKeyTiming::Deferrable),
            )
            .unwrap()
            .index(IndexSpec::new("baz_name", [IndexedColumn::desc("name")], true))
            .unwrap();

        insta::assert_snapshot!(builder.to_sql().unwrap().join("\n"), @r"
        create table baz(id integer not null, name text, foo_id real not null, data text not null, primary key(id, name), constraint fk_foo foreign key(foo_id) references foo(id) on delete cascade deferrable initially deferred)
        create unique index baz_name on baz(name desc)
        ");

        let catalog = builder.catalog_sql().unwrap();
        assert_eq!(
            catalog[0],
            r#"insert into "$rdb_table"(name, db) values('baz', 'test')"#
        );
        // table, 4 columns, key, foreign key, index
        assert_eq!(catalog.len(), 8);
        assert_eq!(builder.statements().unwrap().len(), 10);
    }

    #[multiplatform_test]
    fn auto_increment() {
        let builder = baz().auto_increment_primary_key("id").unwrap();
        assert!(
            builder.to_sql().unwrap()[0]
                .starts_with("create table baz(id integer primary key autoincrement, name text,")
        );

        assert!(matches!(
            baz().auto_increment_primary_key("foo_id"),
            Err(DatabaseError::InvalidSchema(_))
        ));
        assert!(matches!(
            baz()
                .auto_increment_primary_key("id")
                .unwrap()
                .primary_key(["name"]),
            Err(DatabaseError::InvalidSchema(_))
        ));
    }

    #[multiplatform_test]
    fn invalid_declarations() {
        let invalid = |result: Result<TableBuilder, DatabaseError>| {
            matches!(result, Err(DatabaseError::InvalidSchema(_)))
        };

        assert!(invalid(test_connection().create_table("foo")));
        assert!(invalid(test_connection().create_table("$rdb_table")));
        assert!(invalid(baz().column("name", ColumnType::Date, false)));
        assert!(invalid(baz().column("1st", ColumnType::Date, false)));
        assert!(invalid(baz().primary_key(["data"])));
        assert!(invalid(baz().primary_key(Vec::<&str>::new())));
        assert!(invalid(baz().index(IndexSpec::new("by_data", ["data"], false))));
        assert!(invalid(baz().index(IndexSpec::new("by_nothing", Vec::<&str>::new(), false))));
        assert!(invalid(
            baz().foreign_key(ForeignKeySpec::new("fk", ["foo_id"], ["missing.id"]))
        ));
        assert!(invalid(
            baz().foreign_key(ForeignKeySpec::new("fk", ["foo_id"], ["foo.nope"]))
        ));
        assert!(invalid(baz().foreign_key(ForeignKeySpec::new(
            "fk",
            ["foo_id", "id"],
            ["foo.id", "bar.id"]
        ))));
        assert!(invalid(
            baz().foreign_key(ForeignKeySpec::new("fk", Vec::<&str>::new(), Vec::<&str>::new()))
        ));
    }

    #[multiplatform_test]
    fn self_reference() {
        let builder = baz()
            .foreign_key(ForeignKeySpec::new("parent", ["foo_id"], ["baz.id"]))
            .unwrap();
        assert!(builder.to_sql().unwrap()[0].contains(
            "constraint parent foreign key(foo_id) references baz(id) on delete restrict)"
        ));
    }
}
