// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use indexmap::IndexMap;
use tracing::{info, instrument};

use crate::database_error::{DatabaseError, WithContext};
use crate::engine::{SqlEngine, SqlValue};

use super::catalog_table::{self, RESERVED_TABLES, Relation};
use super::{Schema, TableDefinition};

const LIST_TABLES: &str = "select name from sqlite_master where type='table'";

/// Load the schema of database `name`, creating the catalog tables on first use.
///
/// The catalog is either entirely absent (a new store) or entirely present; anything in
/// between is reported as corruption.
#[instrument(name = "bootstrap", skip(engine))]
pub(crate) async fn bootstrap(engine: &dyn SqlEngine, name: &str) -> Result<Schema, DatabaseError> {
    let tables = engine.get(LIST_TABLES).await?;
    let present = tables
        .iter()
        .filter_map(|row| row.get("name").and_then(SqlValue::as_str))
        .filter(|table| RESERVED_TABLES.contains(table))
        .count();

    match present {
        0 => {
            info!("Creating catalog for database {name}");
            let mut statements = catalog_table::create_statements();
            statements.push(catalog_table::insert_version(name, 0));
            engine.run(&statements).await?;
            Ok(Schema::new(name, 0))
        }
        n if n == RESERVED_TABLES.len() => scan(engine, name)
            .await
            .with_context(format!("Reading catalog of database {name}:")),
        n => Err(DatabaseError::Data(format!(
            "Catalog is corrupted: found {n} of the {} reserved tables",
            RESERVED_TABLES.len()
        ))),
    }
}

/// Rebuild every table from the catalog rows: tables, then their columns, then keys and
/// indexes (which may refer to any table).
async fn scan(engine: &dyn SqlEngine, name: &str) -> Result<Schema, DatabaseError> {
    let version = match engine.get(&catalog_table::select_version(name)).await?.first() {
        Some(row) => row.get("version").and_then(SqlValue::as_i64).ok_or_else(|| {
            DatabaseError::Data(format!("Corrupted version row for database {name}"))
        })?,
        None => {
            info!("No version recorded for database {name}, starting at 0");
            engine.exec(&catalog_table::insert_version(name, 0)).await?;
            0
        }
    };

    let mut definitions: IndexMap<String, TableDefinition> = IndexMap::new();

    for row in engine.get(&catalog_table::select_tables(name)).await? {
        let table = catalog_table::decode_table_name(&row)?;
        definitions.insert(table.clone(), TableDefinition::new(table));
    }

    for row in engine.get(&catalog_table::select_columns(name)).await? {
        let (table, column) = catalog_table::decode_column(&row)?;
        definitions
            .get_mut(&table)
            .ok_or_else(|| {
                DatabaseError::Data(format!("Column {} belongs to unknown table {table}", column.name))
            })?
            .columns
            .push(column);
    }

    for row in engine.get(&catalog_table::select_relations(name)).await? {
        let (table, relation) = catalog_table::decode_relation(&row)?;

        if let Relation::ForeignKey(foreign_key) = &relation {
            let (remote_table, remote_columns) = foreign_key.remote_table()?;
            let remote = definitions.get(remote_table).ok_or_else(|| {
                DatabaseError::Data(format!(
                    "Foreign key {} references unknown table {remote_table}",
                    foreign_key.name
                ))
            })?;
            if let Some(missing) = remote_columns.iter().find(|c| remote.column(c).is_none()) {
                return Err(DatabaseError::Data(format!(
                    "Foreign key {} references unknown column {remote_table}.{missing}",
                    foreign_key.name
                )));
            }
        }

        let definition = definitions.get_mut(&table).ok_or_else(|| {
            DatabaseError::Data(format!("Key or index of unknown table {table}"))
        })?;
        match relation {
            Relation::PrimaryKey(primary_key) => definition.primary_key = Some(primary_key),
            Relation::ForeignKey(foreign_key) => definition.foreign_keys.push(foreign_key),
            Relation::Index(index) => definition.indexes.push(index),
        }
    }

    info!(
        "Loaded {} table(s) of database {name} at version {version}",
        definitions.len()
    );

    let mut schema = Schema::new(name, version);
    for (table, definition) in definitions {
        schema.report_table_change(&table, Some(definition));
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SqlRow;
    use crate::engine::test_util::RecordingEngine;

    fn names(names: &[&str]) -> Vec<SqlRow> {
        names
            .iter()
            .map(|name| SqlRow::from([("name".to_string(), SqlValue::from(*name))]))
            .collect()
    }

    #[tokio::test]
    async fn fresh_catalog() {
        let engine = RecordingEngine::default();
        engine.respond(LIST_TABLES, names(&["unrelated"]));

        let schema = bootstrap(&engine, "db").await.unwrap();
        assert_eq!(schema.version(), 0);
        assert!(schema.table_names().is_empty());

        let statements = engine.statements();
        assert_eq!(statements[1], "begin");
        assert!(statements[2].starts_with(r#"create table "$rdb_version""#));
        assert_eq!(
            statements[6],
            r#"insert into "$rdb_version"(name, version) values('db', 0)"#
        );
        assert_eq!(statements[7], "commit");
    }

    #[tokio::test]
    async fn partial_catalog_is_corrupt() {
        let engine = RecordingEngine::default();
        engine.respond(LIST_TABLES, names(&["$rdb_version", "$rdb_table"]));

        assert!(matches!(
            bootstrap(&engine, "db").await,
            Err(DatabaseError::Data(_))
        ));
        assert_eq!(engine.statements(), vec![LIST_TABLES]);
    }

    #[test_log::test(tokio::test)]
    async fn scan_existing_catalog() {
        let engine = RecordingEngine::default();
        engine.respond(LIST_TABLES, names(&RESERVED_TABLES));
        engine.respond(
            &catalog_table::select_version("db"),
            vec![SqlRow::from([("version".to_string(), SqlValue::from(4_i64))])],
        );
        engine.respond(&catalog_table::select_tables("db"), names(&["foo", "bar"]));
        engine.respond(
            &catalog_table::select_columns("db"),
            [("id", "foo", "number", 1_i64), ("id", "bar", "integer", 1), ("foo_id", "bar", "number", 0)]
                .into_iter()
                .map(|(name, table, column_type, nnull)| {
                    SqlRow::from([
                        ("name".to_string(), SqlValue::from(name)),
                        ("tbl".to_string(), SqlValue::from(table)),
                        ("type".to_string(), SqlValue::from(column_type)),
                        ("nnull".to_string(), SqlValue::from(nnull)),
                    ])
                })
                .collect(),
        );
        // The foreign key of bar is listed before the key of foo it references
        engine.respond(
            &catalog_table::select_relations("db"),
            [
                ("fk_foo", "bar", "fk", r#"["foo_id"]"#, r#"["foo.id"]"#, "restrict,immediate"),
                ("$pk", "foo", "pk", r#"[{"name":"id","order":"asc"}]"#, "", ""),
            ]
            .into_iter()
            .map(|(name, table, kind, columns, reference, attr)| {
                SqlRow::from([
                    ("name".to_string(), SqlValue::from(name)),
                    ("tbl".to_string(), SqlValue::from(table)),
                    ("type".to_string(), SqlValue::from(kind)),
                    ("columns".to_string(), SqlValue::from(columns)),
                    ("ref".to_string(), SqlValue::from(reference)),
                    ("attr".to_string(), SqlValue::from(attr)),
                ])
            })
            .collect(),
        );

        let schema = bootstrap(&engine, "db").await.unwrap();

        assert_eq!(schema.version(), 4);
        assert_eq!(schema.table_names(), vec!["bar", "foo"]);
        let bar = schema.table("bar").unwrap();
        assert_eq!(bar.columns().len(), 2);
        assert!(bar.column("foo_id").unwrap().is_nullable());
        assert_eq!(bar.foreign_keys()[0].remote_columns, vec!["foo.id"]);
        assert_eq!(
            schema.table("foo").unwrap().primary_key().unwrap().column_names(),
            vec!["id"]
        );
    }

    #[tokio::test]
    async fn missing_version_row() {
        let engine = RecordingEngine::default();
        engine.respond(LIST_TABLES, names(&RESERVED_TABLES));

        let schema = bootstrap(&engine, "other").await.unwrap();
        assert_eq!(schema.version(), 0);
        assert!(
            engine
                .statements()
                .contains(&catalog_table::insert_version("other", 0))
        );
    }
}
