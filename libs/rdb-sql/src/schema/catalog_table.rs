// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Reading and writing the reserved catalog tables that persist table definitions:
//!
//! - `$rdb_version(name, version)`: one row per database
//! - `$rdb_table(name, db)`: one row per table
//! - `$rdb_column(name, db, tbl, type, nnull)`: one row per column, in declaration order
//! - `$rdb_relation(name, db, tbl, type, columns, ref, attr)`: one row per primary key, foreign
//!   key and index. `columns` and `ref` hold JSON arrays.

use serde::{Serialize, de::DeserializeOwned};

use crate::database_error::DatabaseError;
use crate::engine::{SqlRow, SqlValue};
use crate::value::codec::LiteralQuoting;

use super::{
    ColumnDefinition, ColumnType, ForeignKeySpec, IndexSpec, IndexedColumn, PrimaryKey,
    TableDefinition,
};

pub(crate) const VERSION_TABLE: &str = "$rdb_version";
pub(crate) const TABLE_TABLE: &str = "$rdb_table";
pub(crate) const COLUMN_TABLE: &str = "$rdb_column";
pub(crate) const RELATION_TABLE: &str = "$rdb_relation";

pub(crate) const RESERVED_TABLES: [&str; 4] =
    [VERSION_TABLE, TABLE_TABLE, COLUMN_TABLE, RELATION_TABLE];

const PRIMARY_KEY_RELATION: &str = "pk";
const FOREIGN_KEY_RELATION: &str = "fk";
const INDEX_RELATION: &str = "index";

/// Relation name of a table's primary key row. Not a valid user name, so it cannot collide with
/// an index or foreign key.
const PRIMARY_KEY_NAME: &str = "$pk";

const AUTO_INCREMENT: &str = "autoInc";
const UNIQUE: &str = "unique";

fn ident(table: &str) -> String {
    format!("\"{table}\"")
}

/// Catalog rows are always written with single-quoted literals, independent of the
/// connection's quoting style.
fn text(s: &str) -> String {
    LiteralQuoting::Single.quote(s)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value)
        .map_err(|e| DatabaseError::Data(format!("Cannot serialize catalog entry: {e}")))
}

fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(json)
        .map_err(|e| DatabaseError::Data(format!("Corrupted catalog entry '{json}': {e}")))
}

pub(crate) fn create_statements() -> Vec<String> {
    vec![
        format!(
            "create table {}(name text, version integer)",
            ident(VERSION_TABLE)
        ),
        format!(
            "create table {}(name text, db text, primary key(name, db))",
            ident(TABLE_TABLE)
        ),
        format!(
            "create table {}(name text, db text, tbl text, type text, nnull integer, \
             primary key(name, tbl, db))",
            ident(COLUMN_TABLE)
        ),
        format!(
            "create table {}(name text, db text, tbl text, type text, columns text, ref text, \
             attr text, primary key(name, tbl, db))",
            ident(RELATION_TABLE)
        ),
    ]
}

pub(crate) fn insert_version(db: &str, version: i64) -> String {
    format!(
        "insert into {}(name, version) values({}, {version})",
        ident(VERSION_TABLE),
        text(db)
    )
}

pub(crate) fn update_version(db: &str, version: i64) -> String {
    format!(
        "update {} set version={version} where name={}",
        ident(VERSION_TABLE),
        text(db)
    )
}

pub(crate) fn select_version(db: &str) -> String {
    format!(
        "select version from {} where name={}",
        ident(VERSION_TABLE),
        text(db)
    )
}

pub(crate) fn select_tables(db: &str) -> String {
    format!(
        "select name from {} where db={} order by rowid",
        ident(TABLE_TABLE),
        text(db)
    )
}

pub(crate) fn select_columns(db: &str) -> String {
    format!(
        "select name, tbl, type, nnull from {} where db={} order by rowid",
        ident(COLUMN_TABLE),
        text(db)
    )
}

pub(crate) fn select_relations(db: &str) -> String {
    format!(
        "select name, tbl, type, columns, ref, attr from {} where db={} order by rowid",
        ident(RELATION_TABLE),
        text(db)
    )
}

/// All rows describing `definition`
pub(crate) fn insert_table(db: &str, definition: &TableDefinition) -> Result<Vec<String>, DatabaseError> {
    let table = &definition.name;
    let mut statements = vec![format!(
        "insert into {}(name, db) values({}, {})",
        ident(TABLE_TABLE),
        text(table),
        text(db)
    )];

    statements.extend(
        definition
            .columns
            .iter()
            .map(|column| insert_column(db, table, column)),
    );

    if let Some(primary_key) = &definition.primary_key {
        statements.push(insert_primary_key(db, table, primary_key)?);
    }
    for foreign_key in &definition.foreign_keys {
        statements.push(insert_foreign_key(db, table, foreign_key)?);
    }
    for index in &definition.indexes {
        statements.push(insert_index(db, table, index)?);
    }

    Ok(statements)
}

pub(crate) fn insert_column(db: &str, table: &str, column: &ColumnDefinition) -> String {
    format!(
        "insert into {}(name, db, tbl, type, nnull) values({}, {}, {}, {}, {})",
        ident(COLUMN_TABLE),
        text(&column.name),
        text(db),
        text(table),
        text(column.column_type.name()),
        if column.nullable { 0 } else { 1 }
    )
}

fn insert_relation(
    db: &str,
    table: &str,
    name: &str,
    kind: &str,
    columns: &str,
    reference: &str,
    attr: &str,
) -> String {
    format!(
        "insert into {}(name, db, tbl, type, columns, ref, attr) values({}, {}, {}, {}, {}, {}, {})",
        ident(RELATION_TABLE),
        text(name),
        text(db),
        text(table),
        text(kind),
        text(columns),
        text(reference),
        text(attr)
    )
}

fn insert_primary_key(
    db: &str,
    table: &str,
    primary_key: &PrimaryKey,
) -> Result<String, DatabaseError> {
    let (columns, attr) = match primary_key {
        PrimaryKey::Columns(columns) => (to_json(columns)?, ""),
        PrimaryKey::AutoIncrement(column) => {
            (to_json(&[IndexedColumn::asc(column.as_str())])?, AUTO_INCREMENT)
        }
    };
    Ok(insert_relation(
        db,
        table,
        PRIMARY_KEY_NAME,
        PRIMARY_KEY_RELATION,
        &columns,
        "",
        attr,
    ))
}

pub(crate) fn insert_foreign_key(
    db: &str,
    table: &str,
    foreign_key: &ForeignKeySpec,
) -> Result<String, DatabaseError> {
    Ok(insert_relation(
        db,
        table,
        &foreign_key.name,
        FOREIGN_KEY_RELATION,
        &to_json(&foreign_key.local_columns)?,
        &to_json(&foreign_key.remote_columns)?,
        &format!("{},{}", foreign_key.action, foreign_key.timing),
    ))
}

pub(crate) fn insert_index(db: &str, table: &str, index: &IndexSpec) -> Result<String, DatabaseError> {
    Ok(insert_relation(
        db,
        table,
        &index.name,
        INDEX_RELATION,
        &to_json(&index.columns)?,
        "",
        if index.unique { UNIQUE } else { "" },
    ))
}

pub(crate) fn delete_relation(db: &str, table: &str, name: &str) -> String {
    format!(
        "delete from {} where name={} and tbl={} and db={}",
        ident(RELATION_TABLE),
        text(name),
        text(table),
        text(db)
    )
}

/// Remove every row describing `table`
pub(crate) fn delete_table(db: &str, table: &str) -> Vec<String> {
    let mut statements = vec![format!(
        "delete from {} where name={} and db={}",
        ident(TABLE_TABLE),
        text(table),
        text(db)
    )];
    statements.extend([COLUMN_TABLE, RELATION_TABLE].map(|catalog| {
        format!(
            "delete from {} where tbl={} and db={}",
            ident(catalog),
            text(table),
            text(db)
        )
    }));
    statements
}

pub(crate) fn rename_table(db: &str, from: &str, to: &str) -> Vec<String> {
    let mut statements = vec![format!(
        "update {} set name={} where name={} and db={}",
        ident(TABLE_TABLE),
        text(to),
        text(from),
        text(db)
    )];
    statements.extend([COLUMN_TABLE, RELATION_TABLE].map(|catalog| {
        format!(
            "update {} set tbl={} where tbl={} and db={}",
            ident(catalog),
            text(to),
            text(from),
            text(db)
        )
    }));
    statements
}

/// A primary key, foreign key or index read back from `$rdb_relation`
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Relation {
    PrimaryKey(PrimaryKey),
    ForeignKey(ForeignKeySpec),
    Index(IndexSpec),
}

fn required<'a>(row: &'a SqlRow, column: &str) -> Result<&'a str, DatabaseError> {
    row.get(column).and_then(SqlValue::as_str).ok_or_else(|| {
        DatabaseError::Data(format!("Corrupted catalog row: missing '{column}' in {row:?}"))
    })
}

pub(crate) fn decode_table_name(row: &SqlRow) -> Result<String, DatabaseError> {
    required(row, "name").map(str::to_string)
}

/// Decode a `$rdb_column` row into its table name and column
pub(crate) fn decode_column(row: &SqlRow) -> Result<(String, ColumnDefinition), DatabaseError> {
    let name = required(row, "name")?;
    let table = required(row, "tbl")?;
    let column_type: ColumnType = required(row, "type")?.parse()?;
    let not_null = row
        .get("nnull")
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| DatabaseError::Data(format!("Corrupted catalog row: {row:?}")))?;

    Ok((
        table.to_string(),
        ColumnDefinition::new(name, column_type, not_null == 0),
    ))
}

/// Decode a `$rdb_relation` row into its table name and relation
pub(crate) fn decode_relation(row: &SqlRow) -> Result<(String, Relation), DatabaseError> {
    let name = required(row, "name")?;
    let table = required(row, "tbl")?;
    let columns = required(row, "columns")?;
    let attr = required(row, "attr")?;

    let relation = match required(row, "type")? {
        PRIMARY_KEY_RELATION => {
            let columns: Vec<IndexedColumn> = from_json(columns)?;
            match (attr, columns.as_slice()) {
                (AUTO_INCREMENT, [column]) => {
                    Relation::PrimaryKey(PrimaryKey::AutoIncrement(column.name.clone()))
                }
                (AUTO_INCREMENT, _) => {
                    return Err(DatabaseError::Data(format!(
                        "Corrupted catalog: auto-increment key of {table} has {} columns",
                        columns.len()
                    )));
                }
                _ => Relation::PrimaryKey(PrimaryKey::Columns(columns)),
            }
        }
        FOREIGN_KEY_RELATION => {
            let (action, timing) = attr.split_once(',').ok_or_else(|| {
                DatabaseError::Data(format!("Corrupted catalog: foreign key attributes '{attr}'"))
            })?;
            Relation::ForeignKey(ForeignKeySpec {
                name: name.to_string(),
                local_columns: from_json(columns)?,
                remote_columns: from_json(required(row, "ref")?)?,
                action: action.parse()?,
                timing: timing.parse()?,
            })
        }
        INDEX_RELATION => Relation::Index(IndexSpec {
            name: name.to_string(),
            columns: from_json(columns)?,
            unique: attr == UNIQUE,
        }),
        other => {
            return Err(DatabaseError::Data(format!(
                "Corrupted catalog: unknown relation type '{other}'"
            )));
        }
    };

    Ok((table.to_string(), relation))
}
