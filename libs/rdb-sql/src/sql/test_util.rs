// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::connection::Connection;
use crate::engine::test_util::RecordingEngine;
use crate::schema::{
    ColumnDefinition, ColumnType, ForeignKeySpec, IndexedColumn, PrimaryKey, Schema,
    TableDefinition, TableSchema,
};

/// `foo(id number not null primary key, name string, ts date, boolean boolean, pic blob)`
pub(crate) fn foo_definition() -> TableDefinition {
    TableDefinition {
        columns: vec![
            ColumnDefinition::new("id", ColumnType::Number, false),
            ColumnDefinition::new("name", ColumnType::String, true),
            ColumnDefinition::new("ts", ColumnType::Date, true),
            ColumnDefinition::new("boolean", ColumnType::Boolean, true),
            ColumnDefinition::new("pic", ColumnType::Blob, true),
        ],
        primary_key: Some(PrimaryKey::Columns(vec![IndexedColumn::asc("id")])),
        ..TableDefinition::new("foo")
    }
}

/// `bar(id integer autoincrement, label string, foo_id number references foo.id)`
pub(crate) fn bar_definition() -> TableDefinition {
    TableDefinition {
        columns: vec![
            ColumnDefinition::new("id", ColumnType::Integer, false),
            ColumnDefinition::new("label", ColumnType::String, true),
            ColumnDefinition::new("foo_id", ColumnType::Number, true),
        ],
        primary_key: Some(PrimaryKey::AutoIncrement("id".into())),
        foreign_keys: vec![ForeignKeySpec::new("fk_foo", ["foo_id"], ["foo.id"])],
        ..TableDefinition::new("bar")
    }
}

/// A table without a primary key
pub(crate) fn nopk_definition() -> TableDefinition {
    TableDefinition {
        columns: vec![ColumnDefinition::new("value", ColumnType::String, true)],
        ..TableDefinition::new("nopk")
    }
}

pub(crate) fn foo_table() -> TableSchema {
    TableSchema::new(Arc::new(foo_definition()))
}

pub(crate) fn bar_table() -> TableSchema {
    TableSchema::new(Arc::new(bar_definition()))
}

pub(crate) fn nopk_table() -> TableSchema {
    TableSchema::new(Arc::new(nopk_definition()))
}

pub(crate) fn test_schema() -> Schema {
    let mut schema = Schema::new("test", 0);
    for definition in [foo_definition(), bar_definition(), nopk_definition()] {
        let name = definition.name.clone();
        schema.report_table_change(&name, Some(definition));
    }
    schema
}

/// A connection over a [`RecordingEngine`] whose catalog already holds `foo`, `bar` and `nopk`
pub(crate) fn test_connection() -> Connection {
    test_connection_with(Arc::new(RecordingEngine::default()))
}

pub(crate) fn test_connection_with(engine: Arc<RecordingEngine>) -> Connection {
    Connection::from_parts(engine, test_schema(), Default::default())
}
