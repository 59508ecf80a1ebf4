// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.


/// An embedded relational data-access layer over SQLite.
///
/// A [Connection] owns a schema catalog that lives in the database itself, in the reserved
/// `$rdb_version`, `$rdb_table`, `$rdb_column` and `$rdb_relation` tables. Opening a connection
/// either creates those tables or reads them back into a [Schema], from which applications get
/// [TableSchema] handles.
///
/// Queries are built with chainable builders ([SelectQuery], [InsertQuery], [UpdateQuery],
/// [DeleteQuery], [TableBuilder], [TableChanger], [DropTableQuery], [SetVersionQuery]) that
/// compile to SQL text synchronously. Predicates are trees of [LogicalPredicate]s built from
/// [ColumnSchema] comparisons, and may hold [BindableValue] placeholders that are filled in
/// later with `bind`.
///
/// Execution always goes through an [ExecutionContext]: calling `commit` on a builder runs it
/// in a context of its own, while a [Transaction] runs several queries atomically, either all at
/// once or incrementally. Catalog changes made by schema-altering queries reach the in-memory
/// [Schema] only after the enclosing transaction commits.
mod config;
mod connection;
mod database_error;
pub mod engine;
mod exec;
pub mod schema;
pub mod sql;
pub mod value;

pub use config::{
    ConnectionOptions, DATABASE_NAME_PARAM, DATABASE_PATH_PARAM, FOREIGN_KEYS_PARAM,
    LITERAL_QUOTING_PARAM, Storage,
};
pub use connection::Connection;
pub use database_error::{DatabaseError, WithContext};
pub use engine::{SqlEngine, SqlRow, SqlValue, SqliteEngine};
pub use exec::{
    CatalogChange, ExecutionContext, Query, ResultDecoder, SharedExecutionContext, Transaction,
    TransactionMode,
};
pub use schema::{
    ColumnDefinition, ColumnSchema, ColumnType, DropTableQuery, ForeignKeyAction,
    ForeignKeySpec, ForeignKeyTiming, IndexSpec, IndexedColumn, PrimaryKey, Schema,
    SetVersionQuery, TableBuilder, TableChanger, TableDefinition, TableSchema,
};
pub use sql::{
    BindableValue, Count, DeleteQuery, FunctionProvider, InsertQuery, IntoCount,
    LogicalPredicate, Projection, SelectQuery, SortOrder, UpdateQuery,
};
pub use value::codec::{LiteralQuoting, ValueCodec};
pub use value::{Row, Value, row};
