// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The schema catalog: table definitions, their persistence in the reserved `$rdb_*` tables,
//! and the DDL builders that change them.

mod bootstrap;
mod catalog;
pub(crate) mod catalog_table;
mod column_type;
mod drop_table;
mod set_version;
mod table;
mod table_builder;
mod table_changer;

pub(crate) use bootstrap::bootstrap;
pub use catalog::{Schema, TableId};
pub use column_type::ColumnType;
pub use drop_table::DropTableQuery;
pub use set_version::SetVersionQuery;
pub use table::{
    ColumnDefinition, ColumnSchema, ForeignKeyAction, ForeignKeySpec, ForeignKeyTiming,
    IndexSpec, IndexedColumn, PrimaryKey, TableDefinition, TableSchema, is_valid_name,
};
pub use table_builder::TableBuilder;
pub use table_changer::TableChanger;
