// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use rdb_sql::{
    ColumnType, Connection, ConnectionOptions, DatabaseError, ForeignKeyAction, ForeignKeySpec,
    IndexSpec, TableSchema,
};

pub async fn open_temporary() -> Connection {
    Connection::open(ConnectionOptions::temporary("shop"))
        .await
        .unwrap()
}

/// `person(id integer autoincrement, name string not null, age number, born date, active boolean)`
pub async fn create_person(connection: &Connection) -> Result<TableSchema, DatabaseError> {
    connection
        .create_table("person")?
        .column("id", ColumnType::Integer, true)?
        .column("name", ColumnType::String, true)?
        .column("age", ColumnType::Number, false)?
        .column("born", ColumnType::Date, false)?
        .column("active", ColumnType::Boolean, false)?
        .auto_increment_primary_key("id")?
        .index(IndexSpec::new("person_name", ["name"], true))?
        .commit()
        .await?;
    connection.table("person")
}

/// `pet(owner integer, label string, tags object, photo blob)` keyed by `(owner, label)`
pub async fn create_pet(connection: &Connection) -> Result<TableSchema, DatabaseError> {
    connection
        .create_table("pet")?
        .column("owner", ColumnType::Integer, true)?
        .column("label", ColumnType::String, true)?
        .column("tags", ColumnType::Object, false)?
        .column("photo", ColumnType::Blob, false)?
        .primary_key(["owner", "label"])?
        .foreign_key(
            ForeignKeySpec::new("pet_owner", ["owner"], ["person.id"])
                .with_action(ForeignKeyAction::Cascade),
        )?
        .commit()
        .await?;
    connection.table("pet")
}
