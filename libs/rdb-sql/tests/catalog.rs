// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;

use std::sync::Arc;

use rdb_sql::{
    ColumnType, Connection, ConnectionOptions, DatabaseError, ForeignKeyAction, IndexSpec,
    PrimaryKey, SqlEngine, SqliteEngine, Value, row,
};

use common::{create_person, create_pet, open_temporary};

fn persistent(dir: &tempfile::TempDir) -> ConnectionOptions {
    ConnectionOptions::persistent("shop", dir.path().join("shop.db"))
}

#[tokio::test]
async fn catalog_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let (person_definition, pet_definition) = {
        let connection = Connection::open(persistent(&dir)).await.unwrap();
        let person = create_person(&connection).await.unwrap();
        let pet = create_pet(&connection).await.unwrap();

        connection
            .insert()
            .into(&person)
            .unwrap()
            .values(row([("name", "Ann")]))
            .unwrap()
            .commit()
            .await
            .unwrap();
        connection.set_version(3).commit().await.unwrap();
        connection.close().await.unwrap();

        (person.definition().clone(), pet.definition().clone())
    };

    let connection = Connection::open(persistent(&dir)).await.unwrap();
    let schema = connection.schema();
    assert_eq!(schema.name(), "shop");
    assert_eq!(schema.version(), 3);
    assert_eq!(schema.table_names(), vec!["person", "pet"]);

    let person = connection.table("person").unwrap();
    let pet = connection.table("pet").unwrap();
    assert_eq!(person.definition(), &person_definition);
    assert_eq!(pet.definition(), &pet_definition);
    assert_eq!(
        person.primary_key(),
        Some(&PrimaryKey::AutoIncrement("id".into()))
    );
    assert_eq!(pet.foreign_keys()[0].action, ForeignKeyAction::Cascade);
    assert!(person.indexes()[0].unique);

    let rows = connection
        .select([&person.column("name").unwrap()])
        .from([&person])
        .unwrap()
        .commit()
        .await
        .unwrap();
    assert_eq!(rows, vec![row([("name", "Ann")])]);
}

#[tokio::test]
async fn reserved_tables_are_not_user_tables() {
    let connection = open_temporary().await;
    assert!(connection.schema().table_names().is_empty());
    assert!(matches!(
        connection.create_table("$rdb_table"),
        Err(DatabaseError::InvalidSchema(_))
    ));

    create_person(&connection).await.unwrap();
    assert!(matches!(
        connection.create_table("person"),
        Err(DatabaseError::InvalidSchema(_))
    ));
}

#[tokio::test]
async fn alter_table() {
    let dir = tempfile::tempdir().unwrap();
    let connection = Connection::open(persistent(&dir)).await.unwrap();
    let person = create_person(&connection).await.unwrap();
    create_pet(&connection).await.unwrap();

    connection
        .insert()
        .into(&person)
        .unwrap()
        .values(row([("name", "Ann")]))
        .unwrap()
        .commit()
        .await
        .unwrap();

    assert!(matches!(
        connection
            .alter_table(&person)
            .add_column("nick", ColumnType::String, true, None),
        Err(DatabaseError::InvalidSchema(_))
    ));
    assert!(matches!(
        connection.alter_table(&person).drop_column("age"),
        Err(DatabaseError::Unsupported(_))
    ));
    assert!(matches!(
        connection.alter_table(&person).to_sql(),
        Err(DatabaseError::Syntax(_))
    ));

    connection
        .alter_table(&person)
        .add_column("nick", ColumnType::String, true, Some(Value::from("none")))
        .unwrap()
        .add_index(IndexSpec::new("person_age", ["age"], false))
        .unwrap()
        .drop_index("person_name")
        .unwrap()
        .commit()
        .await
        .unwrap();

    let person = connection.table("person").unwrap();
    assert_eq!(person.column("nick").unwrap().column_type(), ColumnType::String);
    assert_eq!(
        person.indexes().iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        vec!["person_age"]
    );

    let nicks = connection
        .select([&person.column("nick").unwrap()])
        .from([&person])
        .unwrap()
        .commit()
        .await
        .unwrap();
    assert_eq!(nicks, vec![row([("nick", "none")])]);

    connection
        .alter_table(&person)
        .rename("people")
        .unwrap()
        .commit()
        .await
        .unwrap();
    assert!(!connection.schema().contains("person"));
    let people = connection.table("people").unwrap();
    assert_eq!(people.columns().len(), 6);
    assert_eq!(
        connection.table("pet").unwrap().foreign_keys()[0].remote_columns,
        vec!["people.id"]
    );

    connection.close().await.unwrap();
    let reopened = Connection::open(persistent(&dir)).await.unwrap();
    assert_eq!(reopened.schema().table_names(), vec!["people", "pet"]);
    assert_eq!(reopened.table("people").unwrap().definition(), people.definition());
    assert_eq!(
        reopened.table("pet").unwrap().foreign_keys()[0].remote_columns,
        vec!["people.id"]
    );
}

#[tokio::test]
async fn drop_table() {
    let dir = tempfile::tempdir().unwrap();
    let connection = Connection::open(persistent(&dir)).await.unwrap();
    create_person(&connection).await.unwrap();
    let pet = create_pet(&connection).await.unwrap();

    connection.drop_table(&pet).commit().await.unwrap();
    assert_eq!(connection.schema().table_names(), vec!["person"]);
    assert!(matches!(
        connection.select_all().from([&pet]).unwrap().commit().await,
        Err(DatabaseError::Delegate(_))
    ));

    connection.close().await.unwrap();
    let reopened = Connection::open(persistent(&dir)).await.unwrap();
    assert_eq!(reopened.schema().table_names(), vec!["person"]);
}

#[tokio::test]
async fn partial_catalog_is_corruption() {
    let engine = Arc::new(SqliteEngine::open_in_memory().unwrap());
    engine
        .exec("create table \"$rdb_version\"(name text, version integer)")
        .await
        .unwrap();

    let err = Connection::open_with_engine(engine, ConnectionOptions::temporary("shop"))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), DatabaseError::Data(_)));
}

#[tokio::test]
async fn dangling_catalog_rows_are_corruption() {
    let dir = tempfile::tempdir().unwrap();
    {
        let connection = Connection::open(persistent(&dir)).await.unwrap();
        create_person(&connection).await.unwrap();
        connection.close().await.unwrap();
    }

    let engine = SqliteEngine::open(dir.path().join("shop.db")).unwrap();
    engine
        .exec("delete from \"$rdb_table\" where name='person'")
        .await
        .unwrap();
    engine.close().await.unwrap();

    let err = Connection::open(persistent(&dir)).await.unwrap_err();
    assert!(matches!(err.root(), DatabaseError::Data(_)));
}

#[tokio::test]
async fn databases_share_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let shop = Connection::open(persistent(&dir)).await.unwrap();
    create_person(&shop).await.unwrap();
    shop.close().await.unwrap();

    let other = Connection::open(ConnectionOptions::persistent(
        "warehouse",
        dir.path().join("shop.db"),
    ))
    .await
    .unwrap();
    assert_eq!(other.schema().version(), 0);
    assert!(other.schema().table_names().is_empty());
}
