// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::TransactionBehavior;
use tracing::{debug, error, instrument};

use crate::database_error::DatabaseError;

use super::{SqlEngine, SqlRow, SqlValue};

/// A [`SqlEngine`] over one SQLite connection. Work runs on the blocking thread pool, one
/// call at a time.
#[derive(Clone)]
pub struct SqliteEngine {
    connection: Arc<Mutex<Option<rusqlite::Connection>>>,
}

impl SqliteEngine {
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let connection = rusqlite::Connection::open_in_memory()?;
        debug!("Opened in-memory SQLite database");
        Ok(Self::new(connection))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let connection = rusqlite::Connection::open(path.as_ref())?;
        debug!("Opened SQLite database at {}", path.as_ref().display());
        Ok(Self::new(connection))
    }

    fn new(connection: rusqlite::Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(Some(connection))),
        }
    }

    async fn with_connection<T, F>(&self, func: F) -> Result<T, DatabaseError>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = connection.lock().unwrap_or_else(PoisonError::into_inner);
            let connection = guard
                .as_mut()
                .ok_or_else(|| DatabaseError::TransactionState("Database is closed".into()))?;
            func(connection)
        })
        .await?
    }
}

/// Run `sql`, collecting rows if it produces any.
fn query_rows(connection: &rusqlite::Connection, sql: &str) -> Result<Vec<SqlRow>, DatabaseError> {
    debug!("Executing: {sql}");
    let mut statement = connection.prepare(sql)?;

    if statement.column_count() == 0 {
        statement.execute([])?;
        return Ok(vec![]);
    }

    let names: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let rows = statement.query_map([], |row| {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Ok((name.clone(), SqlValue::from(row.get_ref(i)?))))
            .collect::<Result<SqlRow, rusqlite::Error>>()
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    async fn get(&self, sql: &str) -> Result<Vec<SqlRow>, DatabaseError> {
        let sql = sql.to_string();
        self.with_connection(move |connection| query_rows(connection, &sql))
            .await
    }

    #[instrument(name = "SqliteEngine::run", skip_all)]
    async fn run(&self, statements: &[String]) -> Result<Vec<Vec<SqlRow>>, DatabaseError> {
        let statements = statements.to_vec();

        self.with_connection(move |connection| {
            let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut results = Vec::with_capacity(statements.len());

            for sql in &statements {
                match query_rows(&transaction, sql) {
                    Ok(rows) => results.push(rows),
                    Err(e) => {
                        error!("Statement failed, rolling back: {sql}: {e}");
                        transaction.rollback()?;
                        return Err(e);
                    }
                }
            }

            transaction.commit()?;
            Ok(results)
        })
        .await
    }

    async fn exec(&self, sql: &str) -> Result<(), DatabaseError> {
        let sql = sql.to_string();
        self.with_connection(move |connection| {
            debug!("Executing: {sql}");
            connection.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let taken = connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match taken {
                Some(connection) => connection.close().map_err(|(_, e)| DatabaseError::from(e)),
                None => Ok(()),
            }
        })
        .await?
    }

    fn supports_transactional_schema_change(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn statements_and_rows() {
        let engine = SqliteEngine::open_in_memory().unwrap();

        engine
            .exec("create table t(a integer, b text)")
            .await
            .unwrap();
        let results = engine
            .run(&[
                "insert into t(a,b) values(1,'x')".to_string(),
                "select a, b from t".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_empty());
        assert_eq!(results[1][0]["a"], SqlValue::Integer(1));
        assert_eq!(results[1][0]["b"], SqlValue::Text("x".into()));
    }

    #[test_log::test(tokio::test)]
    async fn failed_run_rolls_back() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .exec("create table t(a integer primary key)")
            .await
            .unwrap();

        let result = engine
            .run(&[
                "insert into t(a) values(1)".to_string(),
                "insert into t(a) values(1)".to_string(),
            ])
            .await;
        assert!(matches!(result, Err(DatabaseError::Delegate(_))));

        let rows = engine.get("select count(*) as n from t").await.unwrap();
        assert_eq!(rows[0]["n"], SqlValue::Integer(0));

        // The connection is usable again
        engine.exec("insert into t(a) values(2)").await.unwrap();
    }

    #[tokio::test]
    async fn closed_engine() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine.close().await.unwrap();

        assert!(matches!(
            engine.get("select 1").await,
            Err(DatabaseError::TransactionState(_))
        ));
    }
}
