// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, instrument};

use crate::config::{ConnectionOptions, Storage};
use crate::database_error::DatabaseError;
use crate::engine::{SqlEngine, SqliteEngine};
use crate::exec::{
    CatalogChange, ExecutionContext, Query, SharedExecutionContext, Transaction, TransactionMode,
};
use crate::schema::{
    DropTableQuery, Schema, SetVersionQuery, TableBuilder, TableChanger, TableSchema, bootstrap,
};
use crate::sql::{DeleteQuery, FunctionProvider, InsertQuery, Projection, SelectQuery, UpdateQuery};
use crate::value::Row;
use crate::value::codec::ValueCodec;

struct ConnectionInner {
    engine: Arc<dyn SqlEngine>,
    schema: RwLock<Schema>,
    codec: ValueCodec,
    in_flight: AtomicBool,
}

/// A handle to one open database and its schema catalog.
///
/// Clones share the engine and the catalog. Every builder starts here.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name())
            .field("codec", &self.inner.codec)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open (or create) the database described by `options` on the SQLite engine.
    pub async fn open(options: ConnectionOptions) -> Result<Self, DatabaseError> {
        let engine = match &options.storage {
            Storage::Temporary => SqliteEngine::open_in_memory()?,
            Storage::Persistent(path) => SqliteEngine::open(path)?,
        };
        Self::open_with_engine(Arc::new(engine), options).await
    }

    /// Open the database over an existing engine, creating the catalog tables if the store is
    /// empty and reading the catalog otherwise.
    #[instrument(name = "Connection::open", skip_all, fields(name = %options.name))]
    pub async fn open_with_engine(
        engine: Arc<dyn SqlEngine>,
        options: ConnectionOptions,
    ) -> Result<Self, DatabaseError> {
        if options.foreign_keys {
            debug!("pragma foreign_keys=on");
            engine.exec("pragma foreign_keys=on").await?;
        }

        let schema = bootstrap(engine.as_ref(), &options.name).await?;
        Ok(Self::from_parts(
            engine,
            schema,
            ValueCodec::new(options.literal_quoting),
        ))
    }

    pub(crate) fn from_parts(engine: Arc<dyn SqlEngine>, schema: Schema, codec: ValueCodec) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                engine,
                schema: RwLock::new(schema),
                codec,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Close the underlying engine. Every clone of this connection becomes unusable.
    pub async fn close(&self) -> Result<(), DatabaseError> {
        let _guard = self.acquire()?;
        self.inner.engine.close().await
    }

    pub fn name(&self) -> String {
        self.read_schema(|schema| schema.name().to_string())
    }

    /// A snapshot of the catalog as of the last successful commit
    pub fn schema(&self) -> Schema {
        self.read_schema(Schema::clone)
    }

    pub fn table(&self, name: &str) -> Result<TableSchema, DatabaseError> {
        self.read_schema(|schema| schema.table(name))
    }

    pub fn codec(&self) -> ValueCodec {
        self.inner.codec
    }

    pub fn fns(&self) -> FunctionProvider {
        FunctionProvider::default()
    }

    pub fn select<P: Into<Projection>>(
        &self,
        projections: impl IntoIterator<Item = P>,
    ) -> SelectQuery {
        SelectQuery::new(
            self.clone(),
            projections.into_iter().map(Into::into).collect(),
        )
    }

    /// `select *`
    pub fn select_all(&self) -> SelectQuery {
        SelectQuery::new(self.clone(), vec![])
    }

    pub fn insert(&self) -> InsertQuery {
        InsertQuery::new(self.clone(), false)
    }

    /// `insert or replace`; the target table must have a primary key
    pub fn insert_or_replace(&self) -> InsertQuery {
        InsertQuery::new(self.clone(), true)
    }

    pub fn update(&self, table: &TableSchema) -> UpdateQuery {
        UpdateQuery::new(self.clone(), table)
    }

    pub fn delete(&self) -> DeleteQuery {
        DeleteQuery::new(self.clone())
    }

    pub fn create_table(&self, name: &str) -> Result<TableBuilder, DatabaseError> {
        TableBuilder::new(self.clone(), name)
    }

    pub fn alter_table(&self, table: &TableSchema) -> TableChanger {
        TableChanger::new(self.clone(), table)
    }

    pub fn drop_table(&self, table: &TableSchema) -> DropTableQuery {
        DropTableQuery::new(self.clone(), table)
    }

    pub fn set_version(&self, version: i64) -> SetVersionQuery {
        SetVersionQuery::new(self.clone(), version)
    }

    /// An empty execution context that query builders can [attach](SelectQuery::attach) to
    pub fn create_context(&self) -> SharedExecutionContext {
        Arc::new(tokio::sync::Mutex::new(ExecutionContext::new(self.clone())))
    }

    pub fn begin_transaction(&self, mode: TransactionMode) -> Transaction {
        Transaction::new(self.clone(), mode)
    }

    pub(crate) fn engine(&self) -> &dyn SqlEngine {
        self.inner.engine.as_ref()
    }

    /// Claim the connection for one transaction. Fails if another is in flight.
    pub(crate) fn acquire(&self) -> Result<InFlightGuard, DatabaseError> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                DatabaseError::TransactionState(
                    "Another transaction is in flight on this connection".into(),
                )
            })?;
        Ok(InFlightGuard {
            inner: Some(self.inner.clone()),
        })
    }

    /// Publish committed catalog changes in one step.
    pub(crate) fn apply_catalog_changes(&self, changes: Vec<CatalogChange>) {
        if changes.is_empty() {
            return;
        }

        let mut schema = self
            .inner
            .schema
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for change in changes {
            match change {
                CatalogChange::Table { name, definition } => {
                    debug!("Catalog change for table {name}");
                    schema.report_table_change(&name, definition);
                }
                CatalogChange::Version(version) => schema.set_version(version),
            }
        }
    }

    /// Run one query in its own execution context and return its rows.
    pub(crate) async fn commit_query(&self, query: &dyn Query) -> Result<Vec<Row>, DatabaseError> {
        let mut context = ExecutionContext::new(self.clone());
        context.stage(query)?;
        Ok(context.commit().await?.pop().unwrap_or_default())
    }

    fn read_schema<T>(&self, f: impl FnOnce(&Schema) -> T) -> T {
        let schema = self
            .inner
            .schema
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&schema)
    }
}

/// Marks the connection busy until dropped
pub(crate) struct InFlightGuard {
    inner: Option<Arc<ConnectionInner>>,
}

impl InFlightGuard {
    /// Release the guard but leave the connection marked busy. Used when an engine transaction
    /// could not be closed, so nothing else may start one.
    pub(crate) fn keep_busy(mut self) {
        self.inner = None;
    }
}

impl fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InFlightGuard")
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(inner) = &self.inner {
            inner.in_flight.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::test_util::RecordingEngine;
    use crate::sql::test_util::{foo_table, test_connection, test_connection_with};

    #[tokio::test]
    async fn open_creates_catalog() {
        let engine = Arc::new(RecordingEngine::default());
        let connection = Connection::open_with_engine(
            engine.clone(),
            ConnectionOptions::temporary("orders"),
        )
        .await
        .unwrap();

        assert_eq!(connection.name(), "orders");
        assert_eq!(connection.schema().version(), 0);
        assert!(connection.schema().table_names().is_empty());

        let statements = engine.statements();
        assert_eq!(statements[0], "pragma foreign_keys=on");
        assert!(statements.iter().any(|s| s.contains("create table \"$rdb_table\"")));
    }

    #[tokio::test]
    async fn foreign_keys_pragma_is_optional() {
        let engine = Arc::new(RecordingEngine::default());
        Connection::open_with_engine(
            engine.clone(),
            ConnectionOptions::temporary("orders").with_foreign_keys(false),
        )
        .await
        .unwrap();

        assert!(!engine.statements().iter().any(|s| s.starts_with("pragma")));
    }

    #[tokio::test]
    async fn single_query_commit() {
        let engine = Arc::new(RecordingEngine::default());
        let connection = test_connection_with(engine.clone());

        connection.drop_table(&foo_table()).commit().await.unwrap();

        assert!(!connection.schema().contains("foo"));
        assert!(matches!(
            connection.table("foo"),
            Err(DatabaseError::Syntax(_))
        ));
        let statements = engine.statements();
        assert_eq!(statements[0], "begin");
        assert_eq!(statements[1], "drop table foo");
        assert_eq!(statements.last().unwrap(), "commit");
    }

    #[tokio::test]
    async fn clones_share_catalog() {
        let connection = test_connection();
        let other = connection.clone();

        let snapshot = connection.schema();
        other.set_version(3).commit().await.unwrap();

        assert_eq!(connection.schema().version(), 3);
        assert_eq!(snapshot.version(), 0);
    }

    #[tokio::test]
    async fn close_releases_engine() {
        let engine = Arc::new(RecordingEngine::default());
        let connection = test_connection_with(engine.clone());
        connection.close().await.unwrap();
        assert_eq!(engine.statements(), vec!["close".to_string()]);
    }
}
