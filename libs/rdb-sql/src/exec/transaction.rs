// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{debug, error, instrument, warn};

use crate::connection::{Connection, InFlightGuard};
use crate::database_error::DatabaseError;
use crate::value::Row;

use super::{ExecutionContext, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl TransactionMode {
    fn begin_statement(self) -> &'static str {
        match self {
            TransactionMode::ReadOnly => "begin deferred transaction",
            TransactionMode::ReadWrite => "begin immediate transaction",
        }
    }
}

#[derive(Debug)]
enum TransactionState {
    NotStarted,
    /// An engine transaction is open. The guard keeps other transactions off the connection.
    Started {
        context: ExecutionContext,
        guard: InFlightGuard,
    },
    Finalized,
}

/// A unit of work against a connection, run either all at once ([`Transaction::exec`]) or
/// incrementally ([`Transaction::begin`], [`Transaction::attach`], then [`Transaction::commit`]
/// or [`Transaction::rollback`]).
///
/// Only one transaction may be in flight per connection. Schema changes made inside the
/// transaction reach the connection's catalog only when it commits.
#[derive(Debug)]
pub struct Transaction {
    connection: Connection,
    mode: TransactionMode,
    state: TransactionState,
    results: Vec<Vec<Row>>,
}

impl Transaction {
    pub(crate) fn new(connection: Connection, mode: TransactionMode) -> Self {
        Self {
            connection,
            mode,
            state: TransactionState::NotStarted,
            results: vec![],
        }
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, TransactionState::Started { .. })
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, TransactionState::Finalized)
    }

    /// Rows produced so far, one entry per executed or attached query
    pub fn results(&self) -> &[Vec<Row>] {
        &self.results
    }

    /// Run all queries in one atomic batch and finalize the transaction.
    #[instrument(name = "Transaction::exec", skip_all)]
    pub async fn exec(&mut self, queries: &[&dyn Query]) -> Result<&[Vec<Row>], DatabaseError> {
        self.ensure_not_started("exec")?;
        self.state = TransactionState::Finalized;

        for query in queries {
            self.check_mode(*query)?;
        }

        let mut context = ExecutionContext::new(self.connection.clone());
        for query in queries {
            context.stage(*query)?;
        }
        self.results = context.commit().await?;
        Ok(&self.results)
    }

    /// Open the engine transaction for incremental use.
    #[instrument(name = "Transaction::begin", skip_all)]
    pub async fn begin(&mut self) -> Result<(), DatabaseError> {
        self.ensure_not_started("begin")?;

        let guard = self.connection.acquire()?;
        let statement = self.mode.begin_statement();
        debug!("{statement}");
        self.connection.engine().exec(statement).await?;

        self.state = TransactionState::Started {
            context: ExecutionContext::new(self.connection.clone()),
            guard,
        };
        Ok(())
    }

    /// Run the statements of `query` inside the open transaction and return its rows.
    ///
    /// A failing statement aborts the whole transaction.
    #[instrument(name = "Transaction::attach", skip_all)]
    pub async fn attach(&mut self, query: &dyn Query) -> Result<Vec<Row>, DatabaseError> {
        if !self.is_started() {
            return Err(DatabaseError::TransactionState(
                "attach() requires a transaction started with begin()".into(),
            ));
        }
        self.check_mode(query)?;
        if query.alters_schema() && !self.connection.engine().supports_transactional_schema_change()
        {
            return Err(DatabaseError::Unsupported(
                "The engine cannot change the schema inside a transaction".into(),
            ));
        }

        let statements = query.statements()?;

        let mut rows = vec![];
        for statement in &statements {
            debug!("Executing SQL operation: {statement}");
            match self.connection.engine().get(statement).await {
                Ok(result) => rows = result,
                Err(e) => {
                    error!("Failed to execute statement: {e}");
                    self.abort().await;
                    return Err(e);
                }
            }
        }

        if let TransactionState::Started { context, .. } = &mut self.state {
            context.record(query.catalog_changes())?;
        }

        let rows = query.decoder().decode(rows)?;
        self.results.push(rows.clone());
        Ok(rows)
    }

    /// Commit the open transaction and publish its schema changes.
    #[instrument(name = "Transaction::commit", skip_all)]
    pub async fn commit(&mut self) -> Result<(), DatabaseError> {
        let (mut context, guard) = self.take_started("commit")?;

        debug!("commit");
        if let Err(e) = self.connection.engine().exec("commit").await {
            error!("Failed to commit transaction: {e}");
            Self::rollback_engine(&self.connection).await;
            drop(guard);
            return Err(e);
        }

        let result = context.finish();
        drop(guard);
        result
    }

    /// Roll back the open transaction. Schema changes attached so far are discarded.
    #[instrument(name = "Transaction::rollback", skip_all)]
    pub async fn rollback(&mut self) -> Result<(), DatabaseError> {
        let (mut context, guard) = self.take_started("rollback")?;

        debug!("rollback");
        let result = self.connection.engine().exec("rollback").await;
        context.rollback()?;
        drop(guard);
        result
    }

    async fn abort(&mut self) {
        if let TransactionState::Started { mut context, guard } =
            std::mem::replace(&mut self.state, TransactionState::Finalized)
        {
            Self::rollback_engine(&self.connection).await;
            drop(guard);
            let _ = context.rollback();
        }
    }

    async fn rollback_engine(connection: &Connection) {
        if let Err(e) = connection.engine().exec("rollback").await {
            error!("Failed to roll back transaction: {e}");
        }
    }

    fn take_started(
        &mut self,
        operation: &str,
    ) -> Result<(ExecutionContext, InFlightGuard), DatabaseError> {
        match std::mem::replace(&mut self.state, TransactionState::Finalized) {
            TransactionState::Started { context, guard } => Ok((context, guard)),
            other => {
                let message = match other {
                    TransactionState::NotStarted => {
                        format!("{operation}() called before the transaction was started")
                    }
                    _ => format!("{operation}() called on a finalized transaction"),
                };
                self.state = other;
                Err(DatabaseError::TransactionState(message))
            }
        }
    }

    fn ensure_not_started(&self, operation: &str) -> Result<(), DatabaseError> {
        match self.state {
            TransactionState::NotStarted => Ok(()),
            TransactionState::Started { .. } => Err(DatabaseError::TransactionState(format!(
                "{operation}() called on a transaction that has already started"
            ))),
            TransactionState::Finalized => Err(DatabaseError::TransactionState(format!(
                "{operation}() called on a finalized transaction"
            ))),
        }
    }

    fn check_mode(&self, query: &dyn Query) -> Result<(), DatabaseError> {
        if self.mode == TransactionMode::ReadOnly && !query.is_read_only() {
            Err(DatabaseError::TransactionState(
                "A read-only transaction only accepts select queries".into(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let TransactionState::Started { guard, .. } =
            std::mem::replace(&mut self.state, TransactionState::Finalized)
        {
            warn!("Transaction dropped while still open; rolling back");
            let connection = self.connection.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        Self::rollback_engine(&connection).await;
                        drop(guard);
                    });
                }
                Err(_) => {
                    error!(
                        "No async runtime to roll back the dropped transaction; \
                         the connection stays busy"
                    );
                    guard.keep_busy();
                }
            }
        }
    }
}
