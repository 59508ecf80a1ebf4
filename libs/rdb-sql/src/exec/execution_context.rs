// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{debug, error, instrument};

use crate::connection::Connection;
use crate::database_error::DatabaseError;
use crate::value::Row;

use super::{CatalogChange, Query, ResultDecoder};

/// A staged query: where its statements end in the batch and how to decode its rows
#[derive(Debug)]
struct StagedQuery {
    last_statement: Option<usize>,
    decoder: ResultDecoder,
}

/// An ordered batch of statements, plus the catalog changes they make, that commits
/// atomically or not at all.
///
/// Catalog changes reach the connection's schema only after a successful commit. A context
/// can be committed or rolled back once; after that it accepts nothing. Committing fails while
/// a transaction is in flight on the connection.
#[derive(Debug)]
pub struct ExecutionContext {
    connection: Connection,
    statements: Vec<String>,
    staged: Vec<StagedQuery>,
    pending: Vec<CatalogChange>,
    finalized: bool,
}

impl ExecutionContext {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            statements: vec![],
            staged: vec![],
            pending: vec![],
            finalized: false,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Append the statements of `query` to the batch. Returns the position of its rows in the
    /// results of [`Self::commit`].
    pub fn stage(&mut self, query: &dyn Query) -> Result<usize, DatabaseError> {
        self.ensure_open()?;

        let statements = query.statements()?;
        self.statements.extend(statements);
        self.staged.push(StagedQuery {
            last_statement: self.statements.len().checked_sub(1),
            decoder: query.decoder(),
        });
        self.pending.extend(query.catalog_changes());
        Ok(self.staged.len() - 1)
    }

    /// Record catalog changes made by statements that already ran in an open engine transaction.
    pub(crate) fn record(&mut self, changes: Vec<CatalogChange>) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.pending.extend(changes);
        Ok(())
    }

    /// Run the batch inside one engine transaction and return the decoded rows of each staged
    /// query (the rows of its last statement).
    #[instrument(name = "ExecutionContext::commit", skip_all)]
    pub async fn commit(&mut self) -> Result<Vec<Vec<Row>>, DatabaseError> {
        self.ensure_open()?;
        let _guard = self.connection.acquire()?;
        self.finalized = true;

        let mut results = if self.statements.is_empty() {
            vec![]
        } else {
            debug!("Committing {} statement(s)", self.statements.len());
            self.connection
                .engine()
                .run(&self.statements)
                .await
                .inspect_err(|e| error!("Commit failed: {e}"))?
        };

        self.apply_pending();

        self.staged
            .iter()
            .map(|staged| {
                let rows = staged
                    .last_statement
                    .and_then(|i| results.get_mut(i))
                    .map(std::mem::take)
                    .unwrap_or_default();
                staged.decoder.decode(rows)
            })
            .collect()
    }

    /// Apply the recorded catalog changes after the enclosing engine transaction committed.
    pub(crate) fn finish(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.finalized = true;
        self.apply_pending();
        Ok(())
    }

    /// Discard the batch and its catalog changes.
    pub fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.finalized = true;
        self.statements.clear();
        self.staged.clear();
        if !self.pending.is_empty() {
            debug!("Discarding {} catalog change(s)", self.pending.len());
        }
        self.pending.clear();
        Ok(())
    }

    fn apply_pending(&mut self) {
        let changes = std::mem::take(&mut self.pending);
        self.connection.apply_catalog_changes(changes);
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.finalized {
            Err(DatabaseError::TransactionState(
                "The execution context has already been committed or rolled back".into(),
            ))
        } else {
            Ok(())
        }
    }
}
