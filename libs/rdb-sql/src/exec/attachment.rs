// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::Connection;
use crate::database_error::DatabaseError;
use crate::value::Row;

use super::{ExecutionContext, Query};

/// An execution context that several query builders can attach to
pub type SharedExecutionContext = Arc<Mutex<ExecutionContext>>;

/// The context a builder was attached to and the position of its rows in that context's results.
///
/// A clone of a builder starts out detached.
#[derive(Debug, Default)]
pub(crate) struct Attachment(Option<(SharedExecutionContext, usize)>);

impl Clone for Attachment {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl Attachment {
    /// Stage `query` in `context` and return the resulting attachment.
    pub(crate) async fn stage(
        &self,
        context: &SharedExecutionContext,
        query: &dyn Query,
    ) -> Result<Self, DatabaseError> {
        if self.0.is_some() {
            return Err(DatabaseError::TransactionState(
                "The query is already attached to an execution context".into(),
            ));
        }

        let index = context.lock().await.stage(query)?;
        Ok(Self(Some((context.clone(), index))))
    }

    /// Commit the attached context and return this query's rows, or run `query` in an implicit
    /// context of its own when detached.
    pub(crate) async fn commit(
        &self,
        connection: &Connection,
        query: &dyn Query,
    ) -> Result<Vec<Row>, DatabaseError> {
        match &self.0 {
            None => connection.commit_query(query).await,
            Some((context, index)) => {
                let mut results = context.lock().await.commit().await?;
                Ok(if *index < results.len() {
                    results.swap_remove(*index)
                } else {
                    vec![]
                })
            }
        }
    }

    /// Roll back the attached context. Nothing to do when detached.
    pub(crate) async fn rollback(&self) -> Result<(), DatabaseError> {
        match &self.0 {
            None => {
                debug!("Rollback of a detached query");
                Ok(())
            }
            Some((context, _)) => context.lock().await.rollback(),
        }
    }
}

/// Adds `attach`, `commit` and `rollback` to a query builder with `connection` and `attachment`
/// fields.
macro_rules! attachable_query {
    ($query:ty) => {
        impl $query {
            /// Stage this query in `context`. [`Self::commit`] then commits that whole context and
            /// [`Self::rollback`] rolls it back.
            pub async fn attach(
                &mut self,
                context: &$crate::exec::SharedExecutionContext,
            ) -> Result<(), $crate::DatabaseError> {
                let attachment = self.attachment.stage(context, &*self).await?;
                self.attachment = attachment;
                Ok(())
            }

            /// Run this query (in its attached context, if any) and return its rows.
            pub async fn commit(&self) -> Result<Vec<$crate::Row>, $crate::DatabaseError> {
                self.attachment.commit(&self.connection, self).await
            }

            /// Roll back the attached context. A no-op for a detached query.
            pub async fn rollback(&self) -> Result<(), $crate::DatabaseError> {
                self.attachment.rollback().await
            }
        }
    };
}

pub(crate) use attachable_query;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_util::RecordingEngine;
    use crate::sql::test_util::{foo_table, test_connection_with};
    use crate::value::row;

    #[tokio::test]
    async fn attached_queries_share_one_batch() {
        let engine = Arc::new(RecordingEngine::default());
        let connection = test_connection_with(engine.clone());
        let foo = foo_table();
        let context = connection.create_context();

        let mut insert = connection
            .insert()
            .into(&foo)
            .unwrap()
            .values(row([("id", 1)]))
            .unwrap();
        let mut select = connection.select_all().from([&foo]).unwrap();
        insert.attach(&context).await.unwrap();
        select.attach(&context).await.unwrap();
        assert_eq!(context.lock().await.statements().len(), 2);

        assert!(matches!(
            insert.attach(&context).await,
            Err(DatabaseError::TransactionState(_))
        ));
        // A clone is detached, so it can go elsewhere
        insert.clone().attach(&connection.create_context()).await.unwrap();

        select.commit().await.unwrap();
        let statements = engine.statements();
        assert_eq!(statements.first().unwrap(), "begin");
        assert!(statements[1].starts_with("insert into foo("));
        assert_eq!(statements[2], "select * from foo");
        assert_eq!(statements.last().unwrap(), "commit");

        assert!(context.lock().await.is_finalized());
        assert!(matches!(
            insert.commit().await,
            Err(DatabaseError::TransactionState(_))
        ));
    }

    #[tokio::test]
    async fn rollback_through_an_attached_query() {
        let engine = Arc::new(RecordingEngine::default());
        let connection = test_connection_with(engine.clone());
        let foo = foo_table();

        let detached = connection.drop_table(&foo);
        detached.rollback().await.unwrap();

        let context = connection.create_context();
        let mut drop = connection.drop_table(&foo);
        drop.attach(&context).await.unwrap();
        drop.rollback().await.unwrap();

        assert!(context.lock().await.is_finalized());
        assert!(connection.schema().contains("foo"));
        assert!(engine.statements().is_empty());
        assert!(matches!(
            drop.commit().await,
            Err(DatabaseError::TransactionState(_))
        ));
    }
}
