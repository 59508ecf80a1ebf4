// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::connection::Connection;
use crate::database_error::DatabaseError;
use crate::exec::{Attachment, Query, attachable_query};
use crate::schema::TableSchema;
use crate::value::Value;

use super::{BinderMap, BoundValues, ExpressionBuilder, LogicalPredicate, SQLBuilder};

/// `delete from <table> [where <predicate>]`
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    connection: Connection,
    table: Option<TableSchema>,
    predicate: Option<LogicalPredicate>,
    bound_values: BoundValues,
    attachment: Attachment,
}

impl DeleteQuery {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            table: None,
            predicate: None,
            bound_values: BoundValues::default(),
        }
    }

    pub fn from(mut self, table: &TableSchema) -> Result<Self, DatabaseError> {
        if self.table.is_some() {
            return Err(DatabaseError::Syntax("from() has already been called".into()));
        }
        self.table = Some(table.clone());
        Ok(self)
    }

    pub fn filter(mut self, predicate: LogicalPredicate) -> Result<Self, DatabaseError> {
        if self.predicate.is_some() {
            return Err(DatabaseError::Syntax("filter() has already been called".into()));
        }
        predicate.check_operands(self.connection.codec())?;
        self.predicate = Some(predicate);
        Ok(self)
    }

    pub fn bind(
        mut self,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Self, DatabaseError> {
        let values = values.into_iter().map(Into::into).collect();
        self.bound_values = BoundValues::bind(&self.binders(), values)?;
        Ok(self)
    }

    pub fn binders(&self) -> BinderMap {
        let mut binders = BinderMap::new();
        if let Some(predicate) = &self.predicate {
            predicate.collect_binders(&mut binders);
        }
        binders
    }

    pub fn to_sql(&self) -> Result<Vec<String>, DatabaseError> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| DatabaseError::Syntax("delete requires from()".into()))?;

        let mut builder = SQLBuilder::new(self.connection.codec(), &self.bound_values);
        builder.push_str("delete from ");
        builder.push_str(table.name());
        if let Some(alias) = table.alias() {
            builder.push_str(" as ");
            builder.push_str(alias);
        }
        if let Some(predicate) = &self.predicate {
            builder.push_str(" where ");
            predicate.build(&mut builder);
        }

        Ok(vec![builder.into_checked_sql()?])
    }
}

attachable_query!(DeleteQuery);

impl Query for DeleteQuery {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        self.bound_values.ensure_complete(&self.binders())?;
        self.to_sql()
    }
}
