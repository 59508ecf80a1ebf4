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
use crate::schema::{ColumnSchema, TableSchema};
use crate::value::Value;

use super::{
    BinderMap, BinderUse, BoundValues, ExpressionBuilder, LogicalPredicate, Operand, SQLBuilder,
};

/// `update <table> set <column>=<value>, ... [where <predicate>]`
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    connection: Connection,
    table: TableSchema,
    assignments: Vec<(ColumnSchema, Operand)>,
    predicate: Option<LogicalPredicate>,
    bound_values: BoundValues,
    attachment: Attachment,
}

impl UpdateQuery {
    pub(crate) fn new(connection: Connection, table: &TableSchema) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            table: table.clone(),
            assignments: vec![],
            predicate: None,
            bound_values: BoundValues::default(),
        }
    }

    /// Assign `value` to `column`, which must belong to the updated table.
    pub fn set(
        mut self,
        column: &ColumnSchema,
        value: impl Into<Operand>,
    ) -> Result<Self, DatabaseError> {
        if column.table_name() != self.table.name() {
            return Err(DatabaseError::Syntax(format!(
                "Cannot assign {} in an update of {}",
                column.full_name(),
                self.table.name()
            )));
        }

        let value = value.into();
        if let Operand::Value(value) = &value {
            self.connection
                .codec()
                .to_literal(value, column.column_type())?;
        }

        self.assignments.push((column.clone(), value));
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

        for (column, value) in &self.assignments {
            if let Operand::Binder(binder) = value {
                binders.insert(binder.index(), BinderUse::Scalar(column.column_type()));
            }
        }
        if let Some(predicate) = &self.predicate {
            predicate.collect_binders(&mut binders);
        }

        binders
    }

    pub fn to_sql(&self) -> Result<Vec<String>, DatabaseError> {
        if self.assignments.is_empty() {
            return Err(DatabaseError::Syntax("update requires at least one set()".into()));
        }

        let mut builder = SQLBuilder::new(self.connection.codec(), &self.bound_values);
        self.build(&mut builder);
        Ok(vec![builder.into_checked_sql()?])
    }
}

impl ExpressionBuilder for UpdateQuery {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("update ");
        builder.push_str(self.table.name());
        if let Some(alias) = self.table.alias() {
            builder.push_str(" as ");
            builder.push_str(alias);
        }

        builder.push_str(" set ");
        builder.push_iter(self.assignments.iter(), ", ", |builder, (column, value)| {
            builder.without_fully_qualified_column_names(|builder| column.build(builder));
            builder.push('=');
            match value {
                Operand::Value(value) => builder.push_literal(value, column.column_type()),
                Operand::Column(other) => other.build(builder),
                Operand::Binder(binder) => builder.push_binder(binder, column.column_type()),
            }
        });

        if let Some(predicate) = &self.predicate {
            builder.push_str(" where ");
            predicate.build(builder);
        }
    }
}

attachable_query!(UpdateQuery);

impl Query for UpdateQuery {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        self.bound_values.ensure_complete(&self.binders())?;
        self.to_sql()
    }
}
