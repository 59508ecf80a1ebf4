// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;
use crate::schema::{ColumnSchema, ColumnType};

use super::{ExpressionBuilder, LogicalPredicate, Operand, SQLBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Avg,
    Count,
    Min,
    Max,
    Sum,
    Distinct,
}

impl AggregateFunction {
    fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Distinct => "distinct",
        }
    }
}

/// A projection computed by an aggregate function. It can be selected and aliased, but not
/// compared.
#[derive(Debug, Clone)]
pub struct AggregatedColumn {
    function: AggregateFunction,
    /// `None` for `count(*)`
    column: Option<ColumnSchema>,
    alias: Option<String>,
}

impl AggregatedColumn {
    fn new(function: AggregateFunction, column: Option<ColumnSchema>) -> Self {
        Self {
            function,
            column,
            alias: None,
        }
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }

    /// `avg(foo.id)`, `count(*)` or `distinct foo.name`
    pub fn full_name(&self) -> String {
        let argument = self
            .column
            .as_ref()
            .map(ColumnSchema::full_name)
            .unwrap_or_else(|| "*".to_string());

        match self.function {
            AggregateFunction::Distinct => format!("distinct {argument}"),
            function => format!("{}({argument})", function.name()),
        }
    }

    pub(crate) fn output_name(&self) -> String {
        match (&self.alias, self.function, &self.column) {
            (Some(alias), _, _) => alias.clone(),
            (None, AggregateFunction::Distinct, Some(column)) => column.name().to_string(),
            (None, _, _) => self.full_name(),
        }
    }

    pub(crate) fn result_type(&self) -> Option<ColumnType> {
        match self.function {
            AggregateFunction::Avg | AggregateFunction::Sum => Some(ColumnType::Number),
            AggregateFunction::Count => Some(ColumnType::Integer),
            AggregateFunction::Min | AggregateFunction::Max | AggregateFunction::Distinct => {
                self.column.as_ref().map(ColumnSchema::column_type)
            }
        }
    }

    fn not_comparable(&self) -> Result<LogicalPredicate, DatabaseError> {
        Err(DatabaseError::Syntax(format!(
            "Aggregated column {} cannot be used in a predicate",
            self.full_name()
        )))
    }

    pub fn eq(&self, _operand: impl Into<Operand>) -> Result<LogicalPredicate, DatabaseError> {
        self.not_comparable()
    }

    pub fn neq(&self, _operand: impl Into<Operand>) -> Result<LogicalPredicate, DatabaseError> {
        self.not_comparable()
    }

    pub fn lt(&self, _operand: impl Into<Operand>) -> Result<LogicalPredicate, DatabaseError> {
        self.not_comparable()
    }

    pub fn lte(&self, _operand: impl Into<Operand>) -> Result<LogicalPredicate, DatabaseError> {
        self.not_comparable()
    }

    pub fn gt(&self, _operand: impl Into<Operand>) -> Result<LogicalPredicate, DatabaseError> {
        self.not_comparable()
    }

    pub fn gte(&self, _operand: impl Into<Operand>) -> Result<LogicalPredicate, DatabaseError> {
        self.not_comparable()
    }
}

/// Builds aggregated columns and negated predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionProvider;

impl FunctionProvider {
    pub fn avg(&self, column: &ColumnSchema) -> Result<AggregatedColumn, DatabaseError> {
        Self::numeric(AggregateFunction::Avg, column)
    }

    pub fn sum(&self, column: &ColumnSchema) -> Result<AggregatedColumn, DatabaseError> {
        Self::numeric(AggregateFunction::Sum, column)
    }

    pub fn count(&self, column: &ColumnSchema) -> AggregatedColumn {
        AggregatedColumn::new(AggregateFunction::Count, Some(column.clone()))
    }

    /// `count(*)`
    pub fn count_all(&self) -> AggregatedColumn {
        AggregatedColumn::new(AggregateFunction::Count, None)
    }

    pub fn min(&self, column: &ColumnSchema) -> Result<AggregatedColumn, DatabaseError> {
        Self::ordered(AggregateFunction::Min, column)
    }

    pub fn max(&self, column: &ColumnSchema) -> Result<AggregatedColumn, DatabaseError> {
        Self::ordered(AggregateFunction::Max, column)
    }

    pub fn distinct(&self, column: &ColumnSchema) -> AggregatedColumn {
        AggregatedColumn::new(AggregateFunction::Distinct, Some(column.clone()))
    }

    pub fn not(&self, predicate: LogicalPredicate) -> LogicalPredicate {
        LogicalPredicate::negate(predicate)
    }

    fn numeric(
        function: AggregateFunction,
        column: &ColumnSchema,
    ) -> Result<AggregatedColumn, DatabaseError> {
        if column.column_type().is_numeric() {
            Ok(AggregatedColumn::new(function, Some(column.clone())))
        } else {
            Err(DatabaseError::Type(format!(
                "{}() requires a numeric column, {} is {}",
                function.name(),
                column.full_name(),
                column.column_type()
            )))
        }
    }

    fn ordered(
        function: AggregateFunction,
        column: &ColumnSchema,
    ) -> Result<AggregatedColumn, DatabaseError> {
        if column.column_type().is_ordered() {
            Ok(AggregatedColumn::new(function, Some(column.clone())))
        } else {
            Err(DatabaseError::Type(format!(
                "{}() is not defined for {} column {}",
                function.name(),
                column.column_type(),
                column.full_name()
            )))
        }
    }
}

/// An entry of a select list
#[derive(Debug, Clone)]
pub enum Projection {
    Column(ColumnSchema),
    Aggregate(AggregatedColumn),
}

impl Projection {
    /// The key of this projection in a result row. When `qualified`, unaliased projections
    /// are keyed by their full name instead of their bare name.
    pub(crate) fn output_name(&self, qualified: bool) -> String {
        match self {
            Projection::Column(column) if qualified && column.alias().is_none() => {
                column.full_name()
            }
            Projection::Column(column) => column.output_name().to_string(),
            Projection::Aggregate(aggregate) if qualified && aggregate.alias.is_none() => {
                aggregate.full_name()
            }
            Projection::Aggregate(aggregate) => aggregate.output_name(),
        }
    }

    pub(crate) fn has_alias(&self) -> bool {
        match self {
            Projection::Column(column) => column.alias().is_some(),
            Projection::Aggregate(aggregate) => aggregate.alias.is_some(),
        }
    }

    pub(crate) fn result_type(&self) -> Option<ColumnType> {
        match self {
            Projection::Column(column) => Some(column.column_type()),
            Projection::Aggregate(aggregate) => aggregate.result_type(),
        }
    }
}

impl From<ColumnSchema> for Projection {
    fn from(column: ColumnSchema) -> Self {
        Projection::Column(column)
    }
}

impl From<&ColumnSchema> for Projection {
    fn from(column: &ColumnSchema) -> Self {
        Projection::Column(column.clone())
    }
}

impl From<AggregatedColumn> for Projection {
    fn from(aggregate: AggregatedColumn) -> Self {
        Projection::Aggregate(aggregate)
    }
}

impl ExpressionBuilder for Projection {
    fn build(&self, builder: &mut SQLBuilder) {
        let alias = match self {
            Projection::Column(column) => {
                column.build(builder);
                column.alias()
            }
            Projection::Aggregate(aggregate) => {
                builder.push_str(aggregate.full_name());
                aggregate.alias.as_deref()
            }
        };

        if let Some(alias) = alias {
            builder.push_str(" as ");
            builder.push_str(alias);
        }
    }
}
