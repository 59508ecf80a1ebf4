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
use crate::exec::{Attachment, Query, ResultDecoder, attachable_query};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};
use crate::value::{Value, codec::ValueCodec};

use super::{
    BindableValue, BinderMap, BinderUse, BoundValues, ExpressionBuilder, Join, JoinKind,
    LogicalPredicate, OrderByElement, Projection, SQLBuilder, SortOrder,
};

/// A row count for `limit` and `skip`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Literal(i64),
    Binder(BindableValue),
}

/// Conversion into a [`Count`]. Integers that do not fit an `i64` are rejected.
pub trait IntoCount {
    fn into_count(self) -> Result<Count, DatabaseError>;
}

macro_rules! count_from_int {
    ($($source:ty),*) => {
        $(
            impl IntoCount for $source {
                fn into_count(self) -> Result<Count, DatabaseError> {
                    i64::try_from(self).map(Count::Literal).map_err(|_| {
                        DatabaseError::Syntax(format!("Count {self} is out of range"))
                    })
                }
            }
        )*
    };
}

count_from_int!(i32, i64, u32, u64, usize);

impl IntoCount for BindableValue {
    fn into_count(self) -> Result<Count, DatabaseError> {
        Ok(Count::Binder(self))
    }
}

impl IntoCount for Count {
    fn into_count(self) -> Result<Count, DatabaseError> {
        Ok(self)
    }
}

impl ExpressionBuilder for Count {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Count::Literal(count) => builder.push_str(count.to_string()),
            Count::Binder(binder) => builder.push_binder(binder, ColumnType::Integer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

impl SetOperator {
    fn as_str(&self) -> &'static str {
        match self {
            SetOperator::Union => "union",
            SetOperator::Intersect => "intersect",
            SetOperator::Except => "except",
        }
    }
}

/// A `select` statement.
///
/// Clauses render in the order `from`, joins, `where`, `group by`, `order by`, `limit`,
/// `offset`, followed by set operations in the order they were added (the query is wrapped in
/// a sub-select first when it has `order by`, `limit` or `offset`). `limit` and `skip`
/// track presence separately from their value, so `limit(0)` renders `limit 0`.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    connection: Connection,
    projections: Vec<Projection>,
    from: Vec<TableSchema>,
    joins: Vec<Join>,
    predicate: Option<LogicalPredicate>,
    order_by: Vec<OrderByElement>,
    group_by: Option<Vec<ColumnSchema>>,
    limit: Option<Count>,
    skip: Option<Count>,
    set_operations: Vec<(SetOperator, SelectQuery)>,
    bound_values: BoundValues,
    attachment: Attachment,
}

impl SelectQuery {
    pub(crate) fn new(connection: Connection, projections: Vec<Projection>) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            projections,
            from: vec![],
            joins: vec![],
            predicate: None,
            order_by: vec![],
            group_by: None,
            limit: None,
            skip: None,
            set_operations: vec![],
            bound_values: BoundValues::default(),
        }
    }

    /// Set the source tables. Tables sharing a name must be told apart with aliases.
    pub fn from<'a>(
        mut self,
        tables: impl IntoIterator<Item = &'a TableSchema>,
    ) -> Result<Self, DatabaseError> {
        if !self.from.is_empty() {
            return Err(DatabaseError::Syntax("from() has already been called".into()));
        }

        let tables: Vec<TableSchema> = tables.into_iter().cloned().collect();
        if tables.is_empty() {
            return Err(DatabaseError::Syntax("from() requires at least one table".into()));
        }

        for (i, table) in tables.iter().enumerate() {
            if tables[..i]
                .iter()
                .any(|other| other.reference_name() == table.reference_name())
            {
                return Err(DatabaseError::Syntax(format!(
                    "Table {} appears more than once in from(); alias one of them",
                    table.reference_name()
                )));
            }
        }

        self.from = tables;
        Ok(self)
    }

    pub fn inner_join(self, table: &TableSchema, on: LogicalPredicate) -> Result<Self, DatabaseError> {
        self.join(JoinKind::Inner, table, on)
    }

    pub fn left_outer_join(
        self,
        table: &TableSchema,
        on: LogicalPredicate,
    ) -> Result<Self, DatabaseError> {
        self.join(JoinKind::LeftOuter, table, on)
    }

    fn join(
        mut self,
        kind: JoinKind,
        table: &TableSchema,
        on: LogicalPredicate,
    ) -> Result<Self, DatabaseError> {
        on.check_operands(self.connection.codec())?;

        let clashes = self
            .sources()
            .any(|other| other.reference_name() == table.reference_name());
        if clashes {
            return Err(DatabaseError::Syntax(format!(
                "Table {} is already part of the query; alias the joined table",
                table.reference_name()
            )));
        }

        self.joins.push(Join::new(kind, table.clone(), on));
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

    pub fn order_by(mut self, column: &ColumnSchema, order: SortOrder) -> Self {
        self.order_by.push(OrderByElement::new(column.clone(), order));
        self
    }

    pub fn group_by<'a>(
        mut self,
        columns: impl IntoIterator<Item = &'a ColumnSchema>,
    ) -> Result<Self, DatabaseError> {
        if self.group_by.is_some() {
            return Err(DatabaseError::Syntax("group_by() has already been called".into()));
        }

        let columns: Vec<_> = columns.into_iter().cloned().collect();
        if columns.is_empty() {
            return Err(DatabaseError::Syntax("group_by() requires at least one column".into()));
        }

        self.group_by = Some(columns);
        Ok(self)
    }

    pub fn limit(mut self, count: impl IntoCount) -> Result<Self, DatabaseError> {
        if self.limit.is_some() {
            return Err(DatabaseError::Syntax("limit() has already been called".into()));
        }
        self.limit = Some(Self::checked_count("limit", count.into_count()?)?);
        Ok(self)
    }

    pub fn skip(mut self, count: impl IntoCount) -> Result<Self, DatabaseError> {
        if self.skip.is_some() {
            return Err(DatabaseError::Syntax("skip() has already been called".into()));
        }
        self.skip = Some(Self::checked_count("skip", count.into_count()?)?);
        Ok(self)
    }

    fn checked_count(clause: &str, count: Count) -> Result<Count, DatabaseError> {
        match count {
            Count::Literal(n) if n < 0 => Err(DatabaseError::Syntax(format!(
                "{clause}() requires a non-negative count, got {n}"
            ))),
            count => Ok(count),
        }
    }

    pub fn union(self, other: SelectQuery) -> Result<Self, DatabaseError> {
        self.set_operation(SetOperator::Union, other)
    }

    pub fn intersect(self, other: SelectQuery) -> Result<Self, DatabaseError> {
        self.set_operation(SetOperator::Intersect, other)
    }

    pub fn except(self, other: SelectQuery) -> Result<Self, DatabaseError> {
        self.set_operation(SetOperator::Except, other)
    }

    /// Sub-selects render with their own bound values, so bind them before adding them here.
    fn set_operation(
        mut self,
        operator: SetOperator,
        other: SelectQuery,
    ) -> Result<Self, DatabaseError> {
        if other.from.is_empty() {
            return Err(DatabaseError::Syntax(format!(
                "The operand of {} has no from() clause",
                operator.as_str()
            )));
        }
        self.set_operations.push((operator, other));
        Ok(self)
    }

    /// Bind values to this query's bindable values, in index order. Replaces anything bound
    /// earlier.
    pub fn bind(
        mut self,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Self, DatabaseError> {
        let values = values.into_iter().map(Into::into).collect();
        self.bound_values = BoundValues::bind(&self.binders(), values)?;
        Ok(self)
    }

    /// Every bindable value of this query (excluding sub-selects), keyed by index
    pub fn binders(&self) -> BinderMap {
        let mut binders = BinderMap::new();

        self.joins
            .iter()
            .for_each(|join| join.collect_binders(&mut binders));
        if let Some(predicate) = &self.predicate {
            predicate.collect_binders(&mut binders);
        }
        for count in [&self.limit, &self.skip].into_iter().flatten() {
            if let Count::Binder(binder) = count {
                binders.insert(binder.index(), BinderUse::Scalar(ColumnType::Integer));
            }
        }

        binders
    }

    pub fn to_sql(&self) -> Result<Vec<String>, DatabaseError> {
        if self.from.is_empty() {
            return Err(DatabaseError::Syntax("select requires a from() clause".into()));
        }
        Ok(vec![self.render(self.connection.codec())?])
    }

    /// Render with `codec` and this query's own bound values.
    pub(crate) fn render(&self, codec: ValueCodec) -> Result<String, DatabaseError> {
        let mut builder = SQLBuilder::new(codec, &self.bound_values);
        self.build(&mut builder);
        builder.into_checked_sql()
    }

    /// Fails unless this query, its set operands and every sub-select in its predicates have
    /// all their bindable values bound.
    pub(crate) fn ensure_bound(&self) -> Result<(), DatabaseError> {
        self.bound_values.ensure_complete(&self.binders())?;
        self.set_operations
            .iter()
            .try_for_each(|(_, other)| other.ensure_bound())?;
        self.predicates()
            .flat_map(LogicalPredicate::sub_queries)
            .try_for_each(SelectQuery::ensure_bound)
    }

    fn sources(&self) -> impl Iterator<Item = &TableSchema> {
        self.from.iter().chain(self.joins.iter().map(Join::table))
    }

    fn predicates(&self) -> impl Iterator<Item = &LogicalPredicate> {
        self.joins
            .iter()
            .map(Join::predicate)
            .chain(self.predicate.as_ref())
    }

    /// Over several tables, result columns are keyed by full name so that same-named columns
    /// stay apart.
    fn qualifies_output(&self) -> bool {
        self.from.len() + self.joins.len() > 1
    }
}

impl SelectQuery {
    fn has_trailing_clauses(&self) -> bool {
        !self.order_by.is_empty() || self.limit.is_some() || self.skip.is_some()
    }

    /// Everything except the set operations
    fn build_core(&self, builder: &mut SQLBuilder) {
        builder.push_str("select ");
        self.build_projections(builder);

        builder.push_str(" from ");
        builder.push_elems(&self.from, ", ");

        for join in &self.joins {
            builder.push_space();
            join.build(builder);
        }

        if let Some(predicate) = &self.predicate {
            builder.push_str(" where ");
            predicate.build(builder);
        }

        if let Some(group_by) = &self.group_by {
            builder.push_str(" group by ");
            builder.push_elems(group_by, ", ");
        }

        if !self.order_by.is_empty() {
            builder.push_str(" order by ");
            builder.push_elems(&self.order_by, ", ");
        }

        match (&self.limit, &self.skip) {
            (Some(limit), skip) => {
                builder.push_str(" limit ");
                limit.build(builder);
                if let Some(skip) = skip {
                    builder.push_str(" offset ");
                    skip.build(builder);
                }
            }
            // An offset needs a limit; -1 means no limit
            (None, Some(skip)) => {
                builder.push_str(" limit -1 offset ");
                skip.build(builder);
            }
            (None, None) => {}
        }
    }

    /// `*` and unaliased projections are spelled out as `<full name> as "<full name>"` when
    /// the query reads several tables.
    fn build_projections(&self, builder: &mut SQLBuilder) {
        let qualified = self.qualifies_output();

        if self.projections.is_empty() {
            if qualified {
                let columns: Vec<ColumnSchema> =
                    self.sources().flat_map(TableSchema::columns).collect();
                builder.push_iter(columns.iter(), ", ", |builder, column| {
                    column.build(builder);
                    builder.push_str(" as ");
                    builder.push_identifier(column.full_name());
                });
            } else {
                builder.push('*');
            }
        } else if qualified {
            builder.push_iter(self.projections.iter(), ", ", |builder, projection| {
                projection.build(builder);
                if !projection.has_alias() {
                    builder.push_str(" as ");
                    builder.push_identifier(projection.output_name(true));
                }
            });
        } else {
            builder.push_elems(&self.projections, ", ");
        }
    }
}

impl ExpressionBuilder for SelectQuery {
    /// A compound operand may not carry `order by`, `limit` or `offset`, so a query that has
    /// them is wrapped before its set operations.
    fn build(&self, builder: &mut SQLBuilder) {
        if !self.set_operations.is_empty() && self.has_trailing_clauses() {
            builder.push_str("select * from (");
            self.build_core(builder);
            builder.push(')');
        } else {
            self.build_core(builder);
        }

        for (operator, other) in &self.set_operations {
            builder.push_space();
            builder.push_str(operator.as_str());
            builder.push_str(" select * from (");
            match other.render(builder.codec()) {
                Ok(sql) => builder.push_str(sql),
                Err(e) => builder.record_error(e),
            }
            builder.push(')');
        }
    }
}

attachable_query!(SelectQuery);

impl Query for SelectQuery {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        self.ensure_bound()?;
        self.to_sql()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    /// Result columns are keyed by alias. Otherwise they are keyed by bare column name over a
    /// single table and by full name over several.
    fn decoder(&self) -> ResultDecoder {
        let mut decoder = ResultDecoder::new(self.connection.codec());
        let qualified = self.qualifies_output();

        if self.projections.is_empty() {
            for column in self.sources().flat_map(TableSchema::columns) {
                let name = if qualified {
                    column.full_name()
                } else {
                    column.name().to_string()
                };
                decoder.declare(name, column.column_type());
            }
        } else {
            for projection in &self.projections {
                if let Some(column_type) = projection.result_type() {
                    decoder.declare(projection.output_name(qualified), column_type);
                }
            }
        }

        decoder
    }
}
