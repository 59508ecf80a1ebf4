// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::database_error::DatabaseError;
use crate::schema::{ColumnSchema, ColumnType};
use crate::value::Value;
use crate::value::codec::ValueCodec;

use super::{BindableValue, BinderMap, BinderUse, ExpressionBuilder, SQLBuilder, SelectQuery};

const WILDCARD: &str = "%";

/// The right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Column(ColumnSchema),
    Binder(BindableValue),
}

macro_rules! operand_from_value {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Operand {
                fn from(value: $source) -> Self {
                    Operand::Value(value.into())
                }
            }
        )*
    };
}

operand_from_value!(
    i32,
    u32,
    i64,
    f64,
    bool,
    &str,
    String,
    DateTime<Utc>,
    serde_json::Value,
    Bytes,
    Vec<u8>,
    Value,
);

impl From<ColumnSchema> for Operand {
    fn from(column: ColumnSchema) -> Self {
        Operand::Column(column)
    }
}

impl From<&ColumnSchema> for Operand {
    fn from(column: &ColumnSchema) -> Self {
        Operand::Column(column.clone())
    }
}

impl From<BindableValue> for Operand {
    fn from(binder: BindableValue) -> Self {
        Operand::Binder(binder)
    }
}

/// The candidates of a membership test.
#[derive(Debug, Clone)]
pub enum MembershipSet {
    Values(Vec<Value>),
    Binder(BindableValue),
    Query(Box<SelectQuery>),
}

impl From<Vec<Value>> for MembershipSet {
    fn from(values: Vec<Value>) -> Self {
        MembershipSet::Values(values)
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for MembershipSet {
    fn from(values: [T; N]) -> Self {
        MembershipSet::Values(values.into_iter().map(Into::into).collect())
    }
}

impl From<BindableValue> for MembershipSet {
    fn from(binder: BindableValue) -> Self {
        MembershipSet::Binder(binder)
    }
}

impl From<SelectQuery> for MembershipSet {
    fn from(query: SelectQuery) -> Self {
        MembershipSet::Query(Box::new(query))
    }
}

/// An atomic condition on a column.
#[derive(Debug, Clone)]
pub enum PredicateNode {
    /// `<column> <operator>`, e.g. `foo.pic is null`
    Unary {
        column: ColumnSchema,
        operator: &'static str,
    },
    /// `<column> <operator> <operand>`, with the operand optionally wrapped in wildcards
    Binary {
        column: ColumnSchema,
        operator: &'static str,
        operand: Operand,
        prefix: Option<&'static str>,
        postfix: Option<&'static str>,
    },
    /// `<column> <operator> <low> <infix> <high>`, e.g. `foo.id between 1 and 3`
    Ternary {
        column: ColumnSchema,
        operator: &'static str,
        infix: &'static str,
        low: Operand,
        high: Operand,
    },
    Membership {
        column: ColumnSchema,
        set: MembershipSet,
    },
}

impl PredicateNode {
    fn collect_binders(&self, binders: &mut BinderMap) {
        match self {
            PredicateNode::Unary { .. } => {}
            PredicateNode::Binary {
                column, operand, ..
            } => register_operand(binders, operand, column),
            PredicateNode::Ternary {
                column, low, high, ..
            } => {
                register_operand(binders, low, column);
                register_operand(binders, high, column);
            }
            PredicateNode::Membership {
                column,
                set: MembershipSet::Binder(binder),
            } => {
                binders.insert(binder.index(), BinderUse::List(column.column_type()));
            }
            PredicateNode::Membership { .. } => {}
        }
    }

    fn check_operands(&self, codec: ValueCodec) -> Result<(), DatabaseError> {
        match self {
            PredicateNode::Unary { .. } => Ok(()),
            PredicateNode::Binary {
                column,
                operand,
                prefix,
                postfix,
                ..
            } => check_operand(codec, operand, column, prefix.is_some() || postfix.is_some()),
            PredicateNode::Ternary {
                column, low, high, ..
            } => {
                check_operand(codec, low, column, false)?;
                check_operand(codec, high, column, false)
            }
            PredicateNode::Membership {
                column,
                set: MembershipSet::Values(values),
            } => values
                .iter()
                .try_for_each(|value| codec.to_literal(value, column.column_type()).map(|_| ())),
            PredicateNode::Membership { .. } => Ok(()),
        }
    }
}

/// A string matched against a pattern may go with any column; every other literal must fit the
/// column's type.
fn check_operand(
    codec: ValueCodec,
    operand: &Operand,
    column: &ColumnSchema,
    pattern: bool,
) -> Result<(), DatabaseError> {
    match operand {
        Operand::Value(Value::String(_)) if pattern => Ok(()),
        Operand::Value(value) => codec.to_literal(value, column.column_type()).map(|_| ()),
        Operand::Column(_) | Operand::Binder(_) => Ok(()),
    }
}

fn register_operand(binders: &mut BinderMap, operand: &Operand, column: &ColumnSchema) {
    if let Operand::Binder(binder) = operand {
        binders.insert(binder.index(), BinderUse::Scalar(column.column_type()));
    }
}

impl ExpressionBuilder for PredicateNode {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            PredicateNode::Unary { column, operator } => {
                column.build(builder);
                builder.push_space();
                builder.push_str(operator);
            }
            PredicateNode::Binary {
                column,
                operator,
                operand,
                prefix,
                postfix,
            } => {
                column.build(builder);
                builder.push_space();
                builder.push_str(operator);
                builder.push_space();
                build_operand(builder, operand, column.column_type(), *prefix, *postfix);
            }
            PredicateNode::Ternary {
                column,
                operator,
                infix,
                low,
                high,
            } => {
                column.build(builder);
                builder.push_space();
                builder.push_str(operator);
                builder.push_space();
                build_operand(builder, low, column.column_type(), None, None);
                builder.push_space();
                builder.push_str(infix);
                builder.push_space();
                build_operand(builder, high, column.column_type(), None, None);
            }
            PredicateNode::Membership { column, set } => {
                column.build(builder);
                builder.push_str(" in (");
                match set {
                    MembershipSet::Values(values) => {
                        build_list(builder, values, column.column_type())
                    }
                    MembershipSet::Binder(binder) => match builder.bound_value(binder) {
                        Some(Value::List(values)) => {
                            build_list(builder, values, column.column_type())
                        }
                        Some(value) => builder.push_literal(value, column.column_type()),
                        None => builder.push_str(binder.placeholder()),
                    },
                    MembershipSet::Query(query) => match query.render(builder.codec()) {
                        Ok(sql) => builder.push_str(sql),
                        Err(e) => builder.record_error(e),
                    },
                }
                builder.push(')');
            }
        }
    }
}

fn build_list(builder: &mut SQLBuilder, values: &[Value], column_type: ColumnType) {
    builder.push_iter(values.iter(), ", ", |builder, value| {
        builder.push_literal(value, column_type)
    });
}

fn build_operand(
    builder: &mut SQLBuilder,
    operand: &Operand,
    column_type: ColumnType,
    prefix: Option<&'static str>,
    postfix: Option<&'static str>,
) {
    let value = match operand {
        Operand::Value(value) => Some(value),
        Operand::Binder(binder) => builder.bound_value(binder),
        Operand::Column(_) => None,
    };

    match value {
        // Wildcards go inside the string literal itself
        Some(Value::String(s)) if prefix.is_some() || postfix.is_some() => {
            let affixed = format!("{}{s}{}", prefix.unwrap_or(""), postfix.unwrap_or(""));
            builder.push_literal(&Value::String(affixed), ColumnType::String);
        }
        Some(value) if prefix.is_none() && postfix.is_none() => {
            builder.push_literal(value, column_type);
        }
        _ => {
            // Otherwise concatenate the wildcards around the expression
            let quoting = builder.codec().quoting();
            if let Some(prefix) = prefix {
                builder.push_str(quoting.quote(prefix));
                builder.push_str(" || ");
            }
            match (operand, value) {
                (_, Some(value)) => builder.push_literal(value, column_type),
                (Operand::Column(column), _) => column.build(builder),
                (Operand::Binder(binder), _) => builder.push_str(binder.placeholder()),
                (Operand::Value(value), None) => builder.push_literal(value, column_type),
            }
            if let Some(postfix) = postfix {
                builder.push_str(" || ");
                builder.push_str(quoting.quote(postfix));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn as_str(&self) -> &'static str {
        match self {
            Connective::And => "and",
            Connective::Or => "or",
        }
    }
}

#[derive(Debug, Clone)]
enum Term {
    Node(PredicateNode),
    Not(Box<LogicalPredicate>),
}

/// A condition tree: one node (or a negated predicate) optionally combined with further
/// predicates under a single connective.
///
/// Combined predicates render with every operand parenthesized:
/// `(<lhs>) and (<op1>) and (<op2>)`. The connective can be set only once.
#[derive(Debug, Clone)]
pub struct LogicalPredicate {
    term: Term,
    combination: Option<(Connective, Vec<LogicalPredicate>)>,
}

impl LogicalPredicate {
    pub fn new(node: PredicateNode) -> Self {
        Self {
            term: Term::Node(node),
            combination: None,
        }
    }

    /// `not (<predicate>)`
    pub fn negate(predicate: LogicalPredicate) -> Self {
        Self {
            term: Term::Not(Box::new(predicate)),
            combination: None,
        }
    }

    pub fn and(
        self,
        others: impl IntoIterator<Item = LogicalPredicate>,
    ) -> Result<Self, DatabaseError> {
        self.combine(Connective::And, others)
    }

    pub fn or(
        self,
        others: impl IntoIterator<Item = LogicalPredicate>,
    ) -> Result<Self, DatabaseError> {
        self.combine(Connective::Or, others)
    }

    fn combine(
        self,
        connective: Connective,
        others: impl IntoIterator<Item = LogicalPredicate>,
    ) -> Result<Self, DatabaseError> {
        if let Some((existing, _)) = &self.combination {
            return Err(DatabaseError::Syntax(format!(
                "Predicate is already combined with '{}'",
                existing.as_str()
            )));
        }

        let others: Vec<_> = others.into_iter().collect();
        if others.is_empty() {
            return Err(DatabaseError::Syntax(format!(
                "'{}' requires at least one predicate",
                connective.as_str()
            )));
        }

        Ok(Self {
            term: self.term,
            combination: Some((connective, others)),
        })
    }

    /// Register every bindable value in the tree, keyed by index.
    pub fn collect_binders(&self, binders: &mut BinderMap) {
        match &self.term {
            Term::Node(node) => node.collect_binders(binders),
            Term::Not(inner) => inner.collect_binders(binders),
        }

        if let Some((_, others)) = &self.combination {
            others
                .iter()
                .for_each(|other| other.collect_binders(binders));
        }
    }

    /// Fail with a type error if a literal operand does not fit the column it is compared with.
    pub fn check_operands(&self, codec: ValueCodec) -> Result<(), DatabaseError> {
        match &self.term {
            Term::Node(node) => node.check_operands(codec)?,
            Term::Not(inner) => inner.check_operands(codec)?,
        }

        match &self.combination {
            Some((_, others)) => others
                .iter()
                .try_for_each(|other| other.check_operands(codec)),
            None => Ok(()),
        }
    }

    /// The sub-selects of every membership test in the tree
    pub fn sub_queries(&self) -> Vec<&SelectQuery> {
        let mut queries = vec![];
        self.collect_sub_queries(&mut queries);
        queries
    }

    fn collect_sub_queries<'a>(&'a self, queries: &mut Vec<&'a SelectQuery>) {
        match &self.term {
            Term::Node(PredicateNode::Membership {
                set: MembershipSet::Query(query),
                ..
            }) => queries.push(query),
            Term::Node(_) => {}
            Term::Not(inner) => inner.collect_sub_queries(queries),
        }

        if let Some((_, others)) = &self.combination {
            for other in others {
                other.collect_sub_queries(queries);
            }
        }
    }
}

impl std::ops::Not for LogicalPredicate {
    type Output = LogicalPredicate;

    fn not(self) -> Self::Output {
        LogicalPredicate::negate(self)
    }
}

impl ExpressionBuilder for Term {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Term::Node(node) => node.build(builder),
            Term::Not(inner) => {
                builder.push_str("not (");
                inner.build(builder);
                builder.push(')');
            }
        }
    }
}

impl ExpressionBuilder for LogicalPredicate {
    fn build(&self, builder: &mut SQLBuilder) {
        match &self.combination {
            None => self.term.build(builder),
            Some((connective, others)) => {
                builder.push('(');
                self.term.build(builder);
                builder.push(')');
                for other in others {
                    builder.push_space();
                    builder.push_str(connective.as_str());
                    builder.push_str(" (");
                    other.build(builder);
                    builder.push(')');
                }
            }
        }
    }
}

/// Predicate constructors
impl ColumnSchema {
    fn compare(&self, operator: &'static str, operand: Operand) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Binary {
            column: self.clone(),
            operator,
            operand,
            prefix: None,
            postfix: None,
        })
    }

    pub fn eq(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        self.compare("=", operand.into())
    }

    pub fn neq(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        self.compare("<>", operand.into())
    }

    pub fn lt(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        self.compare("<", operand.into())
    }

    pub fn lte(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        self.compare("<=", operand.into())
    }

    pub fn gt(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        self.compare(">", operand.into())
    }

    pub fn gte(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        self.compare(">=", operand.into())
    }

    pub fn is_null(&self) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Unary {
            column: self.clone(),
            operator: "is null",
        })
    }

    pub fn is_not_null(&self) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Unary {
            column: self.clone(),
            operator: "is not null",
        })
    }

    pub fn between(&self, low: impl Into<Operand>, high: impl Into<Operand>) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Ternary {
            column: self.clone(),
            operator: "between",
            infix: "and",
            low: low.into(),
            high: high.into(),
        })
    }

    pub fn is_in(&self, set: impl Into<MembershipSet>) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Membership {
            column: self.clone(),
            set: set.into(),
        })
    }

    pub fn starts_with(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Binary {
            column: self.clone(),
            operator: "like",
            operand: operand.into(),
            prefix: None,
            postfix: Some(WILDCARD),
        })
    }

    pub fn ends_with(&self, operand: impl Into<Operand>) -> LogicalPredicate {
        LogicalPredicate::new(PredicateNode::Binary {
            column: self.clone(),
            operator: "like",
            operand: operand.into(),
            prefix: Some(WILDCARD),
            postfix: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;
    use crate::sql::test_util::{foo_table, test_connection};

    #[multiplatform_test]
    fn combined_operands_are_parenthesized() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();
        let ts = foo.column("ts").unwrap();
        let pic = foo.column("pic").unwrap();

        let predicate = id
            .eq(1)
            .and([ts.gt(300), pic.is_not_null()])
            .unwrap();

        assert_eq!(
            predicate.to_sql(),
            "(foo.id = 1) and (foo.ts > 300) and (foo.pic is not null)"
        );
    }

    #[multiplatform_test]
    fn nested_combinations() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();
        let name = foo.column("name").unwrap();

        let either = id.lt(3).or([id.gte(10)]).unwrap();
        let predicate = name.neq("x").and([either]).unwrap();

        assert_eq!(
            predicate.to_sql(),
            "(foo.name <> 'x') and ((foo.id < 3) or (foo.id >= 10))"
        );
    }

    #[multiplatform_test]
    fn connective_is_set_once() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();

        let predicate = id.eq(1).and([id.eq(2)]).unwrap();
        assert!(matches!(
            predicate.clone().and([id.eq(3)]),
            Err(DatabaseError::Syntax(_))
        ));
        assert!(matches!(predicate.or([id.eq(3)]), Err(DatabaseError::Syntax(_))));
        assert!(matches!(id.eq(1).and([]), Err(DatabaseError::Syntax(_))));
    }

    #[multiplatform_test]
    fn negation_composes() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();
        let name = foo.column("name").unwrap();

        let negated = !id.between(1, 5);
        assert_eq!(negated.to_sql(), "not (foo.id between 1 and 5)");

        let predicate = negated.and([name.is_null()]).unwrap();
        assert_eq!(
            predicate.to_sql(),
            "(not (foo.id between 1 and 5)) and (foo.name is null)"
        );
    }

    #[multiplatform_test]
    fn operands_follow_column_type() {
        let foo = foo_table();

        assert_eq!(foo.column("boolean").unwrap().eq(true).to_sql(), "foo.boolean = 1");
        assert_eq!(foo.column("name").unwrap().eq("it's").to_sql(), "foo.name = 'it''s'");
        assert_eq!(
            foo.column("id").unwrap().eq(foo.with_alias("b").column("id").unwrap()).to_sql(),
            "foo.id = b.id"
        );
    }

    #[multiplatform_test]
    fn wildcards() {
        let foo = foo_table();
        let name = foo.column("name").unwrap();

        assert_eq!(name.starts_with("ab").to_sql(), "foo.name like 'ab%'");
        assert_eq!(name.ends_with("ab").to_sql(), "foo.name like '%ab'");
        assert_eq!(
            name.starts_with(BindableValue::new(0)).to_sql(),
            "foo.name like ?1 || '%'"
        );
        assert_eq!(
            name.ends_with(foo.column("name").unwrap()).to_sql(),
            "foo.name like '%' || foo.name"
        );
    }

    #[multiplatform_test]
    fn membership() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();

        assert_eq!(id.is_in([1, 2, 3]).to_sql(), "foo.id in (1, 2, 3)");
        assert_eq!(id.is_in(BindableValue::new(1)).to_sql(), "foo.id in (?2)");
    }

    #[multiplatform_test]
    fn binders_are_collected_with_their_use() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();
        let name = foo.column("name").unwrap();

        let predicate = id
            .between(BindableValue::new(0), BindableValue::new(1))
            .and([
                name.is_in(BindableValue::new(2)),
                !name.starts_with(BindableValue::new(3)),
            ])
            .unwrap();

        let mut binders = BinderMap::new();
        predicate.collect_binders(&mut binders);

        assert_eq!(
            binders,
            BinderMap::from([
                (0, BinderUse::Scalar(ColumnType::Number)),
                (1, BinderUse::Scalar(ColumnType::Number)),
                (2, BinderUse::List(ColumnType::String)),
                (3, BinderUse::Scalar(ColumnType::String)),
            ])
        );
    }

    #[multiplatform_test]
    fn literal_operands_must_fit_the_column() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();
        let name = foo.column("name").unwrap();
        let codec = ValueCodec::default();
        let type_error = |predicate: LogicalPredicate| {
            matches!(predicate.check_operands(codec), Err(DatabaseError::Type(_)))
        };

        assert!(type_error(id.eq("abc")));
        assert!(type_error(id.lt(f64::NAN)));
        assert!(type_error(id.between(1, "z")));
        assert!(type_error(id.is_in([Value::from(1), Value::from("two")])));
        assert!(type_error(id.gt(0).and([!name.eq(3)]).unwrap()));
        assert!(type_error(name.starts_with(5)));

        assert!(id.eq(1.5).check_operands(codec).is_ok());
        assert!(id.starts_with("12").check_operands(codec).is_ok());
        assert!(id.eq(name.clone()).check_operands(codec).is_ok());
        assert!(name.eq(BindableValue::new(0)).check_operands(codec).is_ok());
    }

    #[multiplatform_test]
    fn sub_queries_are_found_anywhere_in_the_tree() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();
        let inner = test_connection()
            .select([&id])
            .from([&foo])
            .unwrap();

        let predicate = id
            .gt(1)
            .or([!id.is_in(inner.clone()), id.is_in([4, 5])])
            .unwrap();

        assert_eq!(predicate.sub_queries().len(), 1);
        assert!(id.eq(1).sub_queries().is_empty());
    }

    #[multiplatform_test]
    fn clones_are_independent_trees() {
        let foo = foo_table();
        let id = foo.column("id").unwrap();

        let original = id.eq(1);
        let combined = original.clone().and([id.eq(2)]).unwrap();

        assert_eq!(original.to_sql(), "foo.id = 1");
        assert_eq!(combined.to_sql(), "(foo.id = 1) and (foo.id = 2)");
    }
}
