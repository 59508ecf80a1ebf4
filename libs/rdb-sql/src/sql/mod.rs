// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Query construction: predicates, bindable values and the statement builders, all rendered
//! through [`SQLBuilder`].

mod bindable;
mod delete;
mod expression_builder;
mod function;
mod insert;
mod join;
mod order;
mod predicate;
mod select;
mod sql_builder;
mod update;

#[cfg(test)]
pub(crate) mod test_util;

pub use bindable::{BindableValue, BinderMap, BinderUse, BoundValues};
pub use delete::DeleteQuery;
pub use expression_builder::ExpressionBuilder;
pub use function::{AggregateFunction, AggregatedColumn, FunctionProvider, Projection};
pub use insert::{InsertQuery, InsertSource};
pub use join::{Join, JoinKind};
pub use order::{OrderByElement, SortOrder};
pub use predicate::{Connective, LogicalPredicate, MembershipSet, Operand, PredicateNode};
pub use select::{Count, IntoCount, SelectQuery, SetOperator};
pub use sql_builder::SQLBuilder;
pub use update::UpdateQuery;
