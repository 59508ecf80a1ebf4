// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::value::codec::ValueCodec;

use super::{BoundValues, SQLBuilder};

/// A trait for types that can build themselves into an SQL expression.
///
/// Each constituent of a statement (column, table, predicate, join, etc.) implements this
/// trait, which is then used to hierarchically build the statement text.
pub trait ExpressionBuilder {
    /// Build the SQL expression into the given SQL builder
    fn build(&self, builder: &mut SQLBuilder);

    /// Build the expression into a string with the default codec and nothing bound. Useful for
    /// testing and debugging.
    fn to_sql(&self) -> String
    where
        Self: Sized,
    {
        let bound_values = BoundValues::default();
        let mut builder = SQLBuilder::new(ValueCodec::default(), &bound_values);
        self.build(&mut builder);
        builder.into_sql()
    }
}

impl<T> ExpressionBuilder for Box<T>
where
    T: ExpressionBuilder,
{
    fn build(&self, builder: &mut SQLBuilder) {
        self.as_ref().build(builder)
    }
}

impl<T> ExpressionBuilder for &T
where
    T: ExpressionBuilder,
{
    fn build(&self, builder: &mut SQLBuilder) {
        (**self).build(builder)
    }
}
