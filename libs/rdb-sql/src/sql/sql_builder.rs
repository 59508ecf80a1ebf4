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
use crate::value::{Value, codec::ValueCodec};

use super::{BindableValue, BoundValues, ExpressionBuilder};

/// Accumulates SQL text. Values are rendered as literals through the codec; a bindable value
/// renders as its literal once bound and as a `?<n>` placeholder until then. The first value
/// that does not fit its column type is kept and reported by [`SQLBuilder::into_checked_sql`].
pub struct SQLBuilder<'a> {
    sql: String,
    codec: ValueCodec,
    bound_values: &'a BoundValues,
    /// Indicates if column name should be rendered with the table name (or alias) i.e.
    /// `table.col` instead of `col` (the latter is needed for the SET clause of UPDATE)
    fully_qualify_column_names: bool,
    error: Option<DatabaseError>,
}

impl<'a> SQLBuilder<'a> {
    pub fn new(codec: ValueCodec, bound_values: &'a BoundValues) -> Self {
        Self {
            sql: String::new(),
            codec,
            bound_values,
            fully_qualify_column_names: true,
            error: None,
        }
    }

    pub fn codec(&self) -> ValueCodec {
        self.codec
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push_str(s.as_ref());
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    pub fn push_space(&mut self) {
        self.sql.push(' ');
    }

    /// Push a string surrounded by double quotes, for identifiers that are not plain names
    /// (such as the `$rdb_` catalog tables).
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push('"');
        self.sql.push_str(&s.as_ref().replace('"', "\"\""));
        self.sql.push('"');
    }

    /// Push `<table>.<column>` in fully qualified mode, otherwise just `<column>`.
    pub fn push_column(&mut self, column: &ColumnSchema) {
        if self.fully_qualify_column_names {
            self.push_str(column.full_name());
        } else {
            self.push_str(column.name());
        }
    }

    /// Push a literal encoded for `column_type`.
    pub fn push_literal(&mut self, value: &Value, column_type: ColumnType) {
        match self.codec.to_quoted_literal(value, column_type) {
            Ok(literal) => self.push_str(literal),
            Err(e) => self.record_error(e),
        }
    }

    /// Keep the first error met while building; the text built so far is unusable.
    pub fn record_error(&mut self, error: DatabaseError) {
        self.error.get_or_insert(error);
    }

    /// Push the bound value of `binder`, or its placeholder if nothing is bound yet.
    pub fn push_binder(&mut self, binder: &BindableValue, column_type: ColumnType) {
        match self.bound_values.get(binder) {
            Some(value) => self.push_literal(value, column_type),
            None => self.push_str(binder.placeholder()),
        }
    }

    pub fn bound_value(&self, binder: &BindableValue) -> Option<&'a Value> {
        self.bound_values.get(binder)
    }

    /// Push elements of an iterator, separated by `sep`. The `push_elem` function provides
    /// the flexibility to map the elements (compared to [`SQLBuilder::push_elems`], which assumes that
    /// the elements implement [`ExpressionBuilder`]).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        push_elem: impl Fn(&mut Self, T),
    ) {
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            push_elem(self, item);

            if i < len - 1 {
                self.sql.push_str(sep);
            }
        }
    }

    /// Push elements of a slice, separated by `sep`.
    pub fn push_elems<T: ExpressionBuilder>(&mut self, elems: &[T], sep: &str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// Get the SQL string. Calling this method should be the final step in building an SQL
    /// expression, and thus this builder consumes the `self`.
    pub fn into_sql(self) -> String {
        self.sql
    }

    /// Like [`Self::into_sql`], but fails if any value could not be encoded.
    pub fn into_checked_sql(self) -> Result<String, DatabaseError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.sql),
        }
    }

    /// Execute the given function with [`Self::fully_qualify_column_names`] set to false,
    /// restoring the original value afterwards.
    pub fn without_fully_qualified_column_names<F, R>(&mut self, func: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let cur_fully_qualify_column_names = self.fully_qualify_column_names;
        self.fully_qualify_column_names = false;
        let ret = func(self);
        self.fully_qualify_column_names = cur_fully_qualify_column_names;
        ret
    }
}
