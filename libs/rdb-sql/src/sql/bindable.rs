// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use crate::database_error::DatabaseError;
use crate::schema::ColumnType;
use crate::value::{Value, codec::ValueCodec};

/// A placeholder for a value supplied after the query is built, identified by its position
/// in the values later passed to `bind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindableValue {
    index: usize,
}

impl BindableValue {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `?<index + 1>`
    pub fn placeholder(&self) -> String {
        format!("?{}", self.index + 1)
    }
}

/// What a query expects to receive for a bindable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderUse {
    /// A single value compared with (or assigned to) a column of the given type
    Scalar(ColumnType),
    /// A [`Value::List`] of values for a membership test
    List(ColumnType),
    /// One row ([`Value::Row`]) or a list of rows to insert
    Rows,
}

/// Every bindable value found in a query, keyed by index.
pub type BinderMap = BTreeMap<usize, BinderUse>;

/// Values bound to a query, keyed by binder index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundValues {
    values: BTreeMap<usize, Value>,
}

impl BoundValues {
    pub fn get(&self, binder: &BindableValue) -> Option<&Value> {
        self.values.get(&binder.index)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Assign `values` in order to binder indexes `0..values.len()`.
    ///
    /// Every value must land on a binder the query actually contains and must fit the way that
    /// binder is used. Row values are checked by the insert builder, which knows the target table.
    pub(crate) fn bind(binders: &BinderMap, values: Vec<Value>) -> Result<Self, DatabaseError> {
        let codec = ValueCodec::default();
        let mut bound = BTreeMap::new();

        for (index, value) in values.into_iter().enumerate() {
            let usage = binders.get(&index).ok_or_else(|| {
                DatabaseError::Binding(format!(
                    "Value supplied for ?{} but the query has no such bindable value",
                    index + 1
                ))
            })?;

            match (usage, &value) {
                (BinderUse::Scalar(column_type), value) => {
                    codec.to_literal(value, *column_type)?;
                }
                (BinderUse::List(column_type), Value::List(elements)) => {
                    for element in elements {
                        codec.to_literal(element, *column_type)?;
                    }
                }
                (BinderUse::List(_), other) => {
                    return Err(DatabaseError::Binding(format!(
                        "?{} expects a list of values, got {}",
                        index + 1,
                        other.kind()
                    )));
                }
                (BinderUse::Rows, _) => {}
            }

            bound.insert(index, value);
        }

        Ok(Self { values: bound })
    }

    /// Fails unless every binder in `binders` has a value.
    pub(crate) fn ensure_complete(&self, binders: &BinderMap) -> Result<(), DatabaseError> {
        let missing: Vec<_> = binders
            .keys()
            .filter(|index| !self.values.contains_key(index))
            .map(|index| BindableValue::new(*index).placeholder())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DatabaseError::Binding(format!(
                "No value bound for {}",
                missing.join(", ")
            )))
        }
    }
}
