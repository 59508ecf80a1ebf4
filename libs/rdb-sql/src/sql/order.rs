// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::schema::ColumnSchema;

use super::{ExpressionBuilder, SQLBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A single `order by` entry
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElement {
    pub column: ColumnSchema,
    pub order: SortOrder,
}

impl OrderByElement {
    pub fn new(column: ColumnSchema, order: SortOrder) -> Self {
        Self { column, order }
    }
}

impl ExpressionBuilder for OrderByElement {
    fn build(&self, builder: &mut SQLBuilder) {
        self.column.build(builder);
        builder.push_str(match self.order {
            SortOrder::Asc => " asc",
            SortOrder::Desc => " desc",
        });
    }
}
