// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::schema::TableSchema;

use super::{BinderMap, ExpressionBuilder, LogicalPredicate, SQLBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// `inner join <table> on <predicate>` or `left outer join <table> on <predicate>`
#[derive(Debug, Clone)]
pub struct Join {
    kind: JoinKind,
    table: TableSchema,
    predicate: LogicalPredicate,
}

impl Join {
    pub fn new(kind: JoinKind, table: TableSchema, predicate: LogicalPredicate) -> Self {
        Self {
            kind,
            table,
            predicate,
        }
    }

    pub fn table(&self) -> &TableSchema {
        &self.table
    }

    pub fn predicate(&self) -> &LogicalPredicate {
        &self.predicate
    }

    pub(crate) fn collect_binders(&self, binders: &mut BinderMap) {
        self.predicate.collect_binders(binders);
    }
}

impl ExpressionBuilder for Join {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str(match self.kind {
            JoinKind::Inner => "inner join ",
            JoinKind::LeftOuter => "left outer join ",
        });
        self.table.build(builder);
        builder.push_str(" on ");
        self.predicate.build(builder);
    }
}
