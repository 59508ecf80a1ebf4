// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Running compiled queries: one-shot execution contexts and multi-query transactions.

mod attachment;
mod execution_context;
mod query;
mod transaction;

pub(crate) use attachment::{Attachment, attachable_query};
pub use attachment::SharedExecutionContext;
pub use execution_context::ExecutionContext;
pub use query::{CatalogChange, Query, ResultDecoder};
pub use transaction::{Transaction, TransactionMode};
