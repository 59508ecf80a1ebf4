// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use rdb_env::EnvError;
use thiserror::Error;

/// Every failure surfaced by this crate.
///
/// Builder misuse (`Syntax`, `InvalidSchema`, `Integrity`, `Type`) is reported synchronously by the
/// chaining call that caused it. Everything else is reported by the asynchronous commit path.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Malformed builder call sequence (e.g. a second `from()` or `limit()`)
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Bad column, index, foreign key or primary key declaration
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Corrupted catalog or a stored value that cannot be decoded
    #[error("Data error: {0}")]
    Data(String),

    /// Missing or extra bound value
    #[error("Binding error: {0}")]
    Binding(String),

    #[error("Transaction state error: {0}")]
    TransactionState(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An operation invoked on (or a value supplied for) an incompatible column type
    #[error("Type error: {0}")]
    Type(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delegate: {0}")]
    Delegate(#[from] rusqlite::Error),

    #[error("Task: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<DatabaseError>),
}

impl DatabaseError {
    pub fn with_context(self, context: String) -> DatabaseError {
        DatabaseError::WithContext(context, Box::new(self))
    }

    /// The error underneath any layers of context
    pub fn root(&self) -> &DatabaseError {
        match self {
            DatabaseError::WithContext(_, source) => source.root(),
            _ => self,
        }
    }
}

impl From<EnvError> for DatabaseError {
    fn from(e: EnvError) -> Self {
        DatabaseError::Config(e.to_string())
    }
}

pub trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, DatabaseError> {
    fn with_context(self, context: String) -> Result<T, DatabaseError> {
        self.map_err(|e| e.with_context(context))
    }
}
