// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::database_error::DatabaseError;

use super::{SqlEngine, SqlRow};

/// An engine that records every statement it receives instead of executing it.
///
/// `run` is recorded as `begin`, the statements, and `commit` (or `rollback` when a statement
/// matches the configured failure).
#[derive(Default)]
pub(crate) struct RecordingEngine {
    log: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, Vec<SqlRow>>>,
    failing: Mutex<Option<String>>,
    no_transactional_schema_change: bool,
}

impl RecordingEngine {
    pub(crate) fn without_transactional_schema_change() -> Self {
        Self {
            no_transactional_schema_change: true,
            ..Default::default()
        }
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Answer `sql` with `rows` from now on.
    pub(crate) fn respond(&self, sql: &str, rows: Vec<SqlRow>) {
        self.responses.lock().unwrap().insert(sql.to_string(), rows);
    }

    /// Fail every statement that contains `fragment`.
    pub(crate) fn fail_on(&self, fragment: &str) {
        *self.failing.lock().unwrap() = Some(fragment.to_string());
    }

    fn execute(&self, sql: &str) -> Result<Vec<SqlRow>, DatabaseError> {
        self.log.lock().unwrap().push(sql.to_string());

        if let Some(fragment) = self.failing.lock().unwrap().as_deref() {
            if sql.contains(fragment) {
                return Err(DatabaseError::Data(format!("injected failure: {sql}")));
            }
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SqlEngine for RecordingEngine {
    async fn get(&self, sql: &str) -> Result<Vec<SqlRow>, DatabaseError> {
        self.execute(sql)
    }

    async fn run(&self, statements: &[String]) -> Result<Vec<Vec<SqlRow>>, DatabaseError> {
        self.log.lock().unwrap().push("begin".into());

        let mut results = vec![];
        for sql in statements {
            match self.execute(sql) {
                Ok(rows) => results.push(rows),
                Err(e) => {
                    self.log.lock().unwrap().push("rollback".into());
                    return Err(e);
                }
            }
        }

        self.log.lock().unwrap().push("commit".into());
        Ok(results)
    }

    async fn exec(&self, sql: &str) -> Result<(), DatabaseError> {
        self.execute(sql).map(|_| ())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        self.log.lock().unwrap().push("close".into());
        Ok(())
    }

    fn supports_transactional_schema_change(&self) -> bool {
        !self.no_transactional_schema_change
    }
}
