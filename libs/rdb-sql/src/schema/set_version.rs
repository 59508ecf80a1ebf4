// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::connection::Connection;
use crate::database_error::DatabaseError;
use crate::exec::{Attachment, CatalogChange, Query, attachable_query};

use super::catalog_table;

/// Record a new schema version for the database
#[derive(Debug, Clone)]
pub struct SetVersionQuery {
    connection: Connection,
    version: i64,
    attachment: Attachment,
}

impl SetVersionQuery {
    pub(crate) fn new(connection: Connection, version: i64) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            version,
        }
    }

    pub fn to_sql(&self) -> Vec<String> {
        vec![catalog_table::update_version(
            &self.connection.name(),
            self.version,
        )]
    }
}

attachable_query!(SetVersionQuery);

impl Query for SetVersionQuery {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self.to_sql())
    }

    fn catalog_changes(&self) -> Vec<CatalogChange> {
        vec![CatalogChange::Version(self.version)]
    }
}
