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

use super::{TableSchema, catalog_table};

/// `drop table <table>`, plus removal of the table's catalog rows
#[derive(Debug, Clone)]
pub struct DropTableQuery {
    connection: Connection,
    table: String,
    attachment: Attachment,
}

impl DropTableQuery {
    pub(crate) fn new(connection: Connection, table: &TableSchema) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            table: table.name().to_string(),
        }
    }

    pub fn to_sql(&self) -> Vec<String> {
        vec![format!("drop table {}", self.table)]
    }

    pub fn catalog_sql(&self) -> Vec<String> {
        catalog_table::delete_table(&self.connection.name(), &self.table)
    }
}

attachable_query!(DropTableQuery);

impl Query for DropTableQuery {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        let mut statements = self.to_sql();
        statements.extend(self.catalog_sql());
        Ok(statements)
    }

    fn catalog_changes(&self) -> Vec<CatalogChange> {
        vec![CatalogChange::Table {
            name: self.table.clone(),
            definition: None,
        }]
    }

    fn alters_schema(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;
    use crate::sql::test_util::{foo_table, test_connection};

    #[multiplatform_test]
    fn drop_statements() {
        let query = test_connection().drop_table(&foo_table().with_alias("f"));

        assert_eq!(
            query.statements().unwrap(),
            vec![
                "drop table foo",
                r#"delete from "$rdb_table" where name='foo' and db='test'"#,
                r#"delete from "$rdb_column" where tbl='foo' and db='test'"#,
                r#"delete from "$rdb_relation" where tbl='foo' and db='test'"#,
            ]
        );
    }
}
