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
use crate::exec::{Attachment, Query, attachable_query};
use crate::schema::TableSchema;
use crate::value::{Row, Value, codec::NULL};

use super::{BindableValue, BinderMap, BinderUse, BoundValues, SQLBuilder};

/// The rows an insert writes: literal rows, or a bindable value standing in for one row
/// ([`Value::Row`]) or several ([`Value::List`] of rows).
#[derive(Debug, Clone)]
pub enum InsertSource {
    Rows(Vec<Row>),
    Binder(BindableValue),
}

impl From<Row> for InsertSource {
    fn from(row: Row) -> Self {
        InsertSource::Rows(vec![row])
    }
}

impl From<Vec<Row>> for InsertSource {
    fn from(rows: Vec<Row>) -> Self {
        InsertSource::Rows(rows)
    }
}

impl From<BindableValue> for InsertSource {
    fn from(binder: BindableValue) -> Self {
        InsertSource::Binder(binder)
    }
}

/// `insert [or replace] into <table>(<columns>) values(<values>)`, one statement per row.
///
/// Every declared column is listed; columns missing from a row are inserted as `null`.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    connection: Connection,
    or_replace: bool,
    table: Option<TableSchema>,
    source: Option<InsertSource>,
    bound_values: BoundValues,
    attachment: Attachment,
}

impl InsertQuery {
    pub(crate) fn new(connection: Connection, or_replace: bool) -> Self {
        Self {
            connection,
            attachment: Attachment::default(),
            or_replace,
            table: None,
            source: None,
            bound_values: BoundValues::default(),
        }
    }

    pub fn into(mut self, table: &TableSchema) -> Result<Self, DatabaseError> {
        if self.table.is_some() {
            return Err(DatabaseError::Syntax("into() has already been called".into()));
        }
        if self.or_replace && table.primary_key().is_none() {
            return Err(DatabaseError::Integrity(format!(
                "insert or replace requires a primary key, table {} has none",
                table.name()
            )));
        }

        self.table = Some(table.clone());
        Ok(self)
    }

    pub fn values(mut self, source: impl Into<InsertSource>) -> Result<Self, DatabaseError> {
        if self.source.is_some() {
            return Err(DatabaseError::Syntax("values() has already been called".into()));
        }

        let table = self.target()?;
        let source = source.into();
        if let InsertSource::Rows(rows) = &source {
            if rows.is_empty() {
                return Err(DatabaseError::Syntax("values() requires at least one row".into()));
            }
            rows.iter().try_for_each(|row| self.validate_row(table, row))?;
        }

        self.source = Some(source);
        Ok(self)
    }

    pub fn bind(
        mut self,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Self, DatabaseError> {
        let values = values.into_iter().map(Into::into).collect();
        let bound_values = BoundValues::bind(&self.binders(), values)?;

        if let (Some(InsertSource::Binder(binder)), Ok(table)) = (&self.source, self.target()) {
            if let Some(value) = bound_values.get(binder) {
                for row in Self::bound_rows(value)? {
                    self.validate_row(table, row)?;
                }
            }
        }

        self.bound_values = bound_values;
        Ok(self)
    }

    pub fn binders(&self) -> BinderMap {
        match &self.source {
            Some(InsertSource::Binder(binder)) => BinderMap::from([(binder.index(), BinderUse::Rows)]),
            _ => BinderMap::new(),
        }
    }

    pub fn to_sql(&self) -> Result<Vec<String>, DatabaseError> {
        let table = self.target()?;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| DatabaseError::Syntax("insert requires values()".into()))?;

        let rows: Vec<&Row> = match source {
            InsertSource::Rows(rows) => rows.iter().collect(),
            InsertSource::Binder(binder) => match self.bound_values.get(binder) {
                Some(value) => Self::bound_rows(value)?,
                None => return Ok(vec![self.render(table, None)?]),
            },
        };

        rows.into_iter()
            .map(|row| self.render(table, Some(row)))
            .collect()
    }

    /// Render one statement. Without a row, every value is a `?` placeholder.
    fn render(&self, table: &TableSchema, row: Option<&Row>) -> Result<String, DatabaseError> {
        let bound_values = BoundValues::default();
        let mut builder = SQLBuilder::new(self.connection.codec(), &bound_values);
        let columns = table.columns();

        builder.push_str(if self.or_replace {
            "insert or replace into "
        } else {
            "insert into "
        });
        builder.push_str(table.name());
        builder.push('(');
        builder.push_iter(columns.iter(), ",", |builder, column| {
            builder.push_str(column.name())
        });
        builder.push_str(") values(");
        builder.push_iter(columns.iter(), ",", |builder, column| match row {
            Some(row) => match row.get(column.name()) {
                Some(value) => builder.push_literal(value, column.column_type()),
                None => builder.push_str(NULL),
            },
            None => builder.push('?'),
        });
        builder.push(')');

        builder.into_checked_sql()
    }

    fn target(&self) -> Result<&TableSchema, DatabaseError> {
        self.table
            .as_ref()
            .ok_or_else(|| DatabaseError::Syntax("insert requires into()".into()))
    }

    fn bound_rows(value: &Value) -> Result<Vec<&Row>, DatabaseError> {
        match value {
            Value::Row(row) => Ok(vec![row]),
            Value::List(values) => values
                .iter()
                .map(|value| match value {
                    Value::Row(row) => Ok(row),
                    other => Err(DatabaseError::Binding(format!(
                        "Expected a row to insert, got {}",
                        other.kind()
                    ))),
                })
                .collect(),
            other => Err(DatabaseError::Binding(format!(
                "Expected a row or a list of rows to insert, got {}",
                other.kind()
            ))),
        }
    }

    /// Every key must be a declared column, every value must fit its column and every
    /// non-null column (other than an auto-increment key) must be present.
    fn validate_row(&self, table: &TableSchema, row: &Row) -> Result<(), DatabaseError> {
        let codec = self.connection.codec();

        for (key, value) in row {
            let column = table.column(key)?;
            if value.is_null() && !column.is_nullable() {
                return Err(DatabaseError::Integrity(format!(
                    "Column {} is not nullable",
                    column.full_name()
                )));
            }
            codec.to_literal(value, column.column_type())?;
        }

        let auto_increment = match table.primary_key() {
            Some(key) if key.is_auto_increment() => key.column_names().first().copied(),
            _ => None,
        };

        let missing: Vec<_> = table
            .definition()
            .not_null()
            .filter(|name| Some(*name) != auto_increment && !row.contains_key(*name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DatabaseError::Integrity(format!(
                "Missing value for non-null column(s) {} of table {}",
                missing.join(", "),
                table.name()
            )))
        }
    }
}

attachable_query!(InsertQuery);

impl Query for InsertQuery {
    fn statements(&self) -> Result<Vec<String>, DatabaseError> {
        self.bound_values.ensure_complete(&self.binders())?;
        self.to_sql()
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;
    use crate::sql::test_util::{bar_table, foo_table, nopk_table, test_connection};
    use crate::value::row;

    #[multiplatform_test]
    fn insert_rows() {
        let query = test_connection()
            .insert()
            .into(&foo_table())
            .unwrap()
            .values(vec![
                row([("id", Value::from(1)), ("name", Value::from("what"))]),
                row([("id", Value::from(2)), ("boolean", Value::from(true))]),
            ])
            .unwrap();

        assert_eq!(
            query.to_sql().unwrap(),
            vec![
                "insert into foo(id,name,ts,boolean,pic) values(1,'what',null,null,null)",
                "insert into foo(id,name,ts,boolean,pic) values(2,null,null,1,null)",
            ]
        );
    }

    #[multiplatform_test]
    fn insert_or_replace_requires_primary_key() {
        let err = test_connection()
            .insert_or_replace()
            .into(&nopk_table())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Integrity(_)));

        let query = test_connection()
            .insert_or_replace()
            .into(&foo_table())
            .unwrap()
            .values(row([("id", 1)]))
            .unwrap();
        assert!(query.to_sql().unwrap()[0].starts_with("insert or replace into foo("));
    }

    #[multiplatform_test]
    fn invalid_rows() {
        let insert = || test_connection().insert().into(&foo_table()).unwrap();

        assert!(matches!(
            insert().values(row([("nope", 1)])),
            Err(DatabaseError::Syntax(_))
        ));
        assert!(matches!(
            insert().values(row([("name", "no id")])),
            Err(DatabaseError::Integrity(_))
        ));
        assert!(matches!(
            insert().values(row([("id", Value::from("one"))])),
            Err(DatabaseError::Type(_))
        ));
        assert!(matches!(
            test_connection().insert().values(row([("id", 1)])),
            Err(DatabaseError::Syntax(_))
        ));
    }

    #[multiplatform_test]
    fn auto_increment_key_may_be_omitted() {
        let query = test_connection()
            .insert()
            .into(&bar_table())
            .unwrap()
            .values(row([("label", "x")]))
            .unwrap();

        assert_eq!(
            query.to_sql().unwrap(),
            vec!["insert into bar(id,label,foo_id) values(null,'x',null)"]
        );
    }

    #[multiplatform_test]
    fn bound_rows() {
        let template = test_connection()
            .insert()
            .into(&foo_table())
            .unwrap()
            .values(BindableValue::new(0))
            .unwrap();

        assert_eq!(
            template.to_sql().unwrap(),
            vec!["insert into foo(id,name,ts,boolean,pic) values(?,?,?,?,?)"]
        );
        assert!(matches!(template.statements(), Err(DatabaseError::Binding(_))));

        let bound = template
            .clone()
            .bind([Value::List(vec![
                Value::Row(row([("id", 1)])),
                Value::Row(row([("id", Value::from(2)), ("name", Value::from("two"))])),
            ])])
            .unwrap();
        assert_eq!(bound.statements().unwrap().len(), 2);
        assert_eq!(
            bound.statements().unwrap()[1],
            "insert into foo(id,name,ts,boolean,pic) values(2,'two',null,null,null)"
        );

        assert!(matches!(
            template.clone().bind([Value::Row(row([("name", "no id")]))]),
            Err(DatabaseError::Integrity(_))
        ));
        assert!(matches!(
            template.bind([Value::from(3)]),
            Err(DatabaseError::Binding(_))
        ));
    }
}
