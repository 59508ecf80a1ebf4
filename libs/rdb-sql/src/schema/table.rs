// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::database_error::DatabaseError;
use crate::sql::{ExpressionBuilder, SQLBuilder, SortOrder};

use super::ColumnType;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid name pattern"));

/// Table, column, index and constraint names must start with a letter and contain only
/// letters, digits and underscores.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedColumn {
    pub name: String,
    pub order: SortOrder,
}

impl IndexedColumn {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Desc,
        }
    }
}

impl From<&str> for IndexedColumn {
    fn from(name: &str) -> Self {
        Self::asc(name)
    }
}

/// `name`, or `name desc`, as used in key and index column lists
impl Display for IndexedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.order {
            SortOrder::Asc => f.write_str(&self.name),
            SortOrder::Desc => write!(f, "{} desc", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// Single or composite key over the listed columns
    Columns(Vec<IndexedColumn>),
    /// A single auto-incrementing integer column
    AutoIncrement(String),
}

impl PrimaryKey {
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Columns(columns) => columns.iter().map(|c| c.name.as_str()).collect(),
            PrimaryKey::AutoIncrement(column) => vec![column.as_str()],
        }
    }

    pub fn is_auto_increment(&self) -> bool {
        matches!(self, PrimaryKey::AutoIncrement(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyAction {
    #[default]
    Restrict,
    Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyTiming {
    #[default]
    Immediate,
    Deferrable,
}

impl Display for ForeignKeyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ForeignKeyAction::Restrict => "restrict",
            ForeignKeyAction::Cascade => "cascade",
        })
    }
}

impl FromStr for ForeignKeyAction {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restrict" => Ok(ForeignKeyAction::Restrict),
            "cascade" => Ok(ForeignKeyAction::Cascade),
            _ => Err(DatabaseError::Data(format!("Unknown foreign key action '{s}'"))),
        }
    }
}

impl Display for ForeignKeyTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ForeignKeyTiming::Immediate => "immediate",
            ForeignKeyTiming::Deferrable => "deferrable",
        })
    }
}

impl FromStr for ForeignKeyTiming {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(ForeignKeyTiming::Immediate),
            "deferrable" => Ok(ForeignKeyTiming::Deferrable),
            _ => Err(DatabaseError::Data(format!("Unknown foreign key timing '{s}'"))),
        }
    }
}

/// A named foreign key. Remote columns are written `table.column` and must all name the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub name: String,
    pub local_columns: Vec<String>,
    pub remote_columns: Vec<String>,
    pub action: ForeignKeyAction,
    pub timing: ForeignKeyTiming,
}

impl ForeignKeySpec {
    pub fn new<L, R>(
        name: impl Into<String>,
        local_columns: impl IntoIterator<Item = L>,
        remote_columns: impl IntoIterator<Item = R>,
    ) -> Self
    where
        L: Into<String>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            local_columns: local_columns.into_iter().map(Into::into).collect(),
            remote_columns: remote_columns.into_iter().map(Into::into).collect(),
            action: ForeignKeyAction::default(),
            timing: ForeignKeyTiming::default(),
        }
    }

    pub fn with_action(mut self, action: ForeignKeyAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_timing(mut self, timing: ForeignKeyTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Split the remote columns into the referenced table and its column names.
    pub fn remote_table(&self) -> Result<(&str, Vec<&str>), DatabaseError> {
        let mut table = None;
        let mut columns = Vec::with_capacity(self.remote_columns.len());

        for remote in &self.remote_columns {
            let (remote_table, remote_column) = remote.split_once('.').ok_or_else(|| {
                DatabaseError::InvalidSchema(format!(
                    "Foreign key {}: remote column '{remote}' must be written as table.column",
                    self.name
                ))
            })?;

            match table {
                None => table = Some(remote_table),
                Some(existing) if existing != remote_table => {
                    return Err(DatabaseError::InvalidSchema(format!(
                        "Foreign key {}: remote columns reference both {existing} and {remote_table}",
                        self.name
                    )));
                }
                Some(_) => {}
            }
            columns.push(remote_column);
        }

        table.map(|table| (table, columns)).ok_or_else(|| {
            DatabaseError::InvalidSchema(format!("Foreign key {} has no remote columns", self.name))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<IndexedColumn>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<C: Into<IndexedColumn>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique,
        }
    }
}

/// The persisted shape of a table, as recorded in the catalog tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub indexes: Vec<IndexSpec>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            primary_key: None,
            foreign_keys: vec![],
            indexes: vec![],
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|column| column.name == name)
    }

    pub fn not_null(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|column| !column.nullable)
            .map(|column| column.name.as_str())
    }
}

/// A handle to a table in the schema catalog, optionally under an alias.
///
/// Handles share the underlying definition; aliasing produces a new handle whose columns render
/// as `<alias>.<column>` without touching the original.
#[derive(Debug, Clone)]
pub struct TableSchema {
    definition: Arc<TableDefinition>,
    alias: Option<String>,
}

impl TableSchema {
    pub(crate) fn new(definition: Arc<TableDefinition>) -> Self {
        Self {
            definition,
            alias: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The name columns of this handle are qualified with
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.definition.name)
    }

    pub fn with_alias(&self, alias: impl Into<String>) -> TableSchema {
        Self {
            definition: self.definition.clone(),
            alias: Some(alias.into()),
        }
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn column(&self, name: &str) -> Result<ColumnSchema, DatabaseError> {
        self.definition
            .column(name)
            .map(|column| self.column_view(column))
            .ok_or_else(|| {
                DatabaseError::Syntax(format!("Table {} has no column {name}", self.name()))
            })
    }

    pub fn columns(&self) -> Vec<ColumnSchema> {
        self.definition
            .columns
            .iter()
            .map(|column| self.column_view(column))
            .collect()
    }

    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.definition.primary_key.as_ref()
    }

    pub fn foreign_keys(&self) -> &[ForeignKeySpec] {
        &self.definition.foreign_keys
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.definition.indexes
    }

    fn column_view(&self, column: &ColumnDefinition) -> ColumnSchema {
        ColumnSchema {
            table: self.definition.name.clone(),
            scope: self.reference_name().to_string(),
            name: column.name.clone(),
            column_type: column.column_type,
            nullable: column.nullable,
            alias: None,
        }
    }
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition && self.alias == other.alias
    }
}

/// `foo` or `foo a`, as used in `from` and `join` clauses
impl ExpressionBuilder for TableSchema {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str(self.name());
        if let Some(alias) = &self.alias {
            builder.push_space();
            builder.push_str(alias);
        }
    }
}

/// A column of a [`TableSchema`] handle.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    table: String,
    scope: String,
    name: String,
    column_type: ColumnType,
    nullable: bool,
    alias: Option<String>,
}

impl ColumnSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// `<table name or alias>.<column name>`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.scope, self.name)
    }

    /// A view of the same column that is projected under `alias`.
    pub fn with_alias(&self, alias: impl Into<String>) -> ColumnSchema {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }

    /// The key this column appears under in a result row
    pub(crate) fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Column aliases do not affect identity.
impl PartialEq for ColumnSchema {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.scope == other.scope && self.name == other.name
    }
}

impl ExpressionBuilder for ColumnSchema {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_column(self);
    }
}
