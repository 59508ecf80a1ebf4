// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;

use rdb_env::{EnvError, Environment};

use crate::database_error::DatabaseError;
use crate::value::codec::LiteralQuoting;

pub const DATABASE_NAME_PARAM: &str = "RDB_DATABASE_NAME";
pub const DATABASE_PATH_PARAM: &str = "RDB_DATABASE_PATH";
pub const LITERAL_QUOTING_PARAM: &str = "RDB_LITERAL_QUOTING";
pub const FOREIGN_KEYS_PARAM: &str = "RDB_FOREIGN_KEYS";

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// In memory, gone once the connection closes
    Temporary,
    Persistent(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub name: String,
    pub storage: Storage,
    pub literal_quoting: LiteralQuoting,
    /// Issue `pragma foreign_keys=on` when opening
    pub foreign_keys: bool,
}

impl ConnectionOptions {
    pub fn temporary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: Storage::Temporary,
            literal_quoting: LiteralQuoting::default(),
            foreign_keys: true,
        }
    }

    pub fn persistent(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Storage::Persistent(path.into()),
            ..Self::temporary(name)
        }
    }

    pub fn with_literal_quoting(mut self, literal_quoting: LiteralQuoting) -> Self {
        self.literal_quoting = literal_quoting;
        self
    }

    pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    pub fn from_env(env: &dyn Environment) -> Result<Self, DatabaseError> {
        let name = env.require(DATABASE_NAME_PARAM)?;

        let storage = match env.get(DATABASE_PATH_PARAM) {
            Some(path) if !path.trim().is_empty() => Storage::Persistent(PathBuf::from(path)),
            _ => Storage::Temporary,
        };

        let literal_quoting = match env.get(LITERAL_QUOTING_PARAM) {
            Some(value) => {
                value
                    .parse::<LiteralQuoting>()
                    .map_err(|message| EnvError::InvalidEnum {
                        env_key: LITERAL_QUOTING_PARAM,
                        env_value: value.clone(),
                        message,
                    })?
            }
            None => LiteralQuoting::default(),
        };

        let foreign_keys = env.enabled(FOREIGN_KEYS_PARAM, true)?;

        Ok(Self {
            name,
            storage,
            literal_quoting,
            foreign_keys,
        })
    }
}
