// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Access to configuration values supplied through the process environment (or a stand-in
//! map for tests and embedders that configure connections programmatically).

mod map;

pub use map::MapEnvironment;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Interpret the value of `key` as a boolean flag, falling back to `default_value` when unset.
    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or_else(|| default_value.to_string())
    }

    /// Like [`Environment::get`], but treats an absent or blank value as an error.
    fn require(&self, key: &'static str) -> Result<String, EnvError> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(EnvError::Missing { key }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("Invalid value for {key}: {value}. Expected true, 1, yes, on OR false, 0, no, off")]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid env value {env_value} for {env_key}: {message}")]
    InvalidEnum {
        env_key: &'static str,
        env_value: String,
        message: String,
    },

    #[error("Missing required env value {key}")]
    Missing { key: &'static str },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn boolean_flags() {
        let env = MapEnvironment::from([("A", "yes"), ("B", "Off"), ("C", "maybe")]);

        assert!(env.enabled("A", false).unwrap());
        assert!(!env.enabled("B", true).unwrap());
        assert!(env.enabled("MISSING", true).unwrap());
        assert!(matches!(
            env.enabled("C", false),
            Err(EnvError::InvalidBoolean { .. })
        ));
    }

    #[multiplatform_test]
    fn required_values() {
        let env = MapEnvironment::from([("NAME", "orders"), ("BLANK", "  ")]);

        assert_eq!(env.require("NAME").unwrap(), "orders");
        assert!(matches!(env.require("BLANK"), Err(EnvError::Missing { key: "BLANK" })));
        assert!(matches!(env.require("NONE"), Err(EnvError::Missing { .. })));
        assert_eq!(env.get_or_else("NONE", "fallback"), "fallback");
    }
}
