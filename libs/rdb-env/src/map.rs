// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Arc;

use crate::Environment;

/// An in-memory environment, optionally layered over another one (typically the system
/// environment) that answers for keys not set here.
#[derive(Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
    fallback: Option<Arc<dyn Environment>>,
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.fallback.as_ref().and_then(|fb| fb.get(key)))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fallback: None,
        }
    }
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_fallback(fallback: Arc<dyn Environment>) -> Self {
        Self {
            values: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn fallback_answers_unset_keys() {
        let base = Arc::new(MapEnvironment::from([("RDB_DATABASE_NAME", "base")]));
        let mut env = MapEnvironment::new_with_fallback(base);

        assert_eq!(env.get("RDB_DATABASE_NAME").as_deref(), Some("base"));

        env.set("RDB_DATABASE_NAME", "override");
        assert_eq!(env.get("RDB_DATABASE_NAME").as_deref(), Some("override"));
        assert_eq!(env.get("RDB_DATABASE_PATH"), None);
    }
}
