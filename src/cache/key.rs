//! Canonical cache keys and query strings.
//!
//! Parameters are kept in a sorted map, so two parameter sets with the same
//! contents produce the same key no matter the order they were built in.
//! Absent and empty values are dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Canonicalized request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`; empty values are ignored.
    pub fn set(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name` only when `value` is present.
    pub fn set_opt<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(name, value);
        }
        self
    }

    fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        let value = value.to_string();
        if !value.is_empty() {
            self.0.insert(name.into(), value);
        }
    }

    /// Build parameters from any serializable struct or map.
    ///
    /// Only top-level scalar fields are kept; `null` and empty strings are
    /// skipped.
    pub fn from_serialize<T: Serialize>(params: &T) -> Self {
        let mut out = Self::new();
        if let Ok(Value::Object(map)) = serde_json::to_value(params) {
            for (name, value) in map {
                match value {
                    Value::String(s) => out.insert(name, s),
                    Value::Number(n) => out.insert(name, n),
                    Value::Bool(b) => out.insert(name, b),
                    _ => {}
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// URL-encoded query string in key order, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    /// `path` with the query string appended when there are parameters.
    pub fn apply_to(&self, path: &str) -> String {
        if self.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, self.to_query_string())
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Deterministic key for `resource` and `params`.
pub fn cache_key(resource: &str, params: &QueryParams) -> String {
    params.apply_to(resource)
}
