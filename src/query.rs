//! SQL commands and named parameter bindings.

use std::collections::HashMap;

use rusqlite::types::ToSql;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Parameter bindings for SQL statements.
///
/// Parameters bind by name, so insertion order carries no meaning. Names
/// are normalized to SQLite's `:` prefix; `with_value("id", ..)` and
/// `with_value(":id", ..)` bind the same placeholder.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    values: HashMap<String, Value>,
}

impl Params {
    /// Create an empty parameter collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(normalize_name(name), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Borrow the bindings in the slice form rusqlite executes with.
    pub(crate) fn bindings(&self) -> Vec<(&str, &dyn ToSql)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect()
    }
}

fn normalize_name(name: &str) -> String {
    match name.chars().next() {
        Some(':') | Some('@') | Some('$') => name.to_string(),
        _ => format!(":{name}"),
    }
}

/// SQL statement text with typed parameters.
///
/// This is the command as data; it is bound to a live connection only
/// inside the helper that executes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Shorthand for attaching a single named value.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params = self.params.with_value(name, value);
        self
    }
}
