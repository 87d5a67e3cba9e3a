use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Row from a statement result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub columns: HashMap<String, Value>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.columns.insert(key.into(), value);
    }

    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.columns
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.columns
            .get(key)
            .and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.columns.get(key).and_then(|v| v.as_i64())
    }
}

impl Default for QueryRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a statement. Empty for DDL and inserts.
pub type QueryResult = Vec<QueryRow>;

/// Result of one statement against a store.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A schemaful graph store session.
///
/// One session is held for a whole publish run and statements are executed
/// in order. Methods take `&self`; implementations keep their session state
/// behind interior mutability so a statement can be re-issued from a retry loop.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute one statement in the session's space
    async fn execute(&self, statement: &str) -> StoreResult<QueryResult>;

    /// Check if the session is usable
    fn is_connected(&self) -> bool;

    /// Release the session
    async fn close(&self) -> StoreResult<()>;
}
