use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Failure reported by a graph store for a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Store unreachable: {0}")]
    Unreachable(String),
}

impl StoreError {
    /// `AlreadyExists` is deterministic; repeating the statement cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::AlreadyExists(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema conflict on {label}: {source} (statement: {statement})")]
    SchemaConflict {
        label: String,
        statement: String,
        #[source]
        source: StoreError,
    },

    #[error("Execution error: {source} (statement: {statement})")]
    Execution {
        statement: String,
        #[source]
        source: StoreError,
    },

    #[error("Store unreachable: {source} (statement: {statement})")]
    Unreachable {
        statement: String,
        #[source]
        source: StoreError,
    },

    #[error("Record error in {path}: {message}")]
    Record { path: String, message: String },

    #[error("Type parse error: {0}")]
    TypeParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Attach the failing statement to a store error.
    pub fn from_store(statement: impl Into<String>, source: StoreError) -> Self {
        let statement = statement.into();
        match source {
            StoreError::Unreachable(_) => GraphError::Unreachable { statement, source },
            _ => GraphError::Execution { statement, source },
        }
    }

    pub fn record(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        GraphError::Record {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// The statement a store failure was raised for, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            GraphError::SchemaConflict { statement, .. }
            | GraphError::Execution { statement, .. }
            | GraphError::Unreachable { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retryable() {
        assert!(!StoreError::AlreadyExists("Existed!".into()).is_retryable());
        assert!(StoreError::Execution("timeout".into()).is_retryable());
        assert!(StoreError::Unreachable("refused".into()).is_retryable());
    }

    #[test]
    fn test_from_store_keeps_statement() {
        let err = GraphError::from_store("INSERT VERTEX t() VALUES", StoreError::Unreachable("refused".into()));
        assert!(matches!(err, GraphError::Unreachable { .. }));
        assert_eq!(err.statement(), Some("INSERT VERTEX t() VALUES"));

        let err = GraphError::from_store("DESCRIBE TAG t", StoreError::Execution("boom".into()));
        assert!(matches!(err, GraphError::Execution { .. }));
        assert!(err.to_string().contains("DESCRIBE TAG t"));
    }

    #[test]
    fn test_record_error_display() {
        let err = GraphError::record("/tmp/nodes/Table_0.csv", "missing KEY column");
        assert_eq!(
            err.to_string(),
            "Record error in /tmp/nodes/Table_0.csv: missing KEY column"
        );
    }
}
