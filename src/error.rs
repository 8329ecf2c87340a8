//! Error types for the column-store core.
//!
//! Every fallible operation returns [`CoreResult<T>`] — no panics in
//! library code outside of invariants already established earlier in the
//! same call.

use thiserror::Error;

/// Unified error type for all core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database of the given name does not exist, or no database is open.
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    /// A database already exists at the target persistence directory.
    #[error("database '{0}' already exists")]
    DatabaseAlreadyExists(String),

    /// Requested table does not exist.
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// A table with this name already exists.
    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Requested column does not exist on the table.
    #[error("column '{0}' not found on table '{1}'")]
    ColumnNotFound(String, String),

    /// A column with this name already exists on the table.
    #[error("column '{0}' already exists on table '{1}'")]
    ColumnAlreadyExists(String, String),

    /// The table has not finished declaring all of its columns.
    #[error("table '{0}' is not ready: {initialized}/{declared} columns initialized")]
    TableNotReady {
        table: String,
        initialized: usize,
        declared: usize,
    },

    /// The table's row capacity is exhausted and cannot be grown further.
    #[error("table '{0}' capacity exhausted")]
    CapacityExhausted(String),

    /// An index already exists on this column.
    #[error("column '{1}' of table '{0}' already has an index")]
    IndexAlreadyExists(String, String),

    /// The column has no index of the kind the operation requires.
    #[error("column '{1}' of table '{0}' has no index")]
    IndexNotFound(String, String),

    /// The table already has a clustered index; only one is allowed.
    #[error("table '{0}' already has a clustered index on column '{1}'")]
    ClusteredIndexExists(String, String),

    /// A handle name was not qualified with the table/column it refers to.
    #[error("handle '{0}' requires a table/column qualifier")]
    MissingQualifier(String),

    /// A CSV/load header did not match the table's declared columns.
    #[error("load header mismatch for table '{table}': expected {expected:?}, got {actual:?}")]
    HeaderMismatch {
        table: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A named handle could not be resolved in the session or catalog.
    #[error("handle '{0}' not found")]
    HandleNotFound(String),

    /// The two value-vectors (or value/position-vector) an operator was
    /// given are not compatible (e.g. mismatched lengths).
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Batch-context protocol violation (§4.K).
    #[error("batch error: {0}")]
    BatchError(String),

    /// Memory allocation failed.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A table expand or shrink operation failed partway through.
    #[error("resize failed for table '{0}': {1}")]
    ResizeFailed(String, String),

    /// Parallel execution was requested but no worker pool is configured.
    #[error("parallelism requested but no worker pool is initialized")]
    NoWorkerPool,

    /// An invariant the core itself is responsible for maintaining was
    /// violated; this should never happen and indicates a bug.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// Catalog or column file I/O error.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for all core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_table_not_found() {
        let err = CoreError::TableNotFound("orders".to_string());
        assert_eq!(err.to_string(), "table 'orders' not found");
    }

    #[test]
    fn error_display_table_not_ready() {
        let err = CoreError::TableNotReady {
            table: "t".to_string(),
            initialized: 1,
            declared: 3,
        };
        assert!(err.to_string().contains("1/3"));
    }

    #[test]
    fn error_display_header_mismatch() {
        let err = CoreError::HeaderMismatch {
            table: "t".to_string(),
            expected: vec!["a".into(), "b".into()],
            actual: vec!["a".into()],
        };
        assert!(err.to_string().contains("load header mismatch"));
    }

    #[test]
    fn core_result_ok_and_err() {
        let ok: CoreResult<i32> = Ok(1);
        assert_eq!(ok.unwrap(), 1);
        let err: CoreResult<i32> = Err(CoreError::NoWorkerPool);
        assert!(err.is_err());
    }
}
