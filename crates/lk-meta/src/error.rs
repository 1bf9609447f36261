//! Error types for the monitoring database.

use lk_core::CoreError;
use thiserror::Error;

/// Monitoring database errors.
#[derive(Error, Debug)]
pub enum MetaError {
    /// Failed to open or create the database (M001).
    #[error("[M001] Monitoring database connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (M002).
    #[error("[M002] Monitoring database migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error (M003).
    #[error("[M003] Monitoring database query failed: {0}")]
    QueryError(String),

    /// Transaction management error (M004).
    #[error("[M004] Monitoring database transaction failed: {0}")]
    TransactionError(String),

    /// A referenced row does not exist (M005).
    #[error("[M005] {entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// Attempt to complete a run that is already closed (M006).
    #[error("[M006] Collection run {run_id} is already closed with status '{status}'")]
    RunClosed { run_id: i64, status: String },

    /// A job ran past its deadline; its work was rolled back (M007).
    #[error("[M007] Deadline exceeded before commit: {0}")]
    Timeout(String),

    /// Domain validation error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// DuckDB driver error with preserved source chain (M008).
    #[error("[M008] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for [`MetaError`].
pub type MetaResult<T> = Result<T, MetaError>;

impl From<duckdb::Error> for MetaError {
    fn from(err: duckdb::Error) -> Self {
        MetaError::DuckDb(err)
    }
}

/// Attach a short description of the failing statement to a driver error.
pub(crate) trait MetaResultExt<T> {
    fn query_context(self, what: &str) -> MetaResult<T>;
}

impl<T> MetaResultExt<T> for Result<T, duckdb::Error> {
    fn query_context(self, what: &str) -> MetaResult<T> {
        self.map_err(|e| MetaError::QueryError(format!("{what}: {e}")))
    }
}
