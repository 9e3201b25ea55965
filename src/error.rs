//! Error types for db-mediator.
//!
//! All errors are defined with `thiserror`. The lifecycle variants describe
//! misuse of connections and runners; the driver variants (`Connection`,
//! `Database`, `Timeout`, `Internal`) carry engine failures, which the core
//! surfaces unchanged to the caller.

use crate::models::TransactionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection '{name}' already exists and is connected")]
    DuplicateConnection { name: String },

    #[error("Connection not found: {name}")]
    ConnectionNotFound { name: String },

    #[error("Connection '{name}' is already connected")]
    AlreadyConnected { name: String },

    #[error("Connection '{name}' is not connected")]
    NotConnected { name: String },

    #[error("Cannot {operation} in transaction state '{state}' (transaction: {transaction_id})")]
    TransactionState {
        operation: String,
        state: TransactionState,
        transaction_id: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation}{}", format_limit(.limit_secs))]
    Timeout {
        operation: String,
        /// Configured limit, when the caller knows it
        limit_secs: Option<u64>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_limit(limit_secs: &Option<u64>) -> String {
    match limit_secs {
        Some(secs) => format!(" exceeded {}s", secs),
        None => " timed out".to_string(),
    }
}

impl DbError {
    /// Create a duplicate connection error.
    pub fn duplicate_connection(name: impl Into<String>) -> Self {
        Self::DuplicateConnection { name: name.into() }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(name: impl Into<String>) -> Self {
        Self::ConnectionNotFound { name: name.into() }
    }

    pub fn already_connected(name: impl Into<String>) -> Self {
        Self::AlreadyConnected { name: name.into() }
    }

    pub fn not_connected(name: impl Into<String>) -> Self {
        Self::NotConnected { name: name.into() }
    }

    /// Create a transaction state error for an operation that is invalid in `state`.
    pub fn transaction_state(
        operation: impl Into<String>,
        state: TransactionState,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self::TransactionState {
            operation: operation.into(),
            state,
            transaction_id: transaction_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, limit_secs: Option<u64>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// SQLSTATE code reported by the engine, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// True for failures raised by a driver rather than by lifecycle misuse.
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Database { .. } | Self::Timeout { .. } | Self::Internal { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", None),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reopen the connection")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::database(
                format!("Type not found: {}", type_name),
                None,
                "Check the parameter and column types",
            ),
            sqlx::Error::ColumnNotFound(col) => DbError::database(
                format!("Column not found: {}", col),
                None,
                "Check the referenced column names",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::AnyDriverError(err) => DbError::connection(
                format!("Driver error: {}", err),
                "Check database driver configuration",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
