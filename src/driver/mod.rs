//! Driver capability contract and engine adapters.
//!
//! A [`Driver`] owns whatever connection pooling an engine needs and hands out
//! two kinds of raw execution handles:
//! - pooled runners, which borrow a connection per statement
//! - dedicated runners, which hold one connection until released
//!
//! Raw runners know nothing about hooks or transaction state; the
//! [`db`](crate::db) layer adds both.

pub mod mysql;
pub mod params;
pub mod postgres;
pub mod types;

pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;

use crate::error::DbResult;
use crate::models::{DatabaseType, DriverConfig, QueryOutput, QueryParam};
use async_trait::async_trait;
use std::sync::Arc;

/// What happens to a dedicated connection when it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Hand the connection back to the pool for reuse.
    ReturnToPool,
    /// Close the connection; the pool opens a replacement when needed.
    Discard,
}

/// Raw statement execution.
#[async_trait]
pub trait RawRunner: Send + Sync {
    /// Execute `sql` with positional `params` and collect every returned row.
    async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput>;
}

/// A raw runner holding one checked-out connection.
#[async_trait]
pub trait DedicatedRunner: RawRunner {
    /// Give the connection up. Statements issued afterwards fail.
    async fn release(&mut self, mode: ReleaseMode) -> DbResult<()>;
}

/// Engine adapter.
#[async_trait]
pub trait Driver: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Establish pooling and verify credentials with one trial acquisition.
    /// A no-op when already connected.
    async fn connect(&self) -> DbResult<()>;

    /// Release every resource held by the driver. A no-op when not connected.
    async fn disconnect(&self) -> DbResult<()>;

    /// A handle that borrows a pooled connection for each statement.
    async fn pooled_runner(&self) -> DbResult<Arc<dyn RawRunner>>;

    /// A handle bound to one connection checked out of the pool.
    async fn dedicated_runner(&self) -> DbResult<Box<dyn DedicatedRunner>>;

    /// Release a runner obtained from [`Driver::dedicated_runner`].
    async fn release_dedicated_runner(
        &self,
        mut runner: Box<dyn DedicatedRunner>,
        mode: ReleaseMode,
    ) -> DbResult<()> {
        runner.release(mode).await
    }
}

/// Resolve a driver configuration to a driver instance.
pub fn driver_factory(config: &DriverConfig) -> Arc<dyn Driver> {
    match config {
        DriverConfig::MySql(options) => Arc::new(MySqlDriver::new(options.clone())),
        DriverConfig::Postgres(options) => Arc::new(PostgresDriver::new(options.clone())),
        DriverConfig::Custom(driver) => Arc::clone(driver),
    }
}

/// Error returned when a driver is asked for a runner before `connect`.
pub(crate) fn pool_missing(db_type: DatabaseType) -> crate::error::DbError {
    crate::error::DbError::connection(
        format!("{} connection pool does not exist", db_type),
        "Open the connection before requesting a query runner",
    )
}

/// Error returned when a released dedicated runner is used again.
pub(crate) fn runner_released(db_type: DatabaseType) -> crate::error::DbError {
    crate::error::DbError::connection(
        format!("{} dedicated connection was already released", db_type),
        "Request a new transaction query runner",
    )
}

/// Map an error raised while borrowing from a pool, reporting the configured
/// acquire timeout when the pool gave up waiting.
pub(crate) fn acquire_failed(
    error: sqlx::Error,
    acquire_timeout: std::time::Duration,
) -> crate::error::DbError {
    match error {
        sqlx::Error::PoolTimedOut => crate::error::DbError::timeout(
            "connection pool acquire",
            Some(acquire_timeout.as_secs()),
        ),
        other => other.into(),
    }
}

/// Map a failed connect to a connection error with a hint for the caller.
pub(crate) fn connect_failed(db_type: DatabaseType, error: &sqlx::Error) -> crate::error::DbError {
    crate::error::DbError::connection(
        format!("Failed to connect: {}", error),
        connection_suggestion(db_type, error),
    )
}

fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the user name and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    format!(
        "Verify the connection parameters for {}://user:pass@host:{}/db",
        match db_type {
            DatabaseType::PostgreSQL => "postgres",
            DatabaseType::MySQL => "mysql",
        },
        db_type.default_port()
    )
}
