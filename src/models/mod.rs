//! Data models for db-mediator.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionOptions, DatabaseType, DriverConfig, IsolationLevel, MySqlDriverOptions,
    PostgresDriverOptions, TransactionState, masked_url,
};
pub use query::{ColumnMetadata, QueryOutput, QueryParam, stringify_params};
