//! Connection registry and query runners.
//!
//! This module provides:
//! - `ConnectionManager`, the name-keyed registry
//! - `Connection`, which owns a driver while open
//! - `QueryRunner` for pooled statements
//! - `TransactionRunner` for statements on one dedicated connection

pub mod connection;
pub mod manager;
pub mod runner;
pub mod transaction;

pub use connection::Connection;
pub use manager::ConnectionManager;
pub use runner::{QueryRunner, SqlRunner};
pub use transaction::TransactionRunner;
