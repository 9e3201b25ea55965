//! Registry of named connections.

use super::connection::{Connection, ConnectionStatus};
use super::runner::QueryRunner;
use super::transaction::TransactionRunner;
use crate::config::DEFAULT_CONNECTION_NAME;
use crate::error::{DbError, DbResult};
use crate::models::ConnectionOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Name-keyed registry of [`Connection`]s.
///
/// Clones share the same registry, so a manager can be handed to many tasks.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, not yet opened connection.
    ///
    /// A closed connection registered under the same name is replaced. One that
    /// is open, or being opened or closed, is a `DuplicateConnection` error.
    pub async fn create(&self, options: ConnectionOptions) -> DbResult<Arc<Connection>> {
        options.validate()?;
        let name = options.resolved_name().to_string();

        let mut connections = self.connections.write().await;
        if let Some(existing) = connections.get(&name) {
            if existing.status() != ConnectionStatus::Closed {
                return Err(DbError::duplicate_connection(name));
            }
            info!(connection = %name, "Replacing closed connection");
        }

        let connection = Arc::new(Connection::new(options));
        connections.insert(name, Arc::clone(&connection));
        Ok(connection)
    }

    /// Look up a registered connection, open or not.
    pub async fn get(&self, name: &str) -> DbResult<Arc<Connection>> {
        self.connections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::connection_not_found(name))
    }

    /// Look up the connection named "default".
    pub async fn get_default(&self) -> DbResult<Arc<Connection>> {
        self.get(DEFAULT_CONNECTION_NAME).await
    }

    pub async fn has(&self, name: &str) -> bool {
        self.connections.read().await.contains_key(name)
    }

    /// Register a connection and open it.
    ///
    /// If opening fails the connection stays registered but closed, so a
    /// later call with the same name replaces it.
    pub async fn create_connection(&self, options: ConnectionOptions) -> DbResult<Arc<Connection>> {
        let connection = self.create(options).await?;
        connection.open().await?;
        Ok(connection)
    }

    pub async fn get_connection(&self, name: &str) -> DbResult<Arc<Connection>> {
        self.get(name).await
    }

    /// Pooled runner of the named connection.
    pub async fn get_query_runner(&self, name: &str) -> DbResult<QueryRunner> {
        self.get(name).await?.get_query_runner().await
    }

    /// Transactional runner of the named connection.
    pub async fn get_transaction_query_runner(&self, name: &str) -> DbResult<TransactionRunner> {
        self.get(name).await?.get_transaction_query_runner().await
    }

    /// Registered connection names, sorted.
    pub async fn list_connections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every open connection.
    ///
    /// Connections stay registered. Failures are logged and the remaining
    /// connections are still closed; the first failure is returned.
    pub async fn close_all(&self) -> DbResult<()> {
        let connections: Vec<Arc<Connection>> =
            self.connections.read().await.values().cloned().collect();

        let mut first_error = None;
        for connection in connections {
            if !connection.is_connected() {
                continue;
            }
            info!(connection = %connection.name(), "Closing connection");
            if let Err(e) = connection.close().await {
                warn!(connection = %connection.name(), error = %e, "Failed to close connection");
                first_error.get_or_insert(e);
            }
        }

        info!("All connections closed");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
