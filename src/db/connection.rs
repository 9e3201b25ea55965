//! Named database connection.

use super::runner::{Instrumentation, QueryRunner};
use super::transaction::TransactionRunner;
use crate::driver::{Driver, driver_factory};
use crate::error::{DbError, DbResult};
use crate::hooks::QueryHooks;
use crate::models::{ConnectionOptions, DatabaseType};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Lifecycle of a [`Connection`], readable without taking its driver lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum ConnectionStatus {
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A named connection that owns a driver while open.
///
/// A connection starts closed. [`open`](Self::open) resolves the configured
/// driver and connects it; [`close`](Self::close) disconnects it again. Runners
/// can only be obtained while the connection is open.
pub struct Connection {
    name: String,
    options: ConnectionOptions,
    hooks: QueryHooks,
    driver: RwLock<Option<Arc<dyn Driver>>>,
    /// Written only while holding the `driver` write lock
    status: AtomicU8,
}

impl Connection {
    pub fn new(options: ConnectionOptions) -> Self {
        let name = options.resolved_name().to_string();
        let hooks = QueryHooks::new(options.hooks.clone());
        Self {
            name,
            options,
            hooks,
            driver: RwLock::new(None),
            status: AtomicU8::new(ConnectionStatus::Closed as u8),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine configured for this connection.
    pub fn database_type(&self) -> DatabaseType {
        self.options.driver.database_type()
    }

    pub fn slow_query_threshold(&self) -> Duration {
        self.options.effective_slow_query_threshold()
    }

    pub fn max_query_execution_time(&self) -> Duration {
        self.options.effective_max_query_execution_time()
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Whether a connected driver is held. Never waits on an open or close
    /// in progress.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.status(),
            ConnectionStatus::Open | ConnectionStatus::Closing
        )
    }

    /// Build the driver and connect it.
    pub async fn open(&self) -> DbResult<&Self> {
        let mut slot = self.driver.write().await;
        if slot.is_some() {
            return Err(DbError::already_connected(&self.name));
        }
        self.set_status(ConnectionStatus::Opening);

        let driver = driver_factory(&self.options.driver);
        info!(
            connection = %self.name,
            db_type = %driver.database_type(),
            "Opening connection"
        );

        if let Err(e) = driver.connect().await {
            self.set_status(ConnectionStatus::Closed);
            warn!(connection = %self.name, error = %e, "Failed to open connection");
            return Err(e);
        }

        *slot = Some(driver);
        self.set_status(ConnectionStatus::Open);
        info!(connection = %self.name, "Connection opened");
        Ok(self)
    }

    /// Disconnect the driver. On failure the connection stays open.
    pub async fn close(&self) -> DbResult<()> {
        let mut slot = self.driver.write().await;
        let Some(driver) = slot.as_ref() else {
            return Err(DbError::not_connected(&self.name));
        };

        self.set_status(ConnectionStatus::Closing);
        if let Err(e) = driver.disconnect().await {
            self.set_status(ConnectionStatus::Open);
            return Err(e);
        }
        *slot = None;
        self.set_status(ConnectionStatus::Closed);
        info!(connection = %self.name, "Connection closed");
        Ok(())
    }

    async fn driver(&self) -> DbResult<Arc<dyn Driver>> {
        self.driver
            .read()
            .await
            .clone()
            .ok_or_else(|| DbError::not_connected(&self.name))
    }

    fn instrumentation(&self) -> Instrumentation {
        Instrumentation::new(
            &self.name,
            self.hooks.clone(),
            self.slow_query_threshold(),
            self.max_query_execution_time(),
        )
    }

    /// A runner that borrows a pooled connection for each statement.
    pub async fn get_query_runner(&self) -> DbResult<QueryRunner> {
        let raw = self.driver().await?.pooled_runner().await?;
        Ok(QueryRunner::new(raw, self.instrumentation()))
    }

    /// A runner holding one dedicated connection, for transactions.
    pub async fn get_transaction_query_runner(&self) -> DbResult<TransactionRunner> {
        let driver = self.driver().await?;
        let dedicated = driver.dedicated_runner().await?;
        Ok(TransactionRunner::new(
            driver,
            dedicated,
            self.instrumentation(),
        ))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("options", &self.options)
            .finish()
    }
}
