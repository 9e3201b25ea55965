//! Transactional query runner.
//!
//! A [`TransactionRunner`] owns one dedicated connection and walks it through
//! `NotStarted -> Active -> Committed | RolledBack -> Released`. Transaction
//! control statements are issued through the same instrumentation as user
//! statements, so hooks observe them too.

use super::runner::{Instrumentation, SqlRunner};
use crate::driver::{DedicatedRunner, Driver, ReleaseMode};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, IsolationLevel, QueryOutput, QueryParam, TransactionState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Statements that open a transaction on `db_type`.
pub(crate) fn begin_statements(
    db_type: DatabaseType,
    isolation_level: Option<IsolationLevel>,
) -> Vec<String> {
    match (db_type, isolation_level) {
        (DatabaseType::MySQL, Some(level)) => vec![
            format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
            "START TRANSACTION".to_string(),
        ],
        (DatabaseType::PostgreSQL, Some(level)) => {
            vec![format!("START TRANSACTION ISOLATION LEVEL {}", level.as_sql())]
        }
        (_, None) => vec!["START TRANSACTION".to_string()],
    }
}

/// Runner bound to one connection for the lifetime of a transaction.
///
/// State transitions take `&mut self`, so one runner cannot be driven from two
/// places at once. Always finish with [`release`](Self::release); a runner
/// dropped before that hands its connection back in the background and logs a
/// warning.
pub struct TransactionRunner {
    id: String,
    state: TransactionState,
    driver: Arc<dyn Driver>,
    runner: Option<Box<dyn DedicatedRunner>>,
    instrumentation: Instrumentation,
    /// Set once a begin statement has run, so session state may have changed
    /// even if the transaction never became active.
    begin_issued: bool,
}

impl TransactionRunner {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        runner: Box<dyn DedicatedRunner>,
        instrumentation: Instrumentation,
    ) -> Self {
        let id = format!("tx_{}", uuid::Uuid::new_v4().simple());
        debug!(
            connection = %instrumentation.connection(),
            transaction_id = %id,
            "Created transaction runner"
        );
        Self {
            id,
            state: TransactionState::NotStarted,
            driver,
            runner: Some(runner),
            instrumentation,
            begin_issued: false,
        }
    }

    /// Identifier used in logs and errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn connection_name(&self) -> &str {
        self.instrumentation.connection()
    }

    fn require(&self, operation: &str, expected: TransactionState) -> DbResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DbError::transaction_state(operation, self.state, &self.id))
        }
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        let runner = self
            .runner
            .as_deref()
            .ok_or_else(|| DbError::transaction_state("run", self.state, &self.id))?;
        self.instrumentation.run(runner, sql, params).await
    }

    /// Open the transaction, optionally at a specific isolation level.
    pub async fn start_transaction(
        &mut self,
        isolation_level: Option<IsolationLevel>,
    ) -> DbResult<()> {
        self.require("start_transaction", TransactionState::NotStarted)?;

        for statement in begin_statements(self.driver.database_type(), isolation_level) {
            self.execute(&statement, &[]).await?;
            self.begin_issued = true;
        }

        self.state = TransactionState::Active;
        info!(
            connection = %self.connection_name(),
            transaction_id = %self.id,
            isolation_level = ?isolation_level,
            "Transaction started"
        );
        Ok(())
    }

    /// Execute a statement inside the active transaction.
    pub async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        self.require("run", TransactionState::Active)?;
        self.execute(sql, params).await
    }

    pub async fn commit_transaction(&mut self) -> DbResult<()> {
        self.require("commit_transaction", TransactionState::Active)?;
        self.execute("COMMIT", &[]).await?;
        self.state = TransactionState::Committed;
        info!(
            connection = %self.connection_name(),
            transaction_id = %self.id,
            "Transaction committed"
        );
        Ok(())
    }

    pub async fn rollback_transaction(&mut self) -> DbResult<()> {
        self.require("rollback_transaction", TransactionState::Active)?;
        self.execute("ROLLBACK", &[]).await?;
        self.state = TransactionState::RolledBack;
        info!(
            connection = %self.connection_name(),
            transaction_id = %self.id,
            "Transaction rolled back"
        );
        Ok(())
    }

    /// Connections that may carry transaction or session state are closed
    /// rather than pooled.
    fn release_mode(&self) -> ReleaseMode {
        let half_started = self.state == TransactionState::NotStarted && self.begin_issued;
        if self.state.is_active() || half_started {
            ReleaseMode::Discard
        } else {
            ReleaseMode::ReturnToPool
        }
    }

    /// Hand the dedicated connection back to the driver.
    ///
    /// Releasing an active transaction, or one whose start failed part way,
    /// discards its connection instead of pooling it. The runner ends up `Released` even when the driver reports
    /// an error.
    pub async fn release(&mut self) -> DbResult<()> {
        if self.state == TransactionState::Released {
            return Err(DbError::transaction_state("release", self.state, &self.id));
        }

        let mode = self.release_mode();
        if mode == ReleaseMode::Discard {
            warn!(
                connection = %self.connection_name(),
                transaction_id = %self.id,
                state = %self.state,
                "Releasing an unfinished transaction; its connection will be discarded"
            );
        }

        self.state = TransactionState::Released;
        let Some(runner) = self.runner.take() else {
            return Ok(());
        };

        let result = self.driver.release_dedicated_runner(runner, mode).await;
        match &result {
            Ok(()) => debug!(
                connection = %self.connection_name(),
                transaction_id = %self.id,
                mode = ?mode,
                "Released dedicated connection"
            ),
            Err(e) => warn!(
                connection = %self.connection_name(),
                transaction_id = %self.id,
                error = %e,
                "Driver failed to release dedicated connection"
            ),
        }
        result
    }
}

impl std::fmt::Debug for TransactionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRunner")
            .field("id", &self.id)
            .field("connection", &self.connection_name())
            .field("state", &self.state)
            .finish()
    }
}

#[async_trait]
impl SqlRunner for TransactionRunner {
    async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        TransactionRunner::run(self, sql, params).await
    }
}

impl Drop for TransactionRunner {
    fn drop(&mut self) {
        let Some(runner) = self.runner.take() else {
            return;
        };

        warn!(
            connection = %self.connection_name(),
            transaction_id = %self.id,
            state = %self.state,
            "Transaction runner dropped without release"
        );

        let mode = self.release_mode();

        // Without a runtime the connection is simply dropped
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let driver = Arc::clone(&self.driver);
            let id = self.id.clone();
            handle.spawn(async move {
                if let Err(e) = driver.release_dedicated_runner(runner, mode).await {
                    warn!(transaction_id = %id, error = %e, "Background release failed");
                }
            });
        }
    }
}
