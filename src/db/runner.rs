//! Instrumented query runners.

use crate::driver::RawRunner;
use crate::error::DbResult;
use crate::hooks::{HookEvent, QueryHooks};
use crate::models::{QueryOutput, QueryParam};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Anything that can execute a statement on behalf of a caller.
///
/// Implemented by [`QueryRunner`] and
/// [`TransactionRunner`](crate::db::TransactionRunner) so helpers can accept
/// either.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput>;
}

/// Hook dispatch and timing shared by every runner of one connection.
#[derive(Debug, Clone)]
pub(crate) struct Instrumentation {
    connection: Arc<str>,
    hooks: QueryHooks,
    slow_query_threshold: Duration,
    max_query_execution_time: Duration,
}

impl Instrumentation {
    pub(crate) fn new(
        connection: &str,
        hooks: QueryHooks,
        slow_query_threshold: Duration,
        max_query_execution_time: Duration,
    ) -> Self {
        Self {
            connection: Arc::from(connection),
            hooks,
            slow_query_threshold,
            max_query_execution_time,
        }
    }

    pub(crate) fn connection(&self) -> &str {
        &self.connection
    }

    /// Run one statement through `runner`, notifying hooks around it.
    ///
    /// The runner's result is returned unchanged.
    pub(crate) async fn run<R>(
        &self,
        runner: &R,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<QueryOutput>
    where
        R: RawRunner + ?Sized,
    {
        self.hooks.emit(HookEvent::Query { sql, params });

        let started = Instant::now();
        let result = runner.run(sql, params).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(output) => {
                debug!(
                    connection = %self.connection,
                    elapsed_ms = elapsed.as_millis() as u64,
                    rows = output.row_count(),
                    rows_affected = output.rows_affected,
                    "Statement completed"
                );

                if elapsed > self.slow_query_threshold {
                    self.hooks.emit(HookEvent::Slow {
                        elapsed,
                        sql,
                        params,
                    });
                }

                if elapsed > self.max_query_execution_time {
                    warn!(
                        connection = %self.connection,
                        elapsed_ms = elapsed.as_millis() as u64,
                        limit_ms = self.max_query_execution_time.as_millis() as u64,
                        "Statement exceeded max query execution time"
                    );
                }
            }
            Err(error) => {
                debug!(
                    connection = %self.connection,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Statement failed"
                );
                self.hooks.emit(HookEvent::Error { error, sql, params });
            }
        }

        result
    }
}

/// Runner that borrows a pooled connection for each statement.
///
/// Cheap to clone; clones share the same pool and hooks.
#[derive(Clone)]
pub struct QueryRunner {
    raw: Arc<dyn RawRunner>,
    instrumentation: Instrumentation,
}

impl QueryRunner {
    pub(crate) fn new(raw: Arc<dyn RawRunner>, instrumentation: Instrumentation) -> Self {
        Self {
            raw,
            instrumentation,
        }
    }

    /// Name of the connection this runner belongs to.
    pub fn connection_name(&self) -> &str {
        self.instrumentation.connection()
    }

    pub async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        self.instrumentation.run(self.raw.as_ref(), sql, params).await
    }
}

impl std::fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner")
            .field("connection", &self.connection_name())
            .finish()
    }
}

#[async_trait]
impl SqlRunner for QueryRunner {
    async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        QueryRunner::run(self, sql, params).await
    }
}
