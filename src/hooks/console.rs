//! Hook that writes query events through `tracing`.

use super::{LogLevel, LogOptions, QueryHook, format_statement};
use crate::error::DbError;
use crate::models::QueryParam;
use std::time::Duration;
use tracing::{error, info, warn};

/// Logs statements, failures and slow queries as tracing events under the
/// `db_mediator::query` target.
///
/// Output goes wherever the installed subscriber sends it; see
/// [`init_tracing`](crate::config::init_tracing).
#[derive(Debug, Clone, Default)]
pub struct ConsoleLogger {
    options: LogOptions,
}

impl ConsoleLogger {
    pub fn new(options: impl Into<LogOptions>) -> Self {
        Self {
            options: options.into(),
        }
    }

    pub fn options(&self) -> &LogOptions {
        &self.options
    }
}

impl QueryHook for ConsoleLogger {
    fn on_query(&self, sql: &str, params: &[QueryParam]) {
        if self.options.enables(LogLevel::Query) {
            info!(target: "db_mediator::query", "query: {}", format_statement(sql, params));
        }
    }

    fn on_error(&self, err: &DbError, sql: &str, params: &[QueryParam]) {
        if self.options.enables(LogLevel::Error) {
            error!(
                target: "db_mediator::query",
                error = %err,
                "query failed: {}",
                format_statement(sql, params)
            );
        }
    }

    fn on_slow(&self, elapsed: Duration, sql: &str, params: &[QueryParam]) {
        if self.options.enables(LogLevel::Slow) {
            warn!(
                target: "db_mediator::query",
                elapsed_ms = elapsed.as_millis() as u64,
                "query is slow: {}",
                format_statement(sql, params)
            );
        }
    }
}
