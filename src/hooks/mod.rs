//! Query hooks.
//!
//! Hooks observe statement execution without influencing it. Every statement
//! issued through a runner produces an `on_query` notification, followed by
//! `on_slow` (successful but over the slow-query threshold) or `on_error`.
//!
//! Hooks run synchronously in registration order. A panicking hook is caught
//! and logged; the statement's result is returned to the caller unchanged.

pub mod console;
pub mod file;

pub use console::ConsoleLogger;
pub use file::FileLogger;

use crate::error::DbError;
use crate::models::QueryParam;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Observer of statement execution.
///
/// All methods default to doing nothing so implementors only override the
/// events they care about.
pub trait QueryHook: Send + Sync {
    /// Called before a statement is sent to the driver.
    fn on_query(&self, _sql: &str, _params: &[QueryParam]) {}

    /// Called after a statement failed. The caller receives `error` afterwards.
    fn on_error(&self, _error: &DbError, _sql: &str, _params: &[QueryParam]) {}

    /// Called after a statement succeeded but took longer than the slow-query threshold.
    fn on_slow(&self, _elapsed: Duration, _sql: &str, _params: &[QueryParam]) {}
}

/// A single notification delivered to every registered hook.
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    Query {
        sql: &'a str,
        params: &'a [QueryParam],
    },
    Error {
        error: &'a DbError,
        sql: &'a str,
        params: &'a [QueryParam],
    },
    Slow {
        elapsed: Duration,
        sql: &'a str,
        params: &'a [QueryParam],
    },
}

impl HookEvent<'_> {
    pub fn kind(&self) -> LogLevel {
        match self {
            Self::Query { .. } => LogLevel::Query,
            Self::Error { .. } => LogLevel::Error,
            Self::Slow { .. } => LogLevel::Slow,
        }
    }

    fn deliver(&self, hook: &dyn QueryHook) {
        match *self {
            Self::Query { sql, params } => hook.on_query(sql, params),
            Self::Error { error, sql, params } => hook.on_error(error, sql, params),
            Self::Slow {
                elapsed,
                sql,
                params,
            } => hook.on_slow(elapsed, sql, params),
        }
    }
}

/// Ordered, shareable list of hooks for one connection.
#[derive(Clone, Default)]
pub struct QueryHooks {
    hooks: Arc<[Arc<dyn QueryHook>]>,
}

impl QueryHooks {
    pub fn new(hooks: Vec<Arc<dyn QueryHook>>) -> Self {
        Self {
            hooks: hooks.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Deliver `event` to every hook in registration order.
    ///
    /// A hook that panics is skipped; the remaining hooks still run.
    pub fn emit(&self, event: HookEvent<'_>) {
        for (index, hook) in self.hooks.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| event.deliver(hook.as_ref())));
            if outcome.is_err() {
                warn!(
                    hook_index = index,
                    event = ?event.kind(),
                    "Query hook panicked; notification dropped"
                );
            }
        }
    }
}

impl std::fmt::Debug for QueryHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHooks")
            .field("len", &self.hooks.len())
            .finish()
    }
}

/// Category of hook event, used by loggers to filter output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Query,
    Error,
    Slow,
}

/// Which events a logger writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOptions {
    All,
    Disabled,
    Levels(Vec<LogLevel>),
}

impl LogOptions {
    pub fn enables(&self, level: LogLevel) -> bool {
        match self {
            Self::All => true,
            Self::Disabled => false,
            Self::Levels(levels) => levels.contains(&level),
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::All
    }
}

impl From<bool> for LogOptions {
    fn from(enabled: bool) -> Self {
        if enabled { Self::All } else { Self::Disabled }
    }
}

impl From<Vec<LogLevel>> for LogOptions {
    fn from(levels: Vec<LogLevel>) -> Self {
        Self::Levels(levels)
    }
}

/// Render a statement and its parameters on one line.
pub(crate) fn format_statement(sql: &str, params: &[QueryParam]) -> String {
    if params.is_empty() {
        sql.to_string()
    } else {
        format!(
            "{} -- PARAMETERS: {}",
            sql,
            crate::models::stringify_params(params)
        )
    }
}

/// Hook that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl QueryHook for NoopLogger {}
