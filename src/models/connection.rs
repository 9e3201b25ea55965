//! Connection-related data models.
//!
//! This module defines the connection options, the engine-tagged driver
//! configuration and the transaction state types.

use crate::config::{DEFAULT_CONNECTION_NAME, DEFAULT_MAX_QUERY_EXECUTION_TIME, PoolOptions};
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::hooks::QueryHook;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::PostgreSQL => 5432,
            Self::MySQL => 3306,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Replace the password of a connection URL with `****`.
///
/// Strings that do not parse as URLs are returned unchanged.
pub fn masked_url(connection_string: &str) -> String {
    match url::Url::parse(connection_string) {
        Ok(mut url) if url.password().is_some() => {
            // set_password only fails for cannot-be-a-base URLs, which have no password
            let _ = url.set_password(Some("****"));
            url.to_string()
        }
        _ => connection_string.to_string(),
    }
}

fn mask_secret(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "****")
}

/// MySQL / MariaDB engine parameters.
///
/// `url`, when set, supplies the base parameters. Each discrete field that is
/// set overrides the matching part of the URL.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MySqlDriverOptions {
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
    /// Default: utf8mb4
    pub charset: Option<String>,
    #[serde(default)]
    pub pool: PoolOptions,
}

impl MySqlDriverOptions {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for MySqlDriverOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlDriverOptions")
            .field("url", &self.url.as_deref().map(masked_url))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &mask_secret(&self.password))
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("pool", &self.pool)
            .finish()
    }
}

/// PostgreSQL engine parameters.
///
/// `url`, when set, supplies the base parameters. Each discrete field that is
/// set overrides the matching part of the URL.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PostgresDriverOptions {
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
    pub application_name: Option<String>,
    #[serde(default)]
    pub pool: PoolOptions,
}

impl PostgresDriverOptions {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for PostgresDriverOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDriverOptions")
            .field("url", &self.url.as_deref().map(masked_url))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &mask_secret(&self.password))
            .field("database", &self.database)
            .field("application_name", &self.application_name)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Engine-tagged driver configuration, resolved to a driver when a connection opens.
#[derive(Clone)]
pub enum DriverConfig {
    MySql(MySqlDriverOptions),
    Postgres(PostgresDriverOptions),
    /// A caller-supplied driver implementation, used as-is.
    Custom(Arc<dyn Driver>),
}

impl DriverConfig {
    /// Build a driver configuration from a connection URL, detecting the engine from its scheme.
    pub fn from_url(url: &str) -> DbResult<Self> {
        match DatabaseType::from_connection_string(url) {
            Some(DatabaseType::MySQL) => Ok(Self::MySql(MySqlDriverOptions::from_url(url))),
            Some(DatabaseType::PostgreSQL) => {
                Ok(Self::Postgres(PostgresDriverOptions::from_url(url)))
            }
            None => Err(DbError::invalid_input(format!(
                "Unknown database type in connection string: {}",
                masked_url(url)
            ))),
        }
    }

    /// Wrap a caller-supplied driver.
    pub fn custom<D: Driver + 'static>(driver: D) -> Self {
        Self::Custom(Arc::new(driver))
    }

    /// Engine this configuration targets.
    pub fn database_type(&self) -> DatabaseType {
        match self {
            Self::MySql(_) => DatabaseType::MySQL,
            Self::Postgres(_) => DatabaseType::PostgreSQL,
            Self::Custom(driver) => driver.database_type(),
        }
    }

    fn validate(&self) -> DbResult<()> {
        let pool = match self {
            Self::MySql(opts) => &opts.pool,
            Self::Postgres(opts) => &opts.pool,
            Self::Custom(_) => return Ok(()),
        };
        pool.validate().map_err(DbError::invalid_input)
    }
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MySql(opts) => f.debug_tuple("MySql").field(opts).finish(),
            Self::Postgres(opts) => f.debug_tuple("Postgres").field(opts).finish(),
            Self::Custom(driver) => f
                .debug_tuple("Custom")
                .field(&driver.database_type())
                .finish(),
        }
    }
}

/// Configuration for a connection registered with a
/// [`ConnectionManager`](crate::db::ConnectionManager).
#[derive(Clone)]
pub struct ConnectionOptions {
    /// Default: "default". Must be unique among open connections of a manager.
    pub name: Option<String>,
    pub driver: DriverConfig,
    /// Invoked in registration order for every statement.
    pub hooks: Vec<Arc<dyn QueryHook>>,
    /// Default: 60s. Exceeding it is logged, never enforced.
    pub max_query_execution_time: Option<Duration>,
    /// Default: the max query execution time.
    pub slow_query_threshold: Option<Duration>,
}

impl ConnectionOptions {
    pub fn new(driver: DriverConfig) -> Self {
        Self {
            name: None,
            driver,
            hooks: Vec::new(),
            max_query_execution_time: None,
            slow_query_threshold: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register a hook.
    pub fn with_hook<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Register a hook that is shared with other owners (e.g. a test observer).
    pub fn with_shared_hook(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_max_query_execution_time(mut self, limit: Duration) -> Self {
        self.max_query_execution_time = Some(limit);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Connection name, falling back to "default".
    pub fn resolved_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_CONNECTION_NAME)
    }

    pub fn effective_max_query_execution_time(&self) -> Duration {
        self.max_query_execution_time
            .unwrap_or(DEFAULT_MAX_QUERY_EXECUTION_TIME)
    }

    pub fn effective_slow_query_threshold(&self) -> Duration {
        self.slow_query_threshold
            .unwrap_or_else(|| self.effective_max_query_execution_time())
    }

    /// Validate the options before a connection is created from them.
    pub fn validate(&self) -> DbResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DbError::invalid_input("Connection name cannot be empty"));
        }
        self.driver.validate()
    }
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("name", &self.resolved_name())
            .field("driver", &self.driver)
            .field("hooks", &self.hooks.len())
            .field("max_query_execution_time", &self.max_query_execution_time)
            .field("slow_query_threshold", &self.slow_query_threshold)
            .finish()
    }
}

/// State of a [`TransactionRunner`](crate::db::TransactionRunner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
    /// The dedicated connection has been handed back to the driver
    Released,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Released => "released",
        }
    }

    /// Check if the transaction is still active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the transaction has ended (committed or rolled back).
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL standard transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = DbError;

    /// Accepts "READ COMMITTED", "read_committed", "read-committed" and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        match normalized.as_str() {
            "READ UNCOMMITTED" => Ok(Self::ReadUncommitted),
            "READ COMMITTED" => Ok(Self::ReadCommitted),
            "REPEATABLE READ" => Ok(Self::RepeatableRead),
            "SERIALIZABLE" => Ok(Self::Serializable),
            _ => Err(DbError::invalid_input(format!(
                "Unknown isolation level: {}",
                s
            ))),
        }
    }
}
