//! In-memory driver and recording hook shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use db_mediator::error::{DbError, DbResult};
use db_mediator::models::{DatabaseType, QueryOutput, QueryParam};
use db_mediator::{DedicatedRunner, Driver, QueryHook, RawRunner, ReleaseMode};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the mock driver observed, plus knobs to make it misbehave.
#[derive(Default)]
pub struct MockState {
    pub statements: Mutex<Vec<String>>,
    pub releases: Mutex<Vec<ReleaseMode>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub checkouts: AtomicUsize,
    pub connected: AtomicBool,
    pub fail_connect: AtomicBool,
    pub fail_disconnect: AtomicBool,
    pub fail_release: AtomicBool,
    /// Statements containing this text fail
    pub fail_on: Mutex<Option<String>>,
    pub delay: Mutex<Duration>,
    /// Added to every connect and disconnect
    pub lifecycle_delay: Mutex<Duration>,
}

impl MockState {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn releases(&self) -> Vec<ReleaseMode> {
        self.releases.lock().unwrap().clone()
    }

    pub fn fail_on(&self, fragment: &str) {
        *self.fail_on.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_lifecycle_delay(&self, delay: Duration) {
        *self.lifecycle_delay.lock().unwrap() = delay;
    }

    async fn lifecycle_pause(&self) {
        let delay = *self.lifecycle_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        self.statements.lock().unwrap().push(sql.to_string());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self.fail_on.lock().unwrap().clone();
        if failing.is_some_and(|fragment| sql.contains(&fragment)) {
            return Err(DbError::database(
                format!("mock failure for: {}", sql),
                Some("42000".to_string()),
                "Check the SQL syntax and referenced objects",
            ));
        }

        let mut output = QueryOutput::default();
        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            let mut row = serde_json::Map::new();
            row.insert("value".to_string(), json!(params.len() as i64 + 1));
            output.rows.push(row);
        } else {
            output.rows_affected = 1;
        }
        Ok(output)
    }
}

/// Driver that records statements instead of talking to a server.
pub struct MockDriver {
    db_type: DatabaseType,
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            state: Arc::new(MockState::default()),
        }
    }

    pub fn mysql() -> Self {
        Self::new(DatabaseType::MySQL)
    }

    pub fn postgres() -> Self {
        Self::new(DatabaseType::PostgreSQL)
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    fn require_connected(&self) -> DbResult<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::connection("mock pool does not exist", "connect first"))
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn connect(&self) -> DbResult<()> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.lifecycle_pause().await;
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DbError::connection("connection refused", "start the server"));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> DbResult<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state.lifecycle_pause().await;
        if self.state.fail_disconnect.load(Ordering::SeqCst) {
            return Err(DbError::internal("mock disconnect failure"));
        }
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn pooled_runner(&self) -> DbResult<Arc<dyn RawRunner>> {
        self.require_connected()?;
        Ok(Arc::new(MockRunner {
            state: self.state(),
            released: false,
        }))
    }

    async fn dedicated_runner(&self) -> DbResult<Box<dyn DedicatedRunner>> {
        self.require_connected()?;
        self.state.checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRunner {
            state: self.state(),
            released: false,
        }))
    }
}

struct MockRunner {
    state: Arc<MockState>,
    released: bool,
}

#[async_trait]
impl RawRunner for MockRunner {
    async fn run(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryOutput> {
        if self.released {
            return Err(DbError::connection("mock runner released", "get a new runner"));
        }
        self.state.execute(sql, params).await
    }
}

#[async_trait]
impl DedicatedRunner for MockRunner {
    async fn release(&mut self, mode: ReleaseMode) -> DbResult<()> {
        self.released = true;
        self.state.releases.lock().unwrap().push(mode);
        if self.state.fail_release.load(Ordering::SeqCst) {
            return Err(DbError::internal("mock release failure"));
        }
        Ok(())
    }
}

/// One hook notification.
#[derive(Debug, Clone, PartialEq)]
pub enum HookCall {
    Query(String),
    Error(String),
    Slow(String, Duration),
}

/// Hook that remembers every notification it receives.
#[derive(Default)]
pub struct RecordingHook {
    calls: Mutex<Vec<HookCall>>,
}

impl RecordingHook {
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HookCall::Query(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn slow_calls(&self) -> Vec<(String, Duration)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HookCall::Slow(sql, elapsed) => Some((sql, elapsed)),
                _ => None,
            })
            .collect()
    }
}

impl QueryHook for RecordingHook {
    fn on_query(&self, sql: &str, _params: &[QueryParam]) {
        self.calls.lock().unwrap().push(HookCall::Query(sql.to_string()));
    }

    fn on_error(&self, _error: &DbError, sql: &str, _params: &[QueryParam]) {
        self.calls.lock().unwrap().push(HookCall::Error(sql.to_string()));
    }

    fn on_slow(&self, elapsed: Duration, sql: &str, _params: &[QueryParam]) {
        self.calls
            .lock()
            .unwrap()
            .push(HookCall::Slow(sql.to_string(), elapsed));
    }
}

/// Hook that panics on every notification.
pub struct PanickingHook;

impl QueryHook for PanickingHook {
    fn on_query(&self, _sql: &str, _params: &[QueryParam]) {
        panic!("hook exploded");
    }

    fn on_error(&self, _error: &DbError, _sql: &str, _params: &[QueryParam]) {
        panic!("hook exploded");
    }
}
