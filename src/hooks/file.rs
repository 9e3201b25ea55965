//! Hook that appends query events to a log file.

use super::{LogLevel, LogOptions, QueryHook, format_statement};
use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Appends one timestamped line per event to a file.
///
/// Write failures are reported through `tracing` and otherwise ignored, so a
/// full disk never fails a query.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    options: LogOptions,
    file: Mutex<File>,
}

impl FileLogger {
    /// Open (or create) `path` in append mode.
    pub fn open(path: impl AsRef<Path>, options: impl Into<LogOptions>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                DbError::invalid_input(format!(
                    "Cannot open log file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self {
            path,
            options: options.into(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, level: LogLevel, message: &str) {
        if !self.options.enables(level) {
            return;
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("{} {}\n", timestamp, message);

        let result = match self.file.lock() {
            Ok(mut file) => file.write_all(line.as_bytes()),
            Err(poisoned) => poisoned.into_inner().write_all(line.as_bytes()),
        };

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to write query log");
        }
    }
}

impl QueryHook for FileLogger {
    fn on_query(&self, sql: &str, params: &[QueryParam]) {
        self.write_line(
            LogLevel::Query,
            &format!("query: {}", format_statement(sql, params)),
        );
    }

    fn on_error(&self, err: &DbError, sql: &str, params: &[QueryParam]) {
        self.write_line(
            LogLevel::Error,
            &format!(
                "query failed: {} -- ERROR: {}",
                format_statement(sql, params),
                err
            ),
        );
    }

    fn on_slow(&self, elapsed: Duration, sql: &str, params: &[QueryParam]) {
        self.write_line(
            LogLevel::Slow,
            &format!(
                "query is slow: {} -- EXECUTION TIME: {}ms",
                format_statement(sql, params),
                elapsed.as_millis()
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_writes_enabled_events() {
        let temp = NamedTempFile::new().unwrap();
        let logger = FileLogger::open(temp.path(), LogOptions::All).unwrap();

        logger.on_query("SELECT ?", &[QueryParam::Int(1)]);
        logger.on_slow(Duration::from_millis(75), "SELECT SLEEP(1)", &[]);
        logger.on_error(&DbError::internal("boom"), "SELEC 1", &[]);

        let contents = std::fs::read_to_string(temp.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("query: SELECT ? -- PARAMETERS: [1]"));
        assert!(lines[1].contains("query is slow: SELECT SLEEP(1)"));
        assert!(lines[1].ends_with("75ms"));
        assert!(lines[2].contains("query failed: SELEC 1"));
        assert!(lines[2].contains("boom"));
    }

    #[test]
    fn test_filters_disabled_levels() {
        let temp = NamedTempFile::new().unwrap();
        let logger = FileLogger::open(temp.path(), vec![LogLevel::Error]).unwrap();

        logger.on_query("SELECT 1", &[]);
        logger.on_slow(Duration::from_secs(2), "SELECT 1", &[]);

        let contents = std::fs::read_to_string(temp.path()).unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("query.log");
        assert!(matches!(
            FileLogger::open(&path, LogOptions::All),
            Err(DbError::InvalidInput { .. })
        ));
    }
}
