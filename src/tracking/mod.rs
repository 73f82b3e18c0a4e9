//! Experiment tracking - best-effort archive of training params and metrics

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, TryLockError};

use chrono::Utc;
use rusqlite::{Connection, params};
use serde_json::Value;

use crate::error::TrackingError;

/// Destination for training and prediction metadata.
///
/// Callers log and ignore every error; a sink must never block.
pub trait MetricsSink: Send + Sync {
    fn log_params(&self, run: &str, params: &BTreeMap<String, Value>) -> Result<(), TrackingError>;

    fn log_metrics(&self, run: &str, metrics: &BTreeMap<String, f64>) -> Result<(), TrackingError>;

    fn log_artifact(&self, run: &str, name: &str, bytes: &[u8]) -> Result<(), TrackingError>;
}

/// SQLite-backed sink
pub struct SqliteTracker {
    experiment: String,
    conn: Mutex<Connection>,
}

impl SqliteTracker {
    /// Open or create the tracker database
    pub fn open(path: impl AsRef<Path>, experiment: &str) -> Result<Self, TrackingError> {
        Self::with_connection(Connection::open(path)?, experiment)
    }

    pub fn open_in_memory(experiment: &str) -> Result<Self, TrackingError> {
        Self::with_connection(Connection::open_in_memory()?, experiment)
    }

    fn with_connection(conn: Connection, experiment: &str) -> Result<Self, TrackingError> {
        init_schema(&conn)?;
        Ok(Self {
            experiment: experiment.to_string(),
            conn: Mutex::new(conn),
        })
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Run `f` on the connection unless another writer holds it
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, TrackingError> {
        let conn = match self.conn.try_lock() {
            Ok(conn) => conn,
            Err(TryLockError::WouldBlock) => return Err(TrackingError::Busy),
            // A panicked writer leaves the connection usable
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        Ok(f(&conn)?)
    }

    /// Latest logged value of every metric in `run`
    pub fn metrics(&self, run: &str) -> Result<BTreeMap<String, f64>, TrackingError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM metrics WHERE experiment = ?1 AND run = ?2 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![self.experiment, run], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
    }

    pub fn params(&self, run: &str) -> Result<BTreeMap<String, Value>, TrackingError> {
        let raw: Vec<(String, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM params WHERE experiment = ?1 AND run = ?2 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![self.experiment, run], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })?;
        raw.into_iter()
            .map(|(k, v)| Ok((k, serde_json::from_str(&v)?)))
            .collect()
    }

    pub fn artifact(&self, run: &str, name: &str) -> Result<Option<Vec<u8>>, TrackingError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM artifacts WHERE experiment = ?1 AND run = ?2 AND name = ?3
                 ORDER BY id DESC LIMIT 1",
            )?;
            let mut rows = stmt.query_map(params![self.experiment, run, name], |row| row.get(0))?;
            rows.next().transpose()
        })
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS params (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment TEXT NOT NULL,
            run TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            logged_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment TEXT NOT NULL,
            run TEXT NOT NULL,
            key TEXT NOT NULL,
            value REAL NOT NULL,
            logged_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment TEXT NOT NULL,
            run TEXT NOT NULL,
            name TEXT NOT NULL,
            data BLOB NOT NULL,
            logged_at TEXT NOT NULL
        );",
    )
}

impl MetricsSink for SqliteTracker {
    fn log_params(&self, run: &str, params: &BTreeMap<String, Value>) -> Result<(), TrackingError> {
        let now = Utc::now().to_rfc3339();
        let encoded = params
            .iter()
            .map(|(k, v)| Ok((k.as_str(), serde_json::to_string(v)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        self.with_conn(|conn| {
            for (key, value) in &encoded {
                conn.execute(
                    "INSERT INTO params (experiment, run, key, value, logged_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![self.experiment, run, key, value, now],
                )?;
            }
            Ok(())
        })
    }

    fn log_metrics(&self, run: &str, metrics: &BTreeMap<String, f64>) -> Result<(), TrackingError> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            for (key, value) in metrics.iter().filter(|(_, v)| v.is_finite()) {
                conn.execute(
                    "INSERT INTO metrics (experiment, run, key, value, logged_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![self.experiment, run, key, value, now],
                )?;
            }
            Ok(())
        })
    }

    fn log_artifact(&self, run: &str, name: &str, bytes: &[u8]) -> Result<(), TrackingError> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO artifacts (experiment, run, name, data, logged_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![self.experiment, run, name, bytes, now],
            )?;
            Ok(())
        })
    }
}
