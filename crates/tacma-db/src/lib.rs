//! Storage layer for the tacma tracker.
//!
//! Persists [`TrackerSnapshot`]s using `rusqlite`. Only raw logs are stored;
//! derived series are rebuilt by the core when a snapshot is restored.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Move it between threads freely, but share it only behind a lock.
//!
//! # Schema
//!
//! - `meta(key, value)`: tracker-wide values; `start_date` holds the time
//!   origin as RFC 3339 text
//! - `activities`: one row per activity
//! - `onoff(activity_id, seq, at)`: toggle log, `seq` orders the entries
//! - `priorities(activity_id, seq, at, value)`: priority log
//!
//! All timestamps except `start_date` are integer seconds since the origin.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tacma_core::{
    ActivityId, ActivityRecord, ParseWarning, PriorityChange, Timestamp, TrackerSnapshot,
};
use thiserror::Error;

const START_DATE_KEY: &str = "start_date";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to create or replace a file next to the database.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for `{key}`: {timestamp}")]
    TimestampParse {
        key: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Stored data cannot be turned into a snapshot.
    #[error("corrupt database: {0}")]
    Corrupt(String),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A loaded snapshot together with the fields that had to be defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub snapshot: TrackerSnapshot,
    pub warnings: Vec<ParseWarning>,
}

struct ActivityRow {
    id: ActivityId,
    name: String,
    comment: Option<String>,
    created: Timestamp,
    finished: Option<Timestamp>,
    archived_stop: Option<Timestamp>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                comment TEXT,
                created INTEGER NOT NULL,
                finished INTEGER,
                archived_stop INTEGER
            );

            -- Toggle log: an odd number of rows means the activity is running
            CREATE TABLE IF NOT EXISTS onoff (
                activity_id INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                at INTEGER NOT NULL,
                PRIMARY KEY (activity_id, seq),
                FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS priorities (
                activity_id INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                at INTEGER NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (activity_id, seq),
                FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    /// Whether nothing has been saved yet.
    pub fn is_empty(&self) -> Result<bool, DbError> {
        let meta: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM meta", [], |row| row.get(0))?;
        let activities: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))?;
        Ok(meta == 0 && activities == 0)
    }

    /// Replaces the stored data with `snapshot` in a single transaction.
    pub fn save_snapshot(&mut self, snapshot: &TrackerSnapshot) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DELETE FROM priorities;
            DELETE FROM onoff;
            DELETE FROM activities;
            DELETE FROM meta;
            ",
        )?;
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            params![START_DATE_KEY, format_timestamp(snapshot.start_date)],
        )?;
        {
            let mut activity_stmt = tx.prepare(
                "
                INSERT INTO activities (id, name, comment, created, finished, archived_stop)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            let mut onoff_stmt =
                tx.prepare("INSERT INTO onoff (activity_id, seq, at) VALUES (?, ?, ?)")?;
            let mut priority_stmt = tx.prepare(
                "INSERT INTO priorities (activity_id, seq, at, value) VALUES (?, ?, ?, ?)",
            )?;
            for record in &snapshot.activities {
                let id = record.id.value();
                activity_stmt.execute(params![
                    id,
                    record.name,
                    record.comment,
                    record.created,
                    record.finished,
                    record.archived_stop,
                ])?;
                for (seq, at) in record.onoff.iter().enumerate() {
                    onoff_stmt.execute(params![id, seq, at])?;
                }
                for (seq, change) in record.priority.iter().enumerate() {
                    priority_stmt.execute(params![id, seq, change.at, change.value])?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(
            activities = snapshot.activities.len(),
            "saved snapshot"
        );
        Ok(())
    }

    /// Reads the stored snapshot.
    ///
    /// Missing optional fields are defaulted and reported in
    /// [`LoadReport::warnings`]. Missing required data is an error.
    pub fn load_snapshot(&self) -> Result<LoadReport, DbError> {
        let start_date = self.start_date()?;
        let mut onoff = self.load_onoff()?;
        let mut priorities = self.load_priorities()?;

        let mut stmt = self.conn.prepare(
            "
            SELECT id, name, comment, created, finished, archived_stop
            FROM activities
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ActivityRow {
                id: ActivityId::new(row.get(0)?),
                name: row.get(1)?,
                comment: row.get(2)?,
                created: row.get(3)?,
                finished: row.get(4)?,
                archived_stop: row.get(5)?,
            })
        })?;

        let mut activities = Vec::new();
        let mut warnings = Vec::new();
        for row in rows {
            let row = row?;
            let priority = priorities.remove(&row.id).unwrap_or_default();
            if priority.is_empty() {
                return Err(DbError::Corrupt(format!(
                    "activity {} has no priority log",
                    row.id
                )));
            }
            let comment = row.comment.unwrap_or_else(|| {
                warnings.push(ParseWarning {
                    activity: row.id,
                    field: "comment",
                    message: "missing, defaulted to empty".to_string(),
                });
                String::new()
            });
            let archived_stop = row.archived_stop.unwrap_or_else(|| {
                warnings.push(ParseWarning {
                    activity: row.id,
                    field: "archived_stop",
                    message: "missing, defaulted to creation time".to_string(),
                });
                row.created
            });
            activities.push(ActivityRecord {
                id: row.id,
                name: row.name,
                comment,
                created: row.created,
                finished: row.finished,
                onoff: onoff.remove(&row.id).unwrap_or_default(),
                priority,
                archived_stop,
            });
        }

        tracing::debug!(
            activities = activities.len(),
            warnings = warnings.len(),
            "loaded snapshot"
        );
        Ok(LoadReport {
            snapshot: TrackerSnapshot {
                start_date,
                activities,
            },
            warnings,
        })
    }

    /// Writes a consistent copy of the database to `path`, replacing any
    /// existing file.
    pub fn backup_to(&self, path: &Path) -> Result<(), DbError> {
        let staging = staging_path(path);
        if staging.exists() {
            std::fs::remove_file(&staging)?;
        }
        let target = staging.to_string_lossy().into_owned();
        self.conn.execute("VACUUM INTO ?", [target])?;
        std::fs::rename(&staging, path)?;
        tracing::debug!(path = %path.display(), "wrote backup");
        Ok(())
    }

    fn start_date(&self) -> Result<DateTime<Utc>, DbError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                [START_DATE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let value = value.ok_or_else(|| DbError::Corrupt("start date is missing".to_string()))?;
        parse_timestamp(&value, START_DATE_KEY)
    }

    fn load_onoff(&self) -> Result<BTreeMap<ActivityId, Vec<Timestamp>>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT activity_id, at FROM onoff ORDER BY activity_id ASC, seq ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((ActivityId::new(row.get(0)?), row.get::<_, Timestamp>(1)?))
        })?;
        let mut logs: BTreeMap<ActivityId, Vec<Timestamp>> = BTreeMap::new();
        for row in rows {
            let (id, at) = row?;
            logs.entry(id).or_default().push(at);
        }
        Ok(logs)
    }

    fn load_priorities(&self) -> Result<BTreeMap<ActivityId, Vec<PriorityChange>>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT activity_id, at, value
            FROM priorities
            ORDER BY activity_id ASC, seq ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                ActivityId::new(row.get(0)?),
                PriorityChange::new(row.get(1)?, row.get(2)?),
            ))
        })?;
        let mut logs: BTreeMap<ActivityId, Vec<PriorityChange>> = BTreeMap::new();
        for row in rows {
            let (id, change) = row?;
            logs.entry(id).or_default().push(change);
        }
        Ok(logs)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

fn parse_timestamp(timestamp: &str, key: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            key: key.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
