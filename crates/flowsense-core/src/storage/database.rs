//! SQLite-based session snapshot storage.
//!
//! Provides persistent storage for:
//! - Session snapshots (upserted by session id on every autosave/end)
//! - Aggregate statistics across stored sessions

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::sink::SnapshotSink;
use crate::error::{CoreError, DatabaseError, StoreError};
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_active_ms: i64,
    /// Sum of each session's stored `flowStateDuration`, which is the
    /// length of its most recent flow period, not all of its flow time.
    pub total_last_flow_ms: i64,
    pub total_keystrokes: u64,
    /// Sessions that recorded any flow time.
    pub flow_sessions: u64,
}

/// SQLite database for session snapshots.
pub struct Database {
    conn: Connection,
}

const SELECT_COLUMNS: &str = "id, start_time, end_time, duration_ms, is_active, is_paused,
     paused_duration_ms, files_json, keystrokes, active_time_ms,
     flow_state_detected, flow_state_duration_ms, interruptions";

impl Database {
    /// Open the database at `<data_dir>/flowsense.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("flowsense.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id                     TEXT PRIMARY KEY,
                    start_time             TEXT NOT NULL,
                    end_time               TEXT,
                    duration_ms            INTEGER NOT NULL,
                    is_active              INTEGER NOT NULL,
                    is_paused              INTEGER NOT NULL,
                    paused_duration_ms     INTEGER NOT NULL,
                    files_json             TEXT NOT NULL DEFAULT '[]',
                    keystrokes             INTEGER NOT NULL,
                    active_time_ms         INTEGER NOT NULL,
                    flow_state_detected    INTEGER NOT NULL,
                    flow_state_duration_ms INTEGER NOT NULL,
                    interruptions          INTEGER NOT NULL,
                    updated_at             TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert or replace the stored row for `snapshot.id`.
    pub fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let files = serde_json::to_string(&snapshot.files_worked_on)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO sessions (
                id, start_time, end_time, duration_ms, is_active, is_paused,
                paused_duration_ms, files_json, keystrokes, active_time_ms,
                flow_state_detected, flow_state_duration_ms, interruptions, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                snapshot.id,
                snapshot.start_time.to_rfc3339(),
                snapshot.end_time.map(|t| t.to_rfc3339()),
                snapshot.duration,
                snapshot.is_active,
                snapshot.is_paused,
                snapshot.paused_duration,
                files,
                snapshot.keystrokes as i64,
                snapshot.active_time,
                snapshot.flow_state_detected,
                snapshot.flow_state_duration,
                snapshot.interruptions,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionSnapshot>, DatabaseError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?1");
        let raw = self
            .conn
            .query_row(&sql, params![id], RawSession::from_row)
            .optional()?;
        raw.map(RawSession::into_snapshot).transpose()
    }

    /// Most recently started sessions first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSnapshot>, DatabaseError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sessions ORDER BY start_time DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], RawSession::from_row)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_snapshot()?);
        }
        Ok(sessions)
    }

    pub fn stats(&self) -> Result<Stats, DatabaseError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(active_time_ms), 0),
                    COALESCE(SUM(flow_state_duration_ms), 0),
                    COALESCE(SUM(keystrokes), 0),
                    COALESCE(SUM(CASE WHEN flow_state_duration_ms > 0 THEN 1 ELSE 0 END), 0)
             FROM sessions",
            [],
            |row| {
                Ok(Stats {
                    total_sessions: row.get::<_, i64>(0)? as u64,
                    total_active_ms: row.get(1)?,
                    total_last_flow_ms: row.get(2)?,
                    total_keystrokes: row.get::<_, i64>(3)? as u64,
                    flow_sessions: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}

impl SnapshotSink for Database {
    fn persist(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.save_snapshot(snapshot)
    }
}

/// Row as stored, before timestamp/JSON decoding.
struct RawSession {
    id: String,
    start_time: String,
    end_time: Option<String>,
    duration_ms: i64,
    is_active: bool,
    is_paused: bool,
    paused_duration_ms: i64,
    files_json: String,
    keystrokes: i64,
    active_time_ms: i64,
    flow_state_detected: bool,
    flow_state_duration_ms: i64,
    interruptions: u32,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            duration_ms: row.get(3)?,
            is_active: row.get(4)?,
            is_paused: row.get(5)?,
            paused_duration_ms: row.get(6)?,
            files_json: row.get(7)?,
            keystrokes: row.get(8)?,
            active_time_ms: row.get(9)?,
            flow_state_detected: row.get(10)?,
            flow_state_duration_ms: row.get(11)?,
            interruptions: row.get(12)?,
        })
    }

    fn into_snapshot(self) -> Result<SessionSnapshot, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            id: self.id.clone(),
            message,
        };
        let start_time = parse_time(&self.start_time).map_err(&corrupt)?;
        let end_time = self
            .end_time
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(&corrupt)?;
        let files_worked_on: Vec<String> =
            serde_json::from_str(&self.files_json).map_err(|e| corrupt(e.to_string()))?;

        Ok(SessionSnapshot {
            id: self.id.clone(),
            start_time,
            end_time,
            duration: self.duration_ms,
            is_active: self.is_active,
            is_paused: self.is_paused,
            paused_duration: self.paused_duration_ms,
            files_worked_on,
            keystrokes: self.keystrokes.max(0) as u64,
            active_time: self.active_time_ms,
            flow_state_detected: self.flow_state_detected,
            flow_state_duration: self.flow_state_duration_ms,
            interruptions: self.interruptions,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn snapshot(id: &str, start_hour: u32, active_ms: i64, flow_ms: i64) -> SessionSnapshot {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, start_hour, 0, 0).unwrap();
        SessionSnapshot {
            id: id.into(),
            start_time: start,
            end_time: Some(start + Duration::milliseconds(active_ms)),
            duration: active_ms,
            is_active: false,
            is_paused: false,
            paused_duration: 0,
            files_worked_on: vec!["src/lib.rs".into(), "src/main.rs".into()],
            keystrokes: 120,
            active_time: active_ms,
            flow_state_detected: false,
            flow_state_duration: flow_ms,
            interruptions: 1,
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let db = Database::open_memory().unwrap();
        let snap = snapshot("s1", 9, 60_000, 0);
        db.save_snapshot(&snap).unwrap();
        assert_eq!(db.get_session("s1").unwrap(), Some(snap));
        assert_eq!(db.get_session("missing").unwrap(), None);
    }

    #[test]
    fn save_replaces_existing_row() {
        let mut db = Database::open_memory().unwrap();
        let mut snap = snapshot("s1", 9, 60_000, 0);
        db.persist(&snap).unwrap();
        snap.keystrokes = 500;
        snap.is_active = true;
        snap.end_time = None;
        db.persist(&snap).unwrap();

        let stored = db.get_session("s1").unwrap().unwrap();
        assert_eq!(stored.keystrokes, 500);
        assert!(stored.end_time.is_none());
        assert_eq!(db.stats().unwrap().total_sessions, 1);
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let db = Database::open_memory().unwrap();
        for (i, hour) in [9, 11, 10].into_iter().enumerate() {
            db.save_snapshot(&snapshot(&format!("s{i}"), hour, 1_000, 0))
                .unwrap();
        }
        let ids: Vec<String> = db
            .list_sessions(2)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn stats_aggregate_all_sessions() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.stats().unwrap(), Stats::default());

        db.save_snapshot(&snapshot("a", 9, 60_000, 20_000)).unwrap();
        db.save_snapshot(&snapshot("b", 10, 30_000, 0)).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_active_ms, 90_000);
        assert_eq!(stats.total_last_flow_ms, 20_000);
        assert_eq!(stats.total_keystrokes, 240);
        assert_eq!(stats.flow_sessions, 1);
    }

    #[test]
    fn flow_total_counts_only_last_stored_period() {
        let db = Database::open_memory().unwrap();
        // Two flow periods of 20s and 15s; only the most recent is stored.
        db.save_snapshot(&snapshot("a", 9, 60_000, 15_000)).unwrap();
        let json = serde_json::to_value(db.stats().unwrap()).unwrap();
        assert_eq!(json["total_last_flow_ms"], 15_000);
        assert!(json.get("total_flow_ms").is_none());
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.save_snapshot(&snapshot("x", 9, 1_000, 0)).unwrap();
        }
        let reopened = Database::open_at(&path).unwrap();
        assert!(reopened.get_session("x").unwrap().is_some());
    }
}
