use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::HistoryError;
use crate::exercise::ExerciseMode;
use crate::util::mean;

pub type Result<T> = std::result::Result<T, HistoryError>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS interactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        exercise TEXT NOT NULL,
        mode TEXT NOT NULL,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        cycles INTEGER NOT NULL DEFAULT 0,
        completed BOOLEAN NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_interactions_started_at ON interactions(started_at);
"#;

/// One breathing session as persisted in the log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub exercise: String,
    pub mode: String,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub cycles: u64,
    pub completed: bool,
}

impl InteractionRecord {
    pub fn duration_secs(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_seconds().max(0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub sessions: u64,
    pub completed: u64,
    pub total_minutes: f64,
    /// Mean length of completed sessions, in minutes
    pub mean_completed_minutes: Option<f64>,
}

/// Local store of session start/end records
#[derive(Debug)]
pub struct SessionLog {
    conn: Connection,
}

impl SessionLog {
    /// Opens the log under the application state directory
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("cesizen_sessions.db"));
        Self::with_path(db_path)
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SessionLog { conn })
    }

    /// Records a session start and returns its id
    pub fn record_start(
        &self,
        exercise: &str,
        mode: ExerciseMode,
        started_at: DateTime<Local>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO interactions (exercise, mode, started_at) VALUES (?1, ?2, ?3)",
            params![exercise, mode.to_string(), started_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Closes a session. Closing twice keeps the first end.
    pub fn record_end(
        &self,
        id: i64,
        ended_at: DateTime<Local>,
        cycles: u64,
        completed: bool,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            r#"
            UPDATE interactions
            SET ended_at = ?2, cycles = ?3, completed = ?4
            WHERE id = ?1 AND ended_at IS NULL
            "#,
            params![id, ended_at.to_rfc3339(), cycles as i64, completed],
        )?;
        Ok(updated == 1)
    }

    pub fn get(&self, id: i64) -> Result<Option<InteractionRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT id, exercise, mode, started_at, ended_at, cycles, completed
                FROM interactions WHERE id = ?1
                "#,
                [id],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recent sessions first
    pub fn recent(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, exercise, mode, started_at, ended_at, cycles, completed
            FROM interactions
            ORDER BY started_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], read_record)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    pub fn summary(&self) -> Result<HistorySummary> {
        let records = self.recent(usize::MAX >> 1)?;

        let minutes: Vec<(f64, bool)> = records
            .iter()
            .filter_map(|r| r.duration_secs().map(|s| (s as f64 / 60.0, r.completed)))
            .collect();
        let completed_minutes: Vec<f64> = minutes
            .iter()
            .filter(|(_, completed)| *completed)
            .map(|(m, _)| *m)
            .collect();

        Ok(HistorySummary {
            sessions: records.len() as u64,
            completed: records.iter().filter(|r| r.completed).count() as u64,
            total_minutes: minutes.iter().map(|(m, _)| m).sum(),
            mean_completed_minutes: mean(&completed_minutes),
        })
    }

    /// Writes every session as CSV, oldest first. Returns the number of rows.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut records = self.recent(usize::MAX >> 1)?;
        records.reverse();

        let mut wtr = csv::Writer::from_writer(writer);
        for record in &records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(records.len())
    }

    /// Clear all sessions (for testing or reset purposes)
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM interactions", [])?;
        Ok(())
    }
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(idx, "timestamp".to_string(), rusqlite::types::Type::Text)
        })
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let started_at: String = row.get(3)?;
    let ended_at: Option<String> = row.get(4)?;
    let cycles: i64 = row.get(5)?;

    Ok(InteractionRecord {
        id: row.get(0)?,
        exercise: row.get(1)?,
        mode: row.get(2)?,
        started_at: parse_time(3, &started_at)?,
        ended_at: ended_at.as_deref().map(|s| parse_time(4, s)).transpose()?,
        cycles: cycles.max(0) as u64,
        completed: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(minutes_ago: i64) -> DateTime<Local> {
        Local::now() - Duration::minutes(minutes_ago)
    }

    #[test]
    fn test_record_start_and_end() {
        let log = SessionLog::open_in_memory().unwrap();
        let start = at(10);
        let id = log.record_start("Coherence", ExerciseMode::Guided, start).unwrap();

        let open = log.get(id).unwrap().unwrap();
        assert_eq!(open.exercise, "Coherence");
        assert_eq!(open.mode, "Guided");
        assert_eq!(open.ended_at, None);
        assert_eq!(open.duration_secs(), None);

        assert!(log.record_end(id, start + Duration::minutes(5), 30, true).unwrap());
        let closed = log.get(id).unwrap().unwrap();
        assert_eq!(closed.cycles, 30);
        assert!(closed.completed);
        assert_eq!(closed.duration_secs(), Some(300));
    }

    #[test]
    fn test_record_end_only_once() {
        let log = SessionLog::open_in_memory().unwrap();
        let id = log.record_start("Free exercise", ExerciseMode::Free, at(3)).unwrap();

        assert!(log.record_end(id, at(2), 4, false).unwrap());
        assert!(!log.record_end(id, at(1), 9, true).unwrap());

        let record = log.get(id).unwrap().unwrap();
        assert_eq!(record.cycles, 4);
        assert!(!record.completed);
    }

    #[test]
    fn test_get_missing() {
        let log = SessionLog::open_in_memory().unwrap();
        assert_eq!(log.get(42).unwrap(), None);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let log = SessionLog::open_in_memory().unwrap();
        log.record_start("old", ExerciseMode::Guided, at(30)).unwrap();
        log.record_start("new", ExerciseMode::Guided, at(1)).unwrap();
        log.record_start("mid", ExerciseMode::Free, at(10)).unwrap();

        let names: Vec<String> = log
            .recent(10)
            .unwrap()
            .into_iter()
            .map(|r| r.exercise)
            .collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
        assert_eq!(log.recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_summary() {
        let log = SessionLog::open_in_memory().unwrap();
        let a = log.record_start("a", ExerciseMode::Guided, at(20)).unwrap();
        log.record_end(a, at(16), 10, true).unwrap();
        let b = log.record_start("b", ExerciseMode::Guided, at(10)).unwrap();
        log.record_end(b, at(8), 5, true).unwrap();
        let c = log.record_start("c", ExerciseMode::Free, at(5)).unwrap();
        log.record_end(c, at(4), 1, false).unwrap();
        log.record_start("open", ExerciseMode::Free, at(1)).unwrap();

        let summary = log.summary().unwrap();
        assert_eq!(summary.sessions, 4);
        assert_eq!(summary.completed, 2);
        assert!((summary.total_minutes - 7.0).abs() < 0.05);
        assert!((summary.mean_completed_minutes.unwrap() - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_summary_empty() {
        let log = SessionLog::open_in_memory().unwrap();
        let summary = log.summary().unwrap();
        assert_eq!(summary.sessions, 0);
        assert_eq!(summary.mean_completed_minutes, None);
    }

    #[test]
    fn test_export_csv() {
        let log = SessionLog::open_in_memory().unwrap();
        let id = log.record_start("Coherence", ExerciseMode::Guided, at(6)).unwrap();
        log.record_end(id, at(1), 30, true).unwrap();
        log.record_start("Free exercise", ExerciseMode::Free, at(0)).unwrap();

        let mut out = Vec::new();
        assert_eq!(log.export_csv(&mut out).unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,exercise,mode,started_at,ended_at,cycles,completed");
        assert!(lines[1].starts_with("1,Coherence,Guided,"));
        assert!(lines[1].ends_with(",30,true"));
        assert!(lines[2].ends_with(",,0,false"));
    }

    #[test]
    fn test_clear_all() {
        let log = SessionLog::open_in_memory().unwrap();
        log.record_start("x", ExerciseMode::Guided, at(1)).unwrap();
        log.clear_all().unwrap();
        assert!(log.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_with_path_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sessions.db");
        let log = SessionLog::with_path(&path).unwrap();
        log.record_start("x", ExerciseMode::Guided, at(1)).unwrap();
        assert!(path.exists());

        let reopened = SessionLog::with_path(&path).unwrap();
        assert_eq!(reopened.recent(5).unwrap().len(), 1);
    }
}
