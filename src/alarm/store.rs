//! Alarm Store: SQLite-backed persistence (spec §6), schema grounded on the
//! original implementation's `alarm_storage.py`. Additive-column schema
//! evolution: a column added after the table already exists is tolerated by
//! ignoring the "duplicate column" error from `ALTER TABLE ADD COLUMN`.

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::error::VoiceError;

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub id: u64,
    pub time: NaiveDateTime,
    pub message: String,
    pub is_active: bool,
    pub theme: String,
    pub cheerword: Option<String>,
}

impl Alarm {
    pub fn use_cheerword(&self) -> bool {
        !matches!(self.theme.as_str(), "" | "ring")
    }
}

pub struct AlarmStore {
    conn: Mutex<Connection>,
}

impl AlarmStore {
    pub fn open(db_path: &Path) -> Result<Self, VoiceError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VoiceError::Alarm(format!("create data dir: {e}")))?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| VoiceError::Alarm(format!("open db: {e}")))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory store used when the on-disk path can't be opened (spec §7
    /// graceful degradation): alarms still work for this run, just aren't
    /// persisted across restarts.
    pub fn open_in_memory() -> Result<Self, VoiceError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VoiceError::Alarm(format!("open in-memory db: {e}")))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<(), VoiceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS alarms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time TEXT NOT NULL,
                message TEXT,
                is_active BOOLEAN DEFAULT 1,
                theme TEXT DEFAULT 'ring',
                cheerword TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(|e| VoiceError::Alarm(format!("create table: {e}")))?;

        // Additive columns for databases created before theme/cheerword existed.
        for stmt in [
            "ALTER TABLE alarms ADD COLUMN theme TEXT DEFAULT 'ring'",
            "ALTER TABLE alarms ADD COLUMN cheerword TEXT",
        ] {
            let _ = conn.execute(stmt, []); // Err == column already exists
        }
        Ok(())
    }

    pub fn add_alarm(&self, time: NaiveDateTime, message: &str, theme: &str) -> Result<u64, VoiceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alarms (time, message, is_active, theme) VALUES (?1, ?2, 1, ?3)",
            params![time.format(TIME_FMT).to_string(), message, theme],
        )
        .map_err(|e| VoiceError::Alarm(format!("insert: {e}")))?;
        Ok(conn.last_insert_rowid() as u64)
    }

    pub fn delete_alarm(&self, id: u64) -> Result<bool, VoiceError> {
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute("DELETE FROM alarms WHERE id = ?1", params![id])
            .map_err(|e| VoiceError::Alarm(format!("delete: {e}")))?;
        Ok(n > 0)
    }

    pub fn get_alarm(&self, id: u64) -> Result<Option<Alarm>, VoiceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, time, message, is_active, theme, cheerword FROM alarms WHERE id = ?1")
            .map_err(|e| VoiceError::Alarm(format!("prepare: {e}")))?;
        let row = stmt
            .query_row(params![id], row_to_alarm)
            .ok();
        Ok(row)
    }

    pub fn get_all_alarms(&self) -> Result<Vec<Alarm>, VoiceError> {
        self.query_alarms("SELECT id, time, message, is_active, theme, cheerword FROM alarms ORDER BY time")
    }

    pub fn get_active_alarms(&self) -> Result<Vec<Alarm>, VoiceError> {
        self.query_alarms(
            "SELECT id, time, message, is_active, theme, cheerword FROM alarms WHERE is_active = 1 ORDER BY time",
        )
    }

    fn query_alarms(&self, sql: &str) -> Result<Vec<Alarm>, VoiceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(|e| VoiceError::Alarm(format!("prepare: {e}")))?;
        let rows = stmt
            .query_map([], row_to_alarm)
            .map_err(|e| VoiceError::Alarm(format!("query: {e}")))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| VoiceError::Alarm(format!("row: {e}")))?);
        }
        Ok(out)
    }

    /// Deactivates an alarm atomically — used by the Scheduler's trigger
    /// path (spec invariant 4: active flips to false before the ringing
    /// callback is enqueued).
    pub fn deactivate(&self, id: u64) -> Result<bool, VoiceError> {
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute("UPDATE alarms SET is_active = 0 WHERE id = ?1", params![id])
            .map_err(|e| VoiceError::Alarm(format!("deactivate: {e}")))?;
        Ok(n > 0)
    }

    pub fn update_theme(&self, id: u64, theme: &str, cheerword: Option<&str>) -> Result<bool, VoiceError> {
        let conn = self.conn.lock().unwrap();
        let n = if let Some(cw) = cheerword {
            conn.execute(
                "UPDATE alarms SET theme = ?1, cheerword = ?2 WHERE id = ?3",
                params![theme, cw, id],
            )
        } else {
            conn.execute("UPDATE alarms SET theme = ?1 WHERE id = ?2", params![theme, id])
        }
        .map_err(|e| VoiceError::Alarm(format!("update theme: {e}")))?;
        Ok(n > 0)
    }

    pub fn clear_past_alarms(&self) -> Result<u64, VoiceError> {
        let conn = self.conn.lock().unwrap();
        let now = Local::now().naive_local().format(TIME_FMT).to_string();
        let n = conn
            .execute("DELETE FROM alarms WHERE time < ?1", params![now])
            .map_err(|e| VoiceError::Alarm(format!("clear past: {e}")))?;
        Ok(n as u64)
    }
}

fn row_to_alarm(row: &rusqlite::Row) -> rusqlite::Result<Alarm> {
    let id: i64 = row.get(0)?;
    let time_str: String = row.get(1)?;
    let message: Option<String> = row.get(2)?;
    let is_active: bool = row.get(3)?;
    let theme: Option<String> = row.get(4)?;
    let cheerword: Option<String> = row.get(5)?;

    let time = NaiveDateTime::parse_from_str(&time_str, TIME_FMT).unwrap_or_else(|_| Local::now().naive_local());

    Ok(Alarm {
        id: id as u64,
        time,
        message: message.unwrap_or_default(),
        is_active,
        theme: theme.filter(|t| !t.is_empty()).unwrap_or_else(|| "ring".to_string()),
        cheerword,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> (AlarmStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = AlarmStore::open(&dir.path().join("alarms.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn add_list_delete_roundtrip() {
        let (store, _dir) = store();
        let t = Local::now().naive_local() + Duration::hours(1);
        let id = store.add_alarm(t, "wake up", "ring").unwrap();
        let all = store.get_all_alarms().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert!(store.delete_alarm(id).unwrap());
        assert!(store.get_all_alarms().unwrap().is_empty());
    }

    #[test]
    fn deactivate_excludes_from_active_list() {
        let (store, _dir) = store();
        let t = Local::now().naive_local() + Duration::hours(1);
        let id = store.add_alarm(t, "x", "ring").unwrap();
        assert!(store.deactivate(id).unwrap());
        assert!(store.get_active_alarms().unwrap().is_empty());
        assert_eq!(store.get_all_alarms().unwrap().len(), 1);
    }

    #[test]
    fn clear_past_alarms_removes_only_expired() {
        let (store, _dir) = store();
        let past = Local::now().naive_local() - Duration::hours(1);
        let future = Local::now().naive_local() + Duration::hours(1);
        store.add_alarm(past, "old", "ring").unwrap();
        let keep_id = store.add_alarm(future, "new", "ring").unwrap();
        let removed = store.clear_past_alarms().unwrap();
        assert_eq!(removed, 1);
        let remaining = store.get_all_alarms().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep_id);
    }

    #[test]
    fn update_theme_with_cheerword() {
        let (store, _dir) = store();
        let id = store.add_alarm(Local::now().naive_local() + Duration::hours(1), "x", "ring").unwrap();
        assert!(store.update_theme(id, "cheer", Some("加油！")).unwrap());
        let a = store.get_alarm(id).unwrap().unwrap();
        assert_eq!(a.theme, "cheer");
        assert_eq!(a.cheerword.as_deref(), Some("加油！"));
        assert!(a.use_cheerword());
    }
}
