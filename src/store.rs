use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::clock::Millis;
use crate::error::Result;
use crate::game::GameKind;

/// One persisted game result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub game: GameKind,
    pub score: i64,
    pub elapsed_ms: Millis,
    pub timestamp: DateTime<Utc>,
    pub is_new_high_score: bool,
}

/// String key-value capability handed to whoever needs small settings
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Append-only result table
pub trait ResultStore {
    fn append(&mut self, record: &ResultRecord) -> Result<()>;
    /// Newest first; every game when `game` is `None`.
    fn results(&self, game: Option<GameKind>) -> Result<Vec<ResultRecord>>;
    fn high_score(&self, game: GameKind) -> Result<Option<i64>>;
    fn best_time(&self, game: GameKind) -> Result<Option<Millis>>;
}

pub trait Store: KvStore + ResultStore {
    /// Forget every result and key.
    fn clear_all(&mut self) -> Result<()>;
}

/// SQLite-backed store for results and settings
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game TEXT NOT NULL,
            score INTEGER NOT NULL,
            elapsed_ms INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            is_high_score BOOLEAN NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_game ON results(game)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;

    Ok(())
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open the database under the user's state directory
    pub fn open_default() -> Result<Self> {
        Self::open(AppDirs::db_path().unwrap_or_else(|| PathBuf::from("reflex.db")))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResultRecord> {
    let game: String = row.get(0)?;
    let game = GameKind::from_key(&game).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(0, "game".to_string(), rusqlite::types::Type::Text)
    })?;
    let timestamp: String = row.get(3)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "timestamp".to_string(), rusqlite::types::Type::Text)
        })?
        .with_timezone(&Utc);

    Ok(ResultRecord {
        game,
        score: row.get(1)?,
        elapsed_ms: row.get(2)?,
        timestamp,
        is_new_high_score: row.get(4)?,
    })
}

impl ResultStore for SqliteStore {
    fn append(&mut self, record: &ResultRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO results (game, score, elapsed_ms, timestamp, is_high_score)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.game.to_string(),
                record.score,
                record.elapsed_ms,
                record.timestamp.to_rfc3339(),
                record.is_new_high_score,
            ],
        )?;
        Ok(())
    }

    fn results(&self, game: Option<GameKind>) -> Result<Vec<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT game, score, elapsed_ms, timestamp, is_high_score
            FROM results
            WHERE ?1 IS NULL OR game = ?1
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([game.map(|g| g.to_string())], record_from_row)?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn high_score(&self, game: GameKind) -> Result<Option<i64>> {
        Ok(self.conn.query_row(
            "SELECT MAX(score) FROM results WHERE game = ?1",
            [game.to_string()],
            |row| row.get(0),
        )?)
    }

    fn best_time(&self, game: GameKind) -> Result<Option<Millis>> {
        Ok(self.conn.query_row(
            "SELECT MIN(elapsed_ms) FROM results WHERE game = ?1",
            [game.to_string()],
            |row| row.get(0),
        )?)
    }
}

impl Store for SqliteStore {
    fn clear_all(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM results", [])?;
        self.conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

/// In-process store for tests and throwaway sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    kv: BTreeMap<String, String>,
    results: Vec<ResultRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.kv.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.kv.remove(key);
        Ok(())
    }
}

impl ResultStore for MemoryStore {
    fn append(&mut self, record: &ResultRecord) -> Result<()> {
        self.results.push(record.clone());
        Ok(())
    }

    fn results(&self, game: Option<GameKind>) -> Result<Vec<ResultRecord>> {
        let mut records: Vec<ResultRecord> = self
            .results
            .iter()
            .rev()
            .filter(|r| game.map_or(true, |g| r.game == g))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    fn high_score(&self, game: GameKind) -> Result<Option<i64>> {
        Ok(self
            .results
            .iter()
            .filter(|r| r.game == game)
            .map(|r| r.score)
            .max())
    }

    fn best_time(&self, game: GameKind) -> Result<Option<Millis>> {
        Ok(self
            .results
            .iter()
            .filter(|r| r.game == game)
            .map(|r| r.elapsed_ms)
            .min())
    }
}

impl Store for MemoryStore {
    fn clear_all(&mut self) -> Result<()> {
        self.kv.clear();
        self.results.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(game: GameKind, score: i64, elapsed_ms: Millis, secs: i64) -> ResultRecord {
        ResultRecord {
            game,
            score,
            elapsed_ms,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            is_new_high_score: false,
        }
    }

    fn exercise<S: Store>(store: &mut S) {
        assert_eq!(store.high_score(GameKind::FindColor).unwrap(), None);
        assert_eq!(store.best_time(GameKind::FindColor).unwrap(), None);

        store.append(&record(GameKind::FindColor, 700, 9000, 0)).unwrap();
        store.append(&record(GameKind::FindColor, 900, 12_000, 10)).unwrap();
        store.append(&record(GameKind::ReflexTap, 80, 20_000, 20)).unwrap();

        assert_eq!(store.high_score(GameKind::FindColor).unwrap(), Some(900));
        assert_eq!(store.best_time(GameKind::FindColor).unwrap(), Some(9000));

        let all = store.results(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].game, GameKind::ReflexTap);

        let find_color = store.results(Some(GameKind::FindColor)).unwrap();
        assert_eq!(find_color.len(), 2);
        assert_eq!(find_color[0].score, 900);

        store.set("streak", "3").unwrap();
        store.set("streak", "4").unwrap();
        assert_eq!(store.get("streak").unwrap().as_deref(), Some("4"));
        store.remove("streak").unwrap();
        assert_eq!(store.get("streak").unwrap(), None);

        store.set("daily_challenge", "findColor").unwrap();
        store.clear_all().unwrap();
        assert!(store.results(None).unwrap().is_empty());
        assert_eq!(store.get("daily_challenge").unwrap(), None);
    }

    #[test]
    fn sqlite_store_behaves() {
        let mut store = SqliteStore::in_memory().unwrap();
        exercise(&mut store);
    }

    #[test]
    fn memory_store_behaves() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("reflex.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.append(&record(GameKind::CatchBall, 10, 15_000, 0)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let results = store.results(Some(GameKind::CatchBall)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].timestamp, record(GameKind::CatchBall, 10, 15_000, 0).timestamp);
    }
}
