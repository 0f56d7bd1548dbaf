use super::KeyValueStore;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// SQLite-backed state database.
///
/// A single `kv_state` table holds small JSON documents keyed by name. Writes
/// go through WAL so a crash mid-write never corrupts the previous value.
pub struct StateDb {
    conn: Mutex<Connection>,
    db_path: String,
}

impl StateDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create database parent directory: {}",
                    parent.display()
                )
            })?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at: {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_string_lossy().to_string(),
        };
        db.ensure_schema().with_context(|| {
            format!(
                "Failed to initialize database schema at: {}",
                db_path.display()
            )
        })?;
        debug!("opened state db at {}", db.db_path);
        Ok(db)
    }

    /// Volatile database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: ":memory:".to_string(),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Last write time (RFC 3339, UTC) for `key`.
    pub fn updated_at(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let ts = conn
            .query_row(
                "SELECT updated_at FROM kv_state WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(ts)
    }
}

impl KeyValueStore for StateDb {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv_state WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("Failed to read state key '{}'", key))?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Failed to write state key '{}'", key))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM kv_state WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM kv_state WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let rows: Result<Vec<String>, _> = stmt.query_map([prefix], |row| row.get(0))?.collect();
        rows.map_err(|e| anyhow::anyhow!("failed to list state keys: {}", e))
    }
}
