use rusqlite::{params, Connection, OptionalExtension};
use crate::error::{LedgerError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Synchronous key-value blob store. Values are whole serialized collections.
pub trait BlobStore {
    fn load(&self, key: &str) -> Result<Option<String>>;

    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Writes every entry or none of them.
    fn save_all(&self, entries: &[(&str, String)]) -> Result<()>;
}

/// SQLite-backed blob store. One row per key.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // In-memory databases report "memory" here instead of "wal".
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        log::debug!("sqlite journal mode: {mode}");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LedgerError::Lock)
    }

    /// Every stored key, sorted.
    #[cfg(test)]
    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM blobs ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut result = Vec::new();
        for r in rows { result.push(r?); }
        Ok(result)
    }
}

const UPSERT: &str = "INSERT INTO blobs (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

impl BlobStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        log::debug!("loaded key {key} (present: {})", value.is_some());
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(UPSERT, params![key, value])?;
        log::debug!("saved key {key} ({} bytes)", value.len());
        Ok(())
    }

    fn save_all(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT)?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        log::debug!("saved {} keys in one transaction", entries.len());
        Ok(())
    }
}

/// In-process store for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.blobs.lock().map_err(|_| LedgerError::Lock)
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn save_all(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut blobs = self.lock()?;
        for (key, value) in entries {
            blobs.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}
