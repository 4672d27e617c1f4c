//! SQLite connection management for QuickAPI.
//!
//! A [`Database`] is a cheap, cloneable handle around one shared
//! `rusqlite::Connection`. Every storage call borrows the connection for the
//! duration of its own statements and releases it; nothing is cached between
//! calls.

mod error;

pub use error::{DbError, DbResult};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Location string that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the relational store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) a database file. `":memory:"` opens an in-memory database.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY {
            return Self::open_in_memory();
        }
        debug!("opening database at {}", path.display());
        let conn = Connection::open(path)?;
        // WAL is unavailable for in-memory databases; file-backed only.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("journal mode: {mode}");
        Self::open_with_conn(Arc::new(Mutex::new(conn)))
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::open_with_conn(Arc::new(Mutex::new(conn)))
    }

    /// Wraps an already-open connection, applying the standard pragmas.
    pub fn open_with_conn(conn: Arc<Mutex<Connection>>) -> DbResult<Self> {
        {
            let guard = conn.lock().map_err(|_| DbError::Poisoned)?;
            guard.pragma_update(None, "foreign_keys", true)?;
            guard.busy_timeout(BUSY_TIMEOUT)?;
        }
        Ok(Self { conn })
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut guard = self.conn.lock().map_err(|_| E::from(DbError::Poisoned))?;
        f(&mut guard)
    }

    /// Executes a batch of statements, e.g. schema bring-up.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.with_conn(|conn| conn.execute_batch(sql).map_err(DbError::from))
    }

    /// Returns whether `table` exists.
    pub fn table_exists(&self, table: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
