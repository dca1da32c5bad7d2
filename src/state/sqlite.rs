use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use super::storage::{Storage, StorageEvent};
use crate::error::Result;

/// Number of change-log revisions kept when a store is opened.
const CHANGE_LOG_RETAINED: i64 = 1024;

/// How long a write waits for another process to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed durable storage.
///
/// Every process that opens the same database file is its own execution
/// context: each gets a random origin id, and every write is appended to a
/// `changes` log tagged with that id so the other contexts can pick it up
/// with [`Storage::poll_changes`].
pub struct SqliteStorage {
    conn: Connection,
    db_path: PathBuf,
    origin: i64,
    /// Highest change revision this context has already looked at.
    last_seen: Cell<i64>,
}

impl SqliteStorage {
    /// Open (or create) the store at `db_path`.
    ///
    /// Changes written before the store was opened are not reported by
    /// `poll_changes`; only the ones that happen afterwards are.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        info!("📁 Storage opened at: {}", db_path.display());

        let storage = SqliteStorage {
            conn,
            db_path,
            origin: rand::random(),
            last_seen: Cell::new(0),
        };
        storage.init_schema()?;
        storage.last_seen.set(storage.latest_revision()?);

        Ok(storage)
    }

    /// Create the tables if they don't exist and prune the change log.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        // One row per write, read by the other contexts
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS changes (
                revision        INTEGER PRIMARY KEY AUTOINCREMENT,
                key             TEXT NOT NULL,
                old_value       TEXT,
                new_value       TEXT,
                origin          INTEGER NOT NULL
            )",
            [],
        )?;

        let pruned = self.conn.execute(
            "DELETE FROM changes
             WHERE revision <= (SELECT COALESCE(MAX(revision), 0) FROM changes) - ?1",
            [CHANGE_LOG_RETAINED],
        )?;
        if pruned > 0 {
            debug!(pruned, "pruned change log");
        }

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// How long writes wait on a lock held by another process before
    /// failing with `DatabaseBusy`.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn latest_revision(&self) -> Result<i64> {
        let revision = self.conn.query_row(
            "SELECT COALESCE(MAX(revision), 0) FROM changes",
            [],
            |row| row.get(0),
        )?;
        Ok(revision)
    }

    /// Number of revisions pruned from the change log before this context
    /// could poll them, if any.
    fn missed_revisions(&self) -> Result<Option<i64>> {
        let oldest: Option<i64> =
            self.conn
                .query_row("SELECT MIN(revision) FROM changes", [], |row| row.get(0))?;

        Ok(oldest
            .map(|oldest| oldest - self.last_seen.get() - 1)
            .filter(|missed| *missed > 0))
    }

    /// Replace the value at `key` and log the change, in one transaction.
    ///
    /// The transaction takes the write lock up front, so a concurrent writer
    /// makes it wait for the busy timeout instead of failing on lock upgrade.
    fn write(&self, key: &str, value: Option<&str>) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let old: Option<String> = tx
            .query_row("SELECT value FROM items WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        // Same value: nothing for the other contexts to see.
        if old.as_deref() == value {
            return Ok(());
        }

        match value {
            Some(value) => {
                tx.execute(
                    "INSERT INTO items (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, Utc::now().timestamp()],
                )?;
            }
            None => {
                tx.execute("DELETE FROM items WHERE key = ?1", [key])?;
            }
        }

        tx.execute(
            "INSERT INTO changes (key, old_value, new_value, origin) VALUES (?1, ?2, ?3, ?4)",
            params![key, old, value, self.origin],
        )?;
        tx.commit()?;

        debug!(key, "stored");
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM items WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, Some(value))
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.write(key, None)
    }

    fn poll_changes(&self) -> Result<Vec<StorageEvent>> {
        if let Some(missed) = self.missed_revisions()? {
            warn!(
                missed,
                "⚠️  change log was pruned past the last poll, some changes from other processes were lost"
            );
        }

        let mut stmt = self.conn.prepare(
            "SELECT revision, origin, key, old_value, new_value
             FROM changes
             WHERE revision > ?1
             ORDER BY revision",
        )?;

        let rows = stmt.query_map([self.last_seen.get()], |row| {
            let revision: i64 = row.get(0)?;
            let origin: i64 = row.get(1)?;
            let event = StorageEvent {
                key: row.get(2)?,
                old_value: row.get(3)?,
                new_value: row.get(4)?,
            };
            Ok((revision, origin, event))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (revision, origin, event) = row?;
            self.last_seen.set(revision);
            // Writers never hear about their own changes
            if origin != self.origin {
                events.push(event);
            }
        }

        Ok(events)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("db_path", &self.db_path)
            .field("origin", &self.origin)
            .finish()
    }
}
