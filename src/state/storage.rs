//! Durable key-value storage.
//!
//! All values are strings (JSON in practice). A store also exposes the
//! changes other execution contexts made to it, the way a browser delivers
//! `storage` events to every tab except the writer.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tracing::warn;

use crate::error::Result;

/// A change made to a key by another execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

/// String key-value store surviving restarts, with a change channel.
///
/// Writes are synchronous: a value written by `set_item` is returned by the
/// next `get_item` on the same store before `set_item` returns.
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Changes written by other contexts since the previous poll, oldest first.
    fn poll_changes(&self) -> Result<Vec<StorageEvent>>;
}

/// Session-only store. Nothing outlives the process and no other context
/// can write to it, so it never reports changes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_item`/`remove_item` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn poll_changes(&self) -> Result<Vec<StorageEvent>> {
        Ok(Vec::new())
    }
}

/// A durable store that degrades to memory.
///
/// The first failure of the primary store (disk full, file removed...) is
/// logged once, the primary is dropped, and every later operation is served
/// by an in-memory store for the rest of the session.
///
/// Lock contention with another process is not a failure of the store: those
/// errors are returned to the caller and the primary is kept.
pub struct ResilientStorage {
    primary: RefCell<Option<Box<dyn Storage>>>,
    fallback: MemoryStorage,
}

impl ResilientStorage {
    pub fn new(primary: Box<dyn Storage>) -> Self {
        Self {
            primary: RefCell::new(Some(primary)),
            fallback: MemoryStorage::new(),
        }
    }

    /// A store that starts out degraded.
    pub fn in_memory() -> Self {
        Self {
            primary: RefCell::new(None),
            fallback: MemoryStorage::new(),
        }
    }

    /// True once the session is running on the in-memory fallback.
    pub fn is_degraded(&self) -> bool {
        self.primary.borrow().is_none()
    }

    /// Run `f` against the primary store. Returns `Ok(None)` if there is no
    /// primary or if it just failed (in which case it is dropped).
    fn with_primary<R>(
        &self,
        op: &str,
        f: impl FnOnce(&dyn Storage) -> Result<R>,
    ) -> Result<Option<R>> {
        let result = {
            let primary = self.primary.borrow();
            let Some(storage) = primary.as_deref() else {
                return Ok(None);
            };
            f(storage)
        };

        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_transient() => {
                warn!(%err, op, "⚠️  storage is locked by another process");
                Err(err)
            }
            Err(err) => {
                warn!(%err, op, "⚠️  durable storage failed, keeping values in memory for this session");
                self.primary.replace(None);
                Ok(None)
            }
        }
    }
}

impl Storage for ResilientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match self.with_primary("get", |s| s.get_item(key))? {
            Some(value) => Ok(value),
            None => self.fallback.get_item(key),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        match self.with_primary("set", |s| s.set_item(key, value))? {
            Some(()) => Ok(()),
            None => self.fallback.set_item(key, value),
        }
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        match self.with_primary("remove", |s| s.remove_item(key))? {
            Some(()) => Ok(()),
            None => self.fallback.remove_item(key),
        }
    }

    fn poll_changes(&self) -> Result<Vec<StorageEvent>> {
        Ok(self
            .with_primary("poll", |s| s.poll_changes())?
            .unwrap_or_default())
    }
}
