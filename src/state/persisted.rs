//! Persisted reactive values.
//!
//! [`PersistedRegistry::bind`] hands out one shared [`Persisted`] container
//! per key. Setting its value writes the JSON through to storage before
//! returning and then notifies watchers. Changes made by other contexts
//! arrive through [`PersistedRegistry::handle_event`] and update the value
//! in memory without writing it back.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::storage::{Storage, StorageEvent};
use crate::error::{Error, Result};

/// Types that can live in a [`Persisted`] container.
pub trait PersistValue: Serialize + DeserializeOwned + PartialEq + Clone + 'static {}

impl<T> PersistValue for T where T: Serialize + DeserializeOwned + PartialEq + Clone + 'static {}

type Watcher<T> = Rc<dyn Fn(&T)>;

struct Slot<T> {
    key: String,
    value: RefCell<T>,
    storage: Rc<dyn Storage>,
    watchers: RefCell<Vec<Watcher<T>>>,
}

impl<T: PersistValue> Slot<T> {
    fn notify(&self) {
        // Watchers may read or set the value, so no borrow is held while they run.
        let watchers = self.watchers.borrow().clone();
        let value = self.value.borrow().clone();
        for watcher in watchers {
            watcher(&value);
        }
    }
}

/// Type-erased view of a slot, used to route inbound changes.
trait RemoteSync {
    /// Replace the value with `raw` if it parses and differs. Returns
    /// whether the value changed.
    fn apply_remote(&self, raw: &str) -> Result<bool>;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: PersistValue> RemoteSync for Slot<T> {
    fn apply_remote(&self, raw: &str) -> Result<bool> {
        let incoming: T = serde_json::from_str(raw).map_err(|source| Error::StorageCorruption {
            key: self.key.clone(),
            source,
        })?;

        if *self.value.borrow() == incoming {
            return Ok(false);
        }

        self.value.replace(incoming);
        self.notify();
        Ok(true)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A shared, persisted value. Clones share the same slot.
pub struct Persisted<T> {
    slot: Rc<Slot<T>>,
}

impl<T> Clone for Persisted<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: PersistValue> Persisted<T> {
    pub fn key(&self) -> &str {
        &self.slot.key
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.slot.value.borrow().clone()
    }

    /// Run `f` on a snapshot of the current value. `f` may call `set` on
    /// this value; it keeps seeing the snapshot.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        f(&value)
    }

    /// Replace the value, write it through to storage, then notify watchers.
    ///
    /// Nothing changes if the value cannot be serialized or written.
    pub fn set(&self, value: T) -> Result<()> {
        let json = serde_json::to_string(&value).map_err(|source| Error::Serialize {
            key: self.slot.key.clone(),
            source,
        })?;
        self.slot.storage.set_item(&self.slot.key, &json)?;
        debug!(key = %self.slot.key, "persisted value written");

        self.slot.value.replace(value);
        self.slot.notify();
        Ok(())
    }

    /// Mutate a copy of the value in place and [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        let mut value = self.get();
        f(&mut value);
        self.set(value)
    }

    /// Call `f` with the new value after every change, local or remote.
    pub fn watch(&self, f: impl Fn(&T) + 'static) {
        self.slot.watchers.borrow_mut().push(Rc::new(f));
    }

    /// Whether both handles share the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: PersistValue + std::fmt::Debug> std::fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.slot.key)
            .field("value", &*self.slot.value.borrow())
            .finish()
    }
}

/// One live container per key, for as long as the registry lives.
pub struct PersistedRegistry {
    storage: Rc<dyn Storage>,
    slots: RefCell<HashMap<String, Rc<dyn RemoteSync>>>,
}

impl PersistedRegistry {
    pub fn new(storage: Rc<dyn Storage>) -> Self {
        Self {
            storage,
            slots: RefCell::new(HashMap::new()),
        }
    }

    /// Get the container for `key`, creating it on first use.
    ///
    /// The first call reads the stored value, falling back to `default` when
    /// nothing is stored. Later calls return the same container and ignore
    /// `default`.
    ///
    /// # Errors
    ///
    /// * [`Error::StorageCorruption`] if the stored value does not parse as `T`
    /// * [`Error::TypeMismatch`] if `key` is already bound to another type
    pub fn bind<T: PersistValue>(&self, key: &str, default: T) -> Result<Persisted<T>> {
        if let Some(existing) = self.slots.borrow().get(key) {
            let slot = Rc::clone(existing)
                .into_any()
                .downcast::<Slot<T>>()
                .map_err(|_| Error::TypeMismatch {
                    key: key.to_string(),
                })?;
            return Ok(Persisted { slot });
        }

        let value = match self.storage.get_item(key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| Error::StorageCorruption {
                key: key.to_string(),
                source,
            })?,
            None => default,
        };

        let slot = Rc::new(Slot {
            key: key.to_string(),
            value: RefCell::new(value),
            storage: Rc::clone(&self.storage),
            watchers: RefCell::new(Vec::new()),
        });
        self.slots
            .borrow_mut()
            .insert(key.to_string(), Rc::clone(&slot) as Rc<dyn RemoteSync>);

        debug!(key, "persisted value bound");
        Ok(Persisted { slot })
    }

    /// Apply a change made by another context.
    ///
    /// Returns whether a bound value changed. Unbound keys, removals and
    /// values equal to the current one are ignored; values that don't parse
    /// are logged and ignored, so duplicated or stale events are harmless.
    pub fn handle_event(&self, event: &StorageEvent) -> bool {
        let Some(raw) = event.new_value.as_deref() else {
            return false;
        };
        let Some(slot) = self.slots.borrow().get(&event.key).cloned() else {
            return false;
        };

        match slot.apply_remote(raw) {
            Ok(changed) => changed,
            Err(err) => {
                warn!(%err, "ignoring unreadable change from another context");
                false
            }
        }
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}
