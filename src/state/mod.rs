/// State management module
///
/// This module handles all persisted application state:
/// - The storage abstraction and its in-memory/fallback stores (storage.rs)
/// - The SQLite-backed durable store (sqlite.rs)
/// - The stored background record (data.rs)
/// - Shared persisted values and their registry (persisted.rs)
pub mod storage;
pub mod sqlite;
pub mod data;
pub mod persisted;

pub use data::BackgroundRecord;
pub use persisted::{PersistValue, Persisted, PersistedRegistry};
pub use sqlite::SqliteStorage;
pub use storage::{MemoryStorage, ResilientStorage, Storage, StorageEvent};
