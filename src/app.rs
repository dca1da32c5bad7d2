//! Composition root.
//!
//! [`App`] owns the storage, the persisted value registry and the background
//! selector. The units never talk to each other; they only share storage.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{info, warn};

use crate::background::BackgroundSelector;
use crate::config::Config;
use crate::error::Result;
use crate::state::{PersistedRegistry, ResilientStorage, SqliteStorage, Storage};

/// Fire-and-forget usage reporting, called once at launch.
pub trait Analytics {
    fn inject(&self);
}

/// Reports the launch as a log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnalytics;

impl Analytics for LogAnalytics {
    fn inject(&self) {
        info!(
            target: "daybreak::analytics",
            version = env!("CARGO_PKG_VERSION"),
            "session started"
        );
    }
}

pub struct App {
    config: Config,
    storage: Rc<dyn Storage>,
    values: PersistedRegistry,
    background: BackgroundSelector,
    launched: Cell<bool>,
}

impl App {
    /// Build the application on the configured storage.
    ///
    /// If the database cannot be opened the session runs on in-memory
    /// storage instead of failing.
    pub fn open(config: Config) -> Self {
        let storage: Rc<dyn Storage> = if config.storage.in_memory {
            info!("💭 Using in-memory storage");
            Rc::new(ResilientStorage::in_memory())
        } else {
            match SqliteStorage::open(config.storage_path()) {
                Ok(sqlite) => Rc::new(ResilientStorage::new(Box::new(sqlite))),
                Err(err) => {
                    warn!(%err, "⚠️  could not open storage, values will not outlive this session");
                    Rc::new(ResilientStorage::in_memory())
                }
            }
        };

        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: Rc<dyn Storage>) -> Self {
        let values = PersistedRegistry::new(Rc::clone(&storage));
        let background =
            BackgroundSelector::new(Rc::clone(&storage)).with_options(config.image_options());

        Self {
            config,
            storage,
            values,
            background,
            launched: Cell::new(false),
        }
    }

    /// Run the one-time startup hooks. Later calls do nothing.
    pub fn launch(&self, analytics: &dyn Analytics) {
        if self.launched.replace(true) {
            return;
        }
        analytics.inject();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Rc<dyn Storage> {
        &self.storage
    }

    pub fn values(&self) -> &PersistedRegistry {
        &self.values
    }

    pub fn background(&self) -> &BackgroundSelector {
        &self.background
    }

    /// Apply the changes other processes made to storage since the last
    /// sync. Returns how many bound values changed.
    pub fn sync(&self) -> Result<usize> {
        let mut applied = 0;
        for event in self.storage.poll_changes()? {
            if self.values.handle_event(&event) {
                info!(key = %event.key, "🔄 value changed in another process");
                applied += 1;
            }
        }
        Ok(applied)
    }
}
