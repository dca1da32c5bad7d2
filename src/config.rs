//! Configuration and application directories.
//!
//! Everything has a default, so a missing config file is not an error. The
//! file lives at `<config_dir>/config.toml`:
//!
//! ```toml
//! [storage]
//! path = "/somewhere/daybreak.db"
//! in_memory = false
//!
//! [image]
//! width = 2560
//! quality = 90
//! ```
//!
//! Directories resolve through [`dirs`] and can be overridden with
//! `DAYBREAK_DATA_DIR` and `DAYBREAK_CONFIG_DIR`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::background::ImageOptions;
use crate::error::{Error, Result};

/// Application data directory (holds the storage database).
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DAYBREAK_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("daybreak"))
        .unwrap_or_else(|| PathBuf::from("daybreak-data"))
}

/// Application config directory.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DAYBREAK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|d| d.join("daybreak"))
        .unwrap_or_else(|| PathBuf::from("daybreak-config"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Defaults to `<data_dir>/daybreak.db`.
    pub path: Option<PathBuf>,
    /// Keep everything in memory for this session only.
    pub in_memory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let options = ImageOptions::default();
        Self {
            width: options.width,
            quality: options.quality,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the default config file if it exists,
    /// else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.image.width == 0 {
            return Err(Error::Config("image.width must be positive".to_string()));
        }
        if !(1..=100).contains(&self.image.quality) {
            return Err(Error::Config(format!(
                "image.quality must be between 1 and 100, got {}",
                self.image.quality
            )));
        }
        Ok(())
    }

    /// Database file to open.
    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join("daybreak.db"))
    }

    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            width: self.image.width,
            quality: self.image.quality,
        }
    }
}
