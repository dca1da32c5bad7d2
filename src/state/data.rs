//! The stored background record.
//!
//! It is serialized to JSON under the `"background"` key, with the field
//! names the web client has always used (`photoId`, `previousPhotoId`).

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Storage key of the background record.
pub const BACKGROUND_KEY: &str = "background";

/// Which photo is shown, and since which day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRecord {
    /// Local calendar day the photo was picked on (`YYYY-MM-DD`).
    pub date: NaiveDate,

    /// Catalog identifier of the current photo.
    pub photo_id: String,

    /// Photo shown before this one. Never equal to `photo_id`.
    ///
    /// Older records store an empty string when there was no previous photo;
    /// that reads back as `None`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub previous_photo_id: Option<String>,
}

impl BackgroundRecord {
    /// Convert to JSON string for storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string (from storage)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the record was written on `today`.
    pub fn is_fresh(&self, today: NaiveDate) -> bool {
        self.date == today
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
