/// Daily background selection
///
/// - `catalog.rs` - the fixed photo catalog and URL formatting
/// - `selector.rs` - once-a-day pick, persisted under the `"background"` key
pub mod catalog;
pub mod selector;

pub use catalog::{Catalog, ImageOptions, PHOTO_IDS};
pub use selector::{BackgroundSelector, Clock, LocalClock};
