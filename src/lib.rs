//! daybreak: a daily-rotating background picker, persisted reactive values
//! and outside-click detection.
//!
//! - [`background`] picks one photo per local calendar day and remembers it
//! - [`state`] holds durable storage and shared persisted values
//! - [`ui`] detects pointer presses outside an element
//! - [`app`] wires them together

pub mod app;
pub mod background;
pub mod config;
pub mod error;
pub mod state;
pub mod ui;

pub use app::App;
pub use error::{Error, Result};
