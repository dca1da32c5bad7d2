/// Pointer-event plumbing
///
/// - `document.rs` - element tree and document-level listeners
/// - `outside_click.rs` - callback on presses outside an element
pub mod document;
pub mod outside_click;

pub use document::{Document, NodeId, PointerEvent};
pub use outside_click::{ElementRef, OutsideClickDetector};
