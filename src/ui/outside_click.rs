//! Outside-click detection
//!
//! Calls back whenever a pointer press lands outside a target element, for
//! as long as the detector is active. Typical use: closing a menu or popover
//! when the user clicks anywhere else.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::document::{Document, ListenerId, NodeId, PointerEvent};

/// Settable reference to an element, like a template ref that is only
/// filled in once the element exists.
pub type ElementRef = Rc<Cell<Option<NodeId>>>;

pub struct OutsideClickDetector {
    document: Rc<Document>,
    target: ElementRef,
    callback: Rc<dyn Fn()>,
    listener: Option<ListenerId>,
}

impl OutsideClickDetector {
    /// Create an inactive detector. Nothing is registered until
    /// [`activate`](Self::activate).
    pub fn new(document: Rc<Document>, target: ElementRef, callback: impl Fn() + 'static) -> Self {
        Self {
            document,
            target,
            callback: Rc::new(callback),
            listener: None,
        }
    }

    /// Register the document-level listener. No-op if already active.
    pub fn activate(&mut self) {
        if self.listener.is_some() {
            return;
        }

        // Weak: the document owns the listener
        let document: Weak<Document> = Rc::downgrade(&self.document);
        let target = Rc::clone(&self.target);
        let callback = Rc::clone(&self.callback);

        let id = self.document.add_listener(Rc::new(move |event: &PointerEvent| {
            if !event.is_press() {
                return;
            }
            let (Some(document), Some(element)) = (document.upgrade(), target.get()) else {
                return;
            };
            if !document.contains(element, event.target) {
                callback();
            }
        }));

        debug!(?id, "outside-click listener registered");
        self.listener = Some(id);
    }

    /// Remove the listener registered by `activate`. No-op if inactive.
    pub fn deactivate(&mut self) {
        if let Some(id) = self.listener.take() {
            self.document.remove_listener(id);
            debug!(?id, "outside-click listener removed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }
}

impl Drop for OutsideClickDetector {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::document::{Button, PointerKind};

    struct Fixture {
        doc: Rc<Document>,
        menu: NodeId,
        item: NodeId,
        elsewhere: NodeId,
        target: ElementRef,
        hits: Rc<Cell<u32>>,
    }

    fn fixture() -> Fixture {
        let doc = Rc::new(Document::new());
        let menu = doc.create_element(doc.root()).unwrap();
        let item = doc.create_element(menu).unwrap();
        let elsewhere = doc.create_element(doc.root()).unwrap();
        Fixture {
            doc,
            menu,
            item,
            elsewhere,
            target: Rc::new(Cell::new(Some(menu))),
            hits: Rc::new(Cell::new(0)),
        }
    }

    fn detector(f: &Fixture) -> OutsideClickDetector {
        let hits = f.hits.clone();
        OutsideClickDetector::new(f.doc.clone(), f.target.clone(), move || {
            hits.set(hits.get() + 1)
        })
    }

    #[test]
    fn test_inside_press_is_ignored() {
        let f = fixture();
        let mut detector = detector(&f);
        detector.activate();

        f.doc.dispatch(&PointerEvent::pressed(f.item));
        f.doc.dispatch(&PointerEvent::pressed(f.menu));
        assert_eq!(f.hits.get(), 0);
    }

    #[test]
    fn test_outside_press_fires_once_per_event() {
        let f = fixture();
        let mut detector = detector(&f);
        detector.activate();

        f.doc.dispatch(&PointerEvent::pressed(f.elsewhere));
        assert_eq!(f.hits.get(), 1);
        f.doc.dispatch(&PointerEvent::pressed(f.doc.root()));
        assert_eq!(f.hits.get(), 2);
    }

    #[test]
    fn test_only_presses_count() {
        let f = fixture();
        let mut detector = detector(&f);
        detector.activate();

        f.doc.dispatch(&PointerEvent {
            target: f.elsewhere,
            kind: PointerKind::Moved,
        });
        f.doc.dispatch(&PointerEvent {
            target: f.elsewhere,
            kind: PointerKind::Released(Button::Left),
        });
        assert_eq!(f.hits.get(), 0);

        f.doc.dispatch(&PointerEvent {
            target: f.elsewhere,
            kind: PointerKind::Pressed(Button::Right),
        });
        assert_eq!(f.hits.get(), 1);
    }

    #[test]
    fn test_unset_target_never_fires() {
        let f = fixture();
        f.target.set(None);
        let mut detector = detector(&f);
        detector.activate();

        f.doc.dispatch(&PointerEvent::pressed(f.elsewhere));
        assert_eq!(f.hits.get(), 0);

        // Filled in later, picked up without re-activating
        f.target.set(Some(f.menu));
        f.doc.dispatch(&PointerEvent::pressed(f.elsewhere));
        assert_eq!(f.hits.get(), 1);
    }

    #[test]
    fn test_inactive_detector_is_silent() {
        let f = fixture();
        let mut detector = detector(&f);
        assert!(!detector.is_active());

        f.doc.dispatch(&PointerEvent::pressed(f.elsewhere));
        detector.activate();
        detector.deactivate();
        f.doc.dispatch(&PointerEvent::pressed(f.elsewhere));

        assert_eq!(f.hits.get(), 0);
    }

    #[test]
    fn test_activation_pairs_never_leak() {
        let f = fixture();
        let mut detector = detector(&f);

        for _ in 0..3 {
            detector.activate();
            detector.activate();
            assert_eq!(f.doc.listener_count(), 1);
            detector.deactivate();
            detector.deactivate();
            assert_eq!(f.doc.listener_count(), 0);
        }
    }

    #[test]
    fn test_drop_deactivates() {
        let f = fixture();
        {
            let mut detector = detector(&f);
            detector.activate();
            assert_eq!(f.doc.listener_count(), 1);
        }
        assert_eq!(f.doc.listener_count(), 0);
    }

    #[test]
    fn test_independent_detectors() {
        let f = fixture();
        let mut menu_detector = detector(&f);
        let other_hits = Rc::new(Cell::new(0));
        let sink = other_hits.clone();
        let mut item_detector = OutsideClickDetector::new(
            f.doc.clone(),
            Rc::new(Cell::new(Some(f.item))),
            move || sink.set(sink.get() + 1),
        );
        menu_detector.activate();
        item_detector.activate();

        // Inside the menu but outside the item
        f.doc.dispatch(&PointerEvent::pressed(f.menu));
        assert_eq!(f.hits.get(), 0);
        assert_eq!(other_hits.get(), 1);

        item_detector.deactivate();
        assert_eq!(f.doc.listener_count(), 1);
    }
}
