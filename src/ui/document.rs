//! A minimal element tree with document-level pointer listeners.
//!
//! Only what outside-click detection needs: parent links for containment
//! checks, and a listener list that every dispatched pointer event goes
//! through.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle to an element of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Handle to a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Pressed(Button),
    Released(Button),
    Moved,
}

/// A pointer event and the element it originated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub target: NodeId,
    pub kind: PointerKind,
}

impl PointerEvent {
    pub fn pressed(target: NodeId) -> Self {
        Self {
            target,
            kind: PointerKind::Pressed(Button::Left),
        }
    }

    pub fn is_press(&self) -> bool {
        matches!(self.kind, PointerKind::Pressed(_))
    }
}

pub type Listener = Rc<dyn Fn(&PointerEvent)>;

/// Element tree rooted at a single root node.
pub struct Document {
    /// Parent of every node, indexed by `NodeId`. The root has none.
    parents: RefCell<Vec<Option<NodeId>>>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            parents: RefCell::new(vec![None]),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a new element under `parent`. Returns `None` if `parent` is
    /// not an element of this document.
    pub fn create_element(&self, parent: NodeId) -> Option<NodeId> {
        let mut parents = self.parents.borrow_mut();
        if parent.0 >= parents.len() {
            return None;
        }
        let id = NodeId(parents.len());
        parents.push(Some(parent));
        Some(id)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let parents = self.parents.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = parents.get(id.0).copied().flatten();
        }
        false
    }

    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver `event` to every listener registered at dispatch time.
    pub fn dispatch(&self, event: &PointerEvent) {
        // Listeners may add or remove listeners while running
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.parents.borrow().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
