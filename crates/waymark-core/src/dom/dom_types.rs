//! Shared DOM types: node handles, events and mutation records.

use std::fmt;

/// Handle to an element in a [`Document`](super::Document).
///
/// Only valid for the lifetime of the document it came from; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Event kinds the document dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerMove,
    Click,
    KeyDown,
    Scroll,
    Resize,
}

/// Listener phase. Capture listeners run before the host page sees the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capture,
    Bubble,
}

/// Registered listener handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// An event in flight.
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub kind: EventKind,
    pub target: Option<NodeId>,
    /// Key name for [`EventKind::KeyDown`].
    pub key: Option<String>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    pub fn new(kind: EventKind, target: Option<NodeId>) -> Self {
        Self {
            kind,
            target,
            key: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(EventKind::KeyDown, None)
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Subtree mutation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList { target: NodeId },
    Attributes { target: NodeId, name: String },
    CharacterData { target: NodeId },
}
