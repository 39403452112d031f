//! In-memory document model.
//!
//! Every execution context that touches a page sees it through this model:
//! an arena of element nodes, a selector engine acting as the native query
//! facility, mutation notifications and capture/bubble event dispatch.

mod document;
mod dom_types;
mod selector;
mod shared;

pub use document::Document;
pub use dom_types::{DomEvent, EventKind, ListenerId, MutationRecord, NodeId, Phase};
pub use selector::{css_escape, Selector, SelectorError};
pub(crate) use selector::quote_attribute;
pub use shared::{Listener, ObserverGuard, SharedDocument};

#[cfg(test)]
#[path = "dom_tests.rs"]
mod tests;
