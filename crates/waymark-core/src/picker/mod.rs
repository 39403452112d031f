//! Picker state machine.
//!
//! While picking, capture-phase listeners on the document intercept every
//! click and turn it into an [`ElementInfo`]. Hovering drives a highlight
//! that follows the hovered node on scroll and resize. The listeners exist
//! only in `picking` mode: leaving it removes them.

mod store;

pub use store::{EditorStore, SharedStore};

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waymark_protocols::{EditorMode, ElementInfo, TransitionError};

use crate::dom::{Document, DomEvent, EventKind, ListenerId, NodeId, Phase, SharedDocument};
use crate::render::{is_own_node, RenderTarget};
use crate::synthesizer::synthesize;

/// Captured text is cut to this many characters.
pub const MAX_CAPTURED_TEXT: usize = 100;

/// Outcome of a picking session.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerEvent {
    Selected(ElementInfo),
    Cancelled,
}

/// Describe `node` as it is right now.
pub fn element_info(doc: &Document, node: NodeId) -> ElementInfo {
    ElementInfo {
        selector: synthesize(doc, node),
        rect: doc.bounding_client_rect(node),
        captured_text: doc
            .text_content(node)
            .trim()
            .chars()
            .take(MAX_CAPTURED_TEXT)
            .collect(),
        tag_name: doc.tag_name(node).to_string(),
    }
}

struct Inner {
    document: SharedDocument,
    store: SharedStore,
    render: Arc<dyn RenderTarget>,
    events: mpsc::UnboundedSender<PickerEvent>,
    listeners: Mutex<Vec<ListenerId>>,
    hovered: Mutex<Option<NodeId>>,
}

/// Element picker for one tab.
#[derive(Clone)]
pub struct Picker {
    inner: Arc<Inner>,
}

impl Picker {
    pub fn new(
        document: SharedDocument,
        store: SharedStore,
        render: Arc<dyn RenderTarget>,
        events: mpsc::UnboundedSender<PickerEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                document,
                store,
                render,
                events,
                listeners: Mutex::new(Vec::new()),
                hovered: Mutex::new(None),
            }),
        }
    }

    /// `idle -> picking`: attach the picking listeners.
    pub fn start(&self) -> Result<(), TransitionError> {
        self.inner.store.lock().transition(EditorMode::Picking)?;
        self.inner.detach();
        self.inner.render.set_pointer_passthrough(true);
        self.attach();
        info!("Picker started");
        Ok(())
    }

    /// `picking -> idle`: detach listeners and discard the hover state.
    pub fn cancel(&self) -> Result<(), TransitionError> {
        self.inner.store.lock().transition(EditorMode::Idle)?;
        self.inner.finish();
        let _ = self.inner.events.send(PickerEvent::Cancelled);
        info!("Picker cancelled");
        Ok(())
    }

    /// Drop listeners and overlay state without touching the mode or
    /// emitting anything. Used when the page goes away.
    pub fn shutdown(&self) {
        self.inner.finish();
    }

    /// Whether picking listeners are attached.
    pub fn is_active(&self) -> bool {
        !self.inner.listeners.lock().is_empty()
    }

    fn attach(&self) {
        let handlers: [(EventKind, fn(&Inner, &mut DomEvent)); 5] = [
            (EventKind::PointerMove, Inner::on_pointer_move),
            (EventKind::Click, Inner::on_click),
            (EventKind::Scroll, Inner::on_viewport_change),
            (EventKind::Resize, Inner::on_viewport_change),
            (EventKind::KeyDown, Inner::on_key_down),
        ];

        let mut ids = Vec::with_capacity(handlers.len());
        for (kind, handler) in handlers {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let id = self.inner.document.add_listener(
                kind,
                Phase::Capture,
                Arc::new(move |event: &mut DomEvent| {
                    if let Some(inner) = weak.upgrade() {
                        handler(inner.as_ref(), event);
                    }
                }),
            );
            ids.push(id);
        }
        *self.inner.listeners.lock() = ids;
    }
}

impl Inner {
    fn detach(&self) {
        let ids: Vec<ListenerId> = std::mem::take(&mut *self.listeners.lock());
        for id in ids {
            self.document.remove_listener(id);
        }
    }

    fn finish(&self) {
        self.detach();
        *self.hovered.lock() = None;
        self.render.clear_highlight();
        self.render.set_pointer_passthrough(false);
    }

    fn on_pointer_move(&self, event: &mut DomEvent) {
        let rect = event.target.and_then(|target| {
            let doc = self.document.read();
            (!is_own_node(&doc, target)).then(|| (target, doc.bounding_client_rect(target)))
        });

        match rect {
            Some((target, rect)) => {
                *self.hovered.lock() = Some(target);
                self.render.show_highlight(rect);
            }
            None => {
                *self.hovered.lock() = None;
                self.render.clear_highlight();
            }
        }
    }

    fn on_viewport_change(&self, _event: &mut DomEvent) {
        let hovered = *self.hovered.lock();
        let Some(node) = hovered else {
            return;
        };
        let rect = {
            let doc = self.document.read();
            doc.is_connected(node).then(|| doc.bounding_client_rect(node))
        };
        match rect {
            Some(rect) => self.render.show_highlight(rect),
            None => {
                *self.hovered.lock() = None;
                self.render.clear_highlight();
            }
        }
    }

    fn on_click(&self, event: &mut DomEvent) {
        event.prevent_default();
        event.stop_propagation();

        let Some(target) = event.target else {
            return;
        };
        let element = {
            let doc = self.document.read();
            if is_own_node(&doc, target) {
                debug!("Ignoring click on extension UI");
                return;
            }
            element_info(&doc, target)
        };

        if let Err(e) = self.store.lock().select(element.clone()) {
            warn!("Discarding pick: {}", e);
            return;
        }

        self.finish();
        self.render.show_editor(&element);
        info!("Picked {} as '{}'", element.tag_name, element.selector);
        let _ = self.events.send(PickerEvent::Selected(element));
    }

    fn on_key_down(&self, event: &mut DomEvent) {
        if event.key.as_deref() != Some("Escape") {
            return;
        }
        event.prevent_default();
        event.stop_propagation();

        if self.store.lock().transition(EditorMode::Idle).is_ok() {
            self.finish();
            let _ = self.events.send(PickerEvent::Cancelled);
            info!("Picker cancelled from keyboard");
        }
    }
}

#[cfg(test)]
#[path = "picker_tests.rs"]
mod tests;
