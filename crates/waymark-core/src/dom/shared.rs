//! Shared handle over a document with observers and listeners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tokio::sync::mpsc;
use tracing::trace;
use waymark_protocols::Rect;

use super::document::Document;
use super::dom_types::{DomEvent, EventKind, ListenerId, MutationRecord, NodeId, Phase};

/// Event callback. Runs with no document lock held, so it may query or
/// mutate the document and add or remove listeners.
pub type Listener = Arc<dyn Fn(&mut DomEvent) + Send + Sync>;

struct ListenerEntry {
    id: ListenerId,
    kind: EventKind,
    phase: Phase,
    callback: Listener,
}

struct Inner {
    document: RwLock<Document>,
    observers: Mutex<HashMap<u64, mpsc::UnboundedSender<MutationRecord>>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
    host_activations: AtomicU64,
}

/// A page's document as seen by one tab's contexts.
///
/// All structural mutations go through this handle so subtree observers are
/// notified.
#[derive(Clone)]
pub struct SharedDocument {
    inner: Arc<Inner>,
}

impl Default for SharedDocument {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            inner: Arc::new(Inner {
                document: RwLock::new(document),
                observers: Mutex::new(HashMap::new()),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                host_activations: AtomicU64::new(0),
            }),
        }
    }

    /// Read access for queries.
    pub fn read(&self) -> RwLockReadGuard<'_, Document> {
        self.inner.document.read()
    }

    pub fn body(&self) -> NodeId {
        self.read().body()
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.document.write().create_element(tag)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let record = self.inner.document.write().append_child(parent, child);
        self.notify(record);
    }

    pub fn remove(&self, node: NodeId) {
        let record = self.inner.document.write().remove(node);
        if let Some(record) = record {
            self.notify(record);
        }
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let record = self.inner.document.write().set_attribute(node, name, value);
        self.notify(record);
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let record = self.inner.document.write().remove_attribute(node, name);
        if let Some(record) = record {
            self.notify(record);
        }
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        let record = self.inner.document.write().set_text(node, text);
        self.notify(record);
    }

    /// Layout change. Not a DOM mutation, so observers are not notified.
    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        self.inner.document.write().set_rect(node, rect);
    }

    /// Scroll the host page and fire [`EventKind::Scroll`].
    pub fn scroll_to(&self, x: f64, y: f64) {
        self.inner.document.write().set_scroll(x, y);
        self.dispatch(DomEvent::new(EventKind::Scroll, None));
    }

    /// Resize the viewport and fire [`EventKind::Resize`].
    pub fn resize_viewport(&self, width: f64, height: f64) {
        self.inner.document.write().set_viewport(width, height);
        self.dispatch(DomEvent::new(EventKind::Resize, None));
    }

    /// Subscribe to subtree mutations of the whole document.
    pub fn observe(&self) -> ObserverGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.observers.lock().insert(id, tx);
        trace!("Mutation observer {} connected", id);
        ObserverGuard {
            id,
            rx,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of connected mutation observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    fn notify(&self, record: MutationRecord) {
        let mut observers = self.inner.observers.lock();
        observers.retain(|_, tx| tx.send(record.clone()).is_ok());
    }

    pub fn add_listener(&self, kind: EventKind, phase: Phase, callback: Listener) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            kind,
            phase,
            callback,
        });
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Number of listeners registered for `kind`, in any phase.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }

    /// Dispatch an event: capture listeners first, then, unless propagation
    /// was stopped, the host page's bubble listeners.
    pub fn dispatch(&self, mut event: DomEvent) -> DomEvent {
        let capture = self.collect(event.kind, Phase::Capture);
        for callback in capture {
            callback(&mut event);
        }
        if event.propagation_stopped() {
            return event;
        }

        self.inner.host_activations.fetch_add(1, Ordering::SeqCst);
        let bubble = self.collect(event.kind, Phase::Bubble);
        for callback in bubble {
            callback(&mut event);
            if event.propagation_stopped() {
                break;
            }
        }
        event
    }

    fn collect(&self, kind: EventKind, phase: Phase) -> Vec<Listener> {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind && l.phase == phase)
            .map(|l| l.callback.clone())
            .collect()
    }

    pub fn pointer_move(&self, target: NodeId) -> DomEvent {
        self.dispatch(DomEvent::new(EventKind::PointerMove, Some(target)))
    }

    pub fn click(&self, target: NodeId) -> DomEvent {
        self.dispatch(DomEvent::new(EventKind::Click, Some(target)))
    }

    pub fn key_down(&self, key: &str) -> DomEvent {
        self.dispatch(DomEvent::key(key))
    }

    /// Events that reached the host page's own handlers.
    pub fn host_activations(&self) -> u64 {
        self.inner.host_activations.load(Ordering::SeqCst)
    }
}

/// A connected mutation observer. Dropping it disconnects.
pub struct ObserverGuard {
    id: u64,
    rx: mpsc::UnboundedReceiver<MutationRecord>,
    inner: Weak<Inner>,
}

impl ObserverGuard {
    /// Next mutation record. `None` once the document is gone.
    pub async fn recv(&mut self) -> Option<MutationRecord> {
        self.rx.recv().await
    }

    /// Disconnect now.
    pub fn disconnect(self) {}
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.observers.lock().remove(&self.id);
            trace!("Mutation observer {} disconnected", self.id);
        }
    }
}
