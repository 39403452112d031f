use tokio::sync::mpsc::error::TryRecvError;
use waymark_protocols::Rect;

use super::*;
use crate::render::ShadowOverlay;

struct Harness {
    doc: SharedDocument,
    store: SharedStore,
    overlay: Arc<ShadowOverlay>,
    picker: Picker,
    events: mpsc::UnboundedReceiver<PickerEvent>,
}

fn harness() -> Harness {
    let doc = SharedDocument::default();
    let store = EditorStore::shared();
    let overlay = Arc::new(ShadowOverlay::mount(doc.clone()));
    let (tx, events) = mpsc::unbounded_channel();
    let picker = Picker::new(doc.clone(), store.clone(), overlay.clone(), tx);
    Harness {
        doc,
        store,
        overlay,
        picker,
        events,
    }
}

fn save_button(doc: &SharedDocument) -> NodeId {
    let button = doc.create_element("button");
    doc.set_attribute(button, "id", "save");
    doc.set_text(button, "Save");
    doc.set_rect(button, Rect::new(100.0, 400.0, 80.0, 30.0));
    doc.append_child(doc.body(), button);
    button
}

fn mode(h: &Harness) -> EditorMode {
    h.store.lock().mode()
}

#[test]
fn test_start_attaches_capture_listeners() {
    let h = harness();
    h.picker.start().unwrap();
    assert_eq!(mode(&h), EditorMode::Picking);
    assert!(h.picker.is_active());
    assert_eq!(h.doc.listener_count(EventKind::PointerMove), 1);
    assert_eq!(h.doc.listener_count(EventKind::Click), 1);
    assert!(h.overlay.state().pointer_passthrough);
}

#[test]
fn test_start_twice_is_rejected() {
    let h = harness();
    h.picker.start().unwrap();
    let err = h.picker.start().unwrap_err();
    assert_eq!(err.from, EditorMode::Picking);
    assert_eq!(h.doc.listener_count(EventKind::Click), 1);
}

#[test]
fn test_click_on_save_selects_once() {
    let mut h = harness();
    let button = save_button(&h.doc);
    let before = h.doc.host_activations();

    h.picker.start().unwrap();
    let event = h.doc.click(button);

    assert!(event.default_prevented());
    assert_eq!(h.doc.host_activations(), before);
    assert_eq!(mode(&h), EditorMode::Editing);

    let expected = ElementInfo {
        selector: "#save".to_string(),
        rect: Rect::new(100.0, 400.0, 80.0, 30.0),
        captured_text: "Save".to_string(),
        tag_name: "button".to_string(),
    };
    assert_eq!(h.events.try_recv(), Ok(PickerEvent::Selected(expected.clone())));
    assert_eq!(h.events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(h.store.lock().selected(), Some(&expected));
    assert_eq!(h.overlay.state().editor, Some(expected));
    assert!(!h.overlay.state().pointer_passthrough);
}

#[test]
fn test_no_hover_listener_after_pick() {
    let h = harness();
    let button = save_button(&h.doc);
    let other = h.doc.create_element("p");
    h.doc.append_child(h.doc.body(), other);

    h.picker.start().unwrap();
    h.doc.pointer_move(other);
    assert_eq!(h.overlay.state().highlight_updates, 1);
    h.doc.click(button);

    let updates = h.overlay.state().highlight_updates;
    h.doc.pointer_move(other);
    h.doc.pointer_move(button);
    h.doc.scroll_to(0.0, 50.0);

    assert_eq!(h.overlay.state().highlight_updates, updates);
    assert!(h.overlay.state().highlight.is_none());
    assert_eq!(h.doc.listener_count(EventKind::PointerMove), 0);
    assert!(!h.picker.is_active());
}

#[test]
fn test_clicks_after_pick_reach_host_page() {
    let h = harness();
    let button = save_button(&h.doc);
    h.picker.start().unwrap();
    h.doc.click(button);

    let before = h.doc.host_activations();
    let event = h.doc.click(button);
    assert!(!event.default_prevented());
    assert_eq!(h.doc.host_activations(), before + 1);
}

#[test]
fn test_hover_tracks_rect_and_scroll() {
    let h = harness();
    let button = save_button(&h.doc);
    h.picker.start().unwrap();

    h.doc.pointer_move(button);
    assert_eq!(h.overlay.state().highlight, Some(Rect::new(100.0, 400.0, 80.0, 30.0)));

    h.doc.scroll_to(0.0, 150.0);
    assert_eq!(h.overlay.state().highlight, Some(Rect::new(100.0, 250.0, 80.0, 30.0)));

    h.doc.resize_viewport(640.0, 480.0);
    assert_eq!(h.overlay.state().highlight_updates, 3);
}

#[test]
fn test_own_nodes_are_excluded() {
    let mut h = harness();
    let own = h.doc.create_element("button");
    h.doc.append_child(h.overlay.host(), own);

    h.picker.start().unwrap();
    let page = save_button(&h.doc);
    h.doc.pointer_move(page);
    assert!(h.overlay.state().highlight.is_some());

    h.doc.pointer_move(own);
    assert!(h.overlay.state().highlight.is_none());

    let event = h.doc.click(own);
    assert!(event.propagation_stopped());
    assert_eq!(mode(&h), EditorMode::Picking);
    assert_eq!(h.events.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn test_cancel_discards_and_detaches() {
    let mut h = harness();
    let button = save_button(&h.doc);
    h.picker.start().unwrap();
    h.doc.pointer_move(button);

    h.picker.cancel().unwrap();
    assert_eq!(mode(&h), EditorMode::Idle);
    assert!(h.store.lock().selected().is_none());
    assert!(h.overlay.state().highlight.is_none());
    assert_eq!(h.doc.listener_count(EventKind::Click), 0);
    assert_eq!(h.events.try_recv(), Ok(PickerEvent::Cancelled));
}

#[test]
fn test_cancel_when_idle_fails() {
    let h = harness();
    assert!(h.picker.cancel().is_err());
}

#[test]
fn test_escape_cancels() {
    let mut h = harness();
    h.picker.start().unwrap();

    h.doc.key_down("a");
    assert_eq!(mode(&h), EditorMode::Picking);

    h.doc.key_down("Escape");
    assert_eq!(mode(&h), EditorMode::Idle);
    assert_eq!(h.events.try_recv(), Ok(PickerEvent::Cancelled));
    assert_eq!(h.doc.listener_count(EventKind::KeyDown), 0);
}

#[test]
fn test_captured_text_trimmed_and_truncated() {
    let h = harness();
    let node = h.doc.create_element("div");
    h.doc.set_text(node, &format!("   {}   ", "x".repeat(250)));
    h.doc.append_child(h.doc.body(), node);

    let info = element_info(&h.doc.read(), node);
    assert_eq!(info.captured_text.len(), MAX_CAPTURED_TEXT);
    assert!(info.captured_text.chars().all(|c| c == 'x'));
}

#[test]
fn test_dropped_picker_leaves_inert_listeners() {
    let h = harness();
    let button = save_button(&h.doc);
    h.picker.start().unwrap();
    let doc = h.doc.clone();
    drop(h);

    let event = doc.click(button);
    assert!(!event.default_prevented());
}
