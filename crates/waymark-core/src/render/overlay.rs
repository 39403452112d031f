//! Overlay rendered under a single extension-owned host element.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;
use waymark_protocols::{Banner, ElementInfo, Rect, Tooltip, TourStep};

use super::{RenderTarget, OVERLAY_ATTR};
use crate::dom::{NodeId, SharedDocument};

/// A tour step as currently shown.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStep {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub content: String,
    /// `None` when rendered unanchored.
    pub anchor: Option<Rect>,
}

/// What the overlay currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    pub highlight: Option<Rect>,
    /// Number of times the highlight box was (re)positioned.
    pub highlight_updates: usize,
    pub editor: Option<ElementInfo>,
    pub step: Option<RenderedStep>,
    /// Tooltip id and anchor box.
    pub tooltips: Vec<(String, Rect)>,
    /// Banner ids in render order.
    pub banners: Vec<String>,
    pub pointer_passthrough: bool,
}

/// [`RenderTarget`] backed by nodes under one `data-waymark-root` host.
///
/// Every node the overlay creates lives beneath the host, so host-page
/// selectors never style it and the picker can recognise it as its own.
pub struct ShadowOverlay {
    document: SharedDocument,
    host: NodeId,
    parts: Mutex<HashMap<String, NodeId>>,
    state: Mutex<OverlayState>,
}

impl ShadowOverlay {
    /// Create the host element and attach it to the document body.
    pub fn mount(document: SharedDocument) -> Self {
        let host = document.create_element("div");
        document.set_attribute(host, OVERLAY_ATTR, "");
        document.append_child(document.body(), host);
        trace!("Overlay host mounted at {}", host);
        Self {
            document,
            host,
            parts: Mutex::new(HashMap::new()),
            state: Mutex::new(OverlayState::default()),
        }
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    /// Snapshot of what is currently shown.
    pub fn state(&self) -> OverlayState {
        self.state.lock().clone()
    }

    /// Detach the host element from the document.
    pub fn unmount(&self) {
        self.teardown();
        self.document.remove(self.host);
    }

    /// Node for `key`, creating it under the host on first use.
    fn part(&self, key: &str) -> NodeId {
        if let Some(node) = self.parts.lock().get(key) {
            return *node;
        }
        let node = self.document.create_element("div");
        self.document.set_attribute(node, "data-part", key);
        self.document.append_child(self.host, node);
        self.parts.lock().insert(key.to_string(), node);
        node
    }

    fn drop_part(&self, key: &str) {
        let node = self.parts.lock().remove(key);
        if let Some(node) = node {
            self.document.remove(node);
        }
    }

    fn drop_parts_with_prefix(&self, prefix: &str) {
        let keys: Vec<String> = self
            .parts
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in keys {
            self.drop_part(&key);
        }
    }
}

impl RenderTarget for ShadowOverlay {
    fn show_highlight(&self, rect: Rect) {
        let node = self.part("highlight");
        self.document.set_rect(node, rect);
        let mut state = self.state.lock();
        state.highlight = Some(rect);
        state.highlight_updates += 1;
    }

    fn clear_highlight(&self) {
        self.drop_part("highlight");
        self.state.lock().highlight = None;
    }

    fn show_editor(&self, element: &ElementInfo) {
        let node = self.part("editor");
        self.document.set_text(node, &element.selector);
        self.state.lock().editor = Some(element.clone());
    }

    fn hide_editor(&self) {
        self.drop_part("editor");
        self.state.lock().editor = None;
    }

    fn render_step(&self, step: &TourStep, index: usize, total: usize, anchor: Option<Rect>) {
        let node = self.part("step");
        self.document.set_text(node, &step.content);
        if let Some(rect) = anchor {
            self.document.set_rect(node, rect);
        }
        self.state.lock().step = Some(RenderedStep {
            index,
            total,
            title: step.title.clone(),
            content: step.content.clone(),
            anchor,
        });
    }

    fn clear_step(&self) {
        self.drop_part("step");
        self.state.lock().step = None;
    }

    fn render_tooltip(&self, tooltip: &Tooltip, anchor: Rect) {
        let node = self.part(&format!("tooltip:{}", tooltip.id));
        self.document.set_text(node, &tooltip.content);
        self.document.set_rect(node, anchor);

        let mut state = self.state.lock();
        state.tooltips.retain(|(id, _)| *id != tooltip.id);
        state.tooltips.push((tooltip.id.clone(), anchor));
    }

    fn render_banner(&self, banner: &Banner) {
        let node = self.part(&format!("banner:{}", banner.id));
        self.document.set_text(node, &banner.content);

        let mut state = self.state.lock();
        if !state.banners.contains(&banner.id) {
            state.banners.push(banner.id.clone());
        }
    }

    fn set_pointer_passthrough(&self, enabled: bool) {
        let value = if enabled { "none" } else { "auto" };
        self.document.set_attribute(self.host, "data-pointer-events", value);
        self.state.lock().pointer_passthrough = enabled;
    }

    fn teardown(&self) {
        self.drop_part("highlight");
        self.drop_part("editor");
        self.drop_part("step");
        self.drop_parts_with_prefix("tooltip:");
        self.drop_parts_with_prefix("banner:");
        self.set_pointer_passthrough(false);

        let mut state = self.state.lock();
        let updates = state.highlight_updates;
        *state = OverlayState {
            highlight_updates: updates,
            ..OverlayState::default()
        };
    }
}
