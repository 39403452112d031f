//! Render target contract.
//!
//! Everything the extension draws on a page goes through a [`RenderTarget`].
//! Implementations must isolate their output from host-page styles and must
//! honour pointer pass-through: while it is on, pointer events reach the
//! host page underneath the overlay.

mod overlay;

pub use overlay::{OverlayState, RenderedStep, ShadowOverlay};

use waymark_protocols::{Banner, ElementInfo, Rect, Tooltip, TourStep};

use crate::dom::{Document, NodeId};

/// Attribute marking the host element of extension-owned UI.
pub const OVERLAY_ATTR: &str = "data-waymark-root";

/// Whether `node` belongs to the extension's own UI.
pub fn is_own_node(doc: &Document, node: NodeId) -> bool {
    doc.has_attribute(node, OVERLAY_ATTR) || doc.ancestors(node).any(|a| doc.has_attribute(a, OVERLAY_ATTR))
}

/// Style-isolated surface for extension UI.
pub trait RenderTarget: Send + Sync {
    /// Outline the hovered element.
    fn show_highlight(&self, rect: Rect);

    fn clear_highlight(&self);

    /// Surface the editing panel for a picked element.
    fn show_editor(&self, element: &ElementInfo);

    fn hide_editor(&self);

    /// Render one tour step. `anchor` is `None` when the step's element
    /// could not be located; the step is then shown centered.
    fn render_step(&self, step: &TourStep, index: usize, total: usize, anchor: Option<Rect>);

    fn clear_step(&self);

    fn render_tooltip(&self, tooltip: &Tooltip, anchor: Rect);

    fn render_banner(&self, banner: &Banner);

    /// Let pointer events fall through to the host page.
    fn set_pointer_passthrough(&self, enabled: bool);

    /// Remove everything this target has rendered.
    fn teardown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_node_by_ancestor() {
        let mut doc = Document::new();
        let body = doc.body();
        let host = doc.create_element("div");
        doc.set_attribute(host, OVERLAY_ATTR, "");
        doc.append_child(body, host);
        let inner = doc.create_element("button");
        doc.append_child(host, inner);
        let page = doc.create_element("button");
        doc.append_child(body, page);

        assert!(is_own_node(&doc, host));
        assert!(is_own_node(&doc, inner));
        assert!(!is_own_node(&doc, page));
        assert!(!is_own_node(&doc, body));
    }
}
