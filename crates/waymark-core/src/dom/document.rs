//! Element arena and structural queries.

use waymark_protocols::Rect;

use super::dom_types::{MutationRecord, NodeId};
use super::selector::{Selector, SelectorError};

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    /// Layout box in page coordinates.
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A page's element tree.
///
/// Node `html` is the root and always has a `body` child. Nodes created with
/// [`create_element`](Self::create_element) are detached until appended.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    scroll: (f64, f64),
    viewport: (f64, f64),
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            scroll: (0.0, 0.0),
            viewport: (1280.0, 720.0),
        };
        doc.root = doc.create_element("html");
        doc.body = doc.create_element("body");
        doc.append_child(doc.root, doc.body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element. Tag names are stored lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            rect: Rect::default(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> MutationRecord {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        MutationRecord::ChildList { target: parent }
    }

    /// Detach `node` (and its subtree) from its parent.
    pub fn remove(&mut self, node: NodeId) -> Option<MutationRecord> {
        let parent = self.nodes[node.0].parent?;
        self.detach(node);
        Some(MutationRecord::ChildList { target: parent })
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> MutationRecord {
        let name = name.to_ascii_lowercase();
        let attrs = &mut self.nodes[node.0].attributes;
        match attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attrs.push((name.clone(), value.to_string())),
        }
        MutationRecord::Attributes { target: node, name }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<MutationRecord> {
        let name = name.to_ascii_lowercase();
        let attrs = &mut self.nodes[node.0].attributes;
        let before = attrs.len();
        attrs.retain(|(k, _)| *k != name);
        (attrs.len() != before).then_some(MutationRecord::Attributes { target: node, name })
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> MutationRecord {
        self.nodes[node.0].text = text.to_string();
        MutationRecord::CharacterData { target: node }
    }

    /// Set the layout box of `node` in page coordinates.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = rect;
    }

    pub fn tag_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0]
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    /// Class list, split on whitespace. Empty entries never appear.
    pub fn class_list(&self, node: NodeId) -> Vec<&str> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// The node's own text.
    pub fn text(&self, node: NodeId) -> &str {
        &self.nodes[node.0].text
    }

    /// Own text followed by descendants' text, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.0];
        if !data.text.is_empty() {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            out.push_str(&data.text);
        }
        for child in &data.children {
            self.collect_text(*child, out);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// Whether `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root || self.ancestors(node).any(|a| a == self.root)
    }

    /// Same-tag siblings of `node`, including itself, in order.
    pub fn same_tag_siblings(&self, node: NodeId) -> Vec<NodeId> {
        let tag = self.tag_name(node);
        match self.parent(node) {
            Some(parent) => self
                .children(parent)
                .iter()
                .copied()
                .filter(|c| self.tag_name(*c) == tag)
                .collect(),
            None => vec![node],
        }
    }

    /// 1-based position among same-tag siblings.
    pub fn nth_of_type(&self, node: NodeId) -> usize {
        self.same_tag_siblings(node)
            .iter()
            .position(|n| *n == node)
            .map(|p| p + 1)
            .unwrap_or(1)
    }

    /// Connected nodes in document (pre-)order.
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// First connected node matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        Ok(self.query_first(&parsed))
    }

    /// Every connected node matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        Ok(self.query_all(&parsed))
    }

    pub fn query_first(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants()
            .into_iter()
            .find(|n| selector.matches(self, *n))
    }

    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.descendants()
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    /// Layout box translated into viewport coordinates.
    pub fn bounding_client_rect(&self, node: NodeId) -> Rect {
        self.nodes[node.0]
            .rect
            .translate(-self.scroll.0, -self.scroll.1)
    }

    pub fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll = (x.max(0.0), y.max(0.0));
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
    }
}
