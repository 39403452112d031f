//! Selector synthesis.
//!
//! Produces a selector for a node that survives reloads as well as the page
//! allows. Candidates are tried in order of stability; the ancestor path at
//! the end always succeeds, so synthesis never fails.

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{css_escape, quote_attribute, Document, NodeId};

/// Attribute reserved for test hooks on the host page.
pub const TEST_ATTRIBUTE: &str = "data-testid";

/// Ids that frameworks generate per render and therefore do not survive a
/// reload.
static GENERATED_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(:r[0-9a-z]*:|ember\d+|radix-.*|headlessui-.*|mui-\d+|react-select-\d+.*)$|[0-9a-f]{8}-[0-9a-f]{4}-|\d{6,}")
        .expect("static regex is valid")
});

/// Build a selector for `node` from the current document shape.
pub fn synthesize(doc: &Document, node: NodeId) -> String {
    if let Some(id) = stable_id(doc, node) {
        return format!("#{}", css_escape(id));
    }

    if let Some(value) = doc.attribute(node, TEST_ATTRIBUTE).filter(|v| !v.trim().is_empty()) {
        return format!("[{}={}]", TEST_ATTRIBUTE, quote_attribute(value));
    }

    if let Some(selector) = unique_class_selector(doc, node) {
        return selector;
    }

    ancestor_path(doc, node)
}

/// The node's id if it looks hand-written and is unique in the document.
fn stable_id(doc: &Document, node: NodeId) -> Option<&str> {
    let id = doc.id(node)?;
    if id.trim() != id || GENERATED_ID.is_match(id) {
        return None;
    }
    let selector = format!("#{}", css_escape(id));
    match doc.query_selector_all(&selector) {
        Ok(found) if found == [node] => Some(id),
        _ => None,
    }
}

fn unique_class_selector(doc: &Document, node: NodeId) -> Option<String> {
    let classes = doc.class_list(node);
    if classes.is_empty() {
        return None;
    }
    let selector: String = classes
        .iter()
        .map(|c| format!(".{}", css_escape(c)))
        .collect();
    match doc.query_selector_all(&selector) {
        Ok(found) if found == [node] => Some(selector),
        _ => None,
    }
}

/// `tag[:nth-of-type(n)]` steps joined by `>`, anchored at the nearest
/// ancestor with a stable id, or at `body`.
fn ancestor_path(doc: &Document, node: NodeId) -> String {
    let body = doc.body();
    if node == body || node == doc.root() {
        return doc.tag_name(node).to_string();
    }

    let mut steps = Vec::new();
    let mut current = Some(node);
    let mut anchor = None;

    while let Some(n) = current {
        if n == body {
            anchor = Some("body".to_string());
            break;
        }
        if n != node {
            if let Some(id) = stable_id(doc, n) {
                anchor = Some(format!("#{}", css_escape(id)));
                break;
            }
        }
        steps.push(step(doc, n));
        current = doc.parent(n);
    }

    steps.reverse();
    let path = steps.join(" > ");
    match anchor {
        Some(anchor) => format!("{} > {}", anchor, path),
        None => path,
    }
}

fn step(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag_name(node);
    if doc.same_tag_siblings(node).len() > 1 {
        format!("{}:nth-of-type({})", tag, doc.nth_of_type(node))
    } else {
        tag.to_string()
    }
}

#[cfg(test)]
#[path = "synthesizer_tests.rs"]
mod tests;
