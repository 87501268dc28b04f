//! Arena document model.
//!
//! The engine never touches the live browser DOM. The JS host feeds in a
//! snapshot of the page tree; the core computes on this arena and the host
//! mirrors structural mutations (overlay wrap/unwrap) back to the page.
//! Nodes are indices into a `Vec` — no `Rc` cycles, trivially serializable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::text::is_blank;

// =============================================================================
// Core Types
// =============================================================================

/// Index of a node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a node: an element with tag/id/attributes, or a text run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeData {
    Element {
        /// Lowercased tag name ("div", "p", ...).
        tag: String,
        /// The `id` attribute, when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Remaining attributes, ordered for deterministic snapshots.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
    /// Detached nodes stay in the arena but are invisible to traversal.
    #[serde(default)]
    pub detached: bool,
}

/// An in-memory page document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

// =============================================================================
// Document
// =============================================================================

impl Document {
    /// Empty document: `<html><body/></html>`.
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let html = doc.push_node(None, NodeData::Element {
            tag: "html".to_string(),
            id: None,
            attrs: BTreeMap::new(),
        });
        doc.root = html;
        let body = doc.create_element("body");
        doc.append_child(html, body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` element (first element child of the root).
    pub fn body(&self) -> NodeId {
        self.node(self.root)
            .children
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
            .unwrap_or(self.root)
    }

    fn push_node(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            data,
            detached: false,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(None, NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            id: None,
            attrs: BTreeMap::new(),
        })
    }

    pub fn create_element_with_id(&mut self, tag: &str, element_id: &str) -> NodeId {
        let node = self.create_element(tag);
        if let NodeData::Element { id, .. } = &mut self.node_mut(node).data {
            *id = Some(element_id.to_string());
        }
        node
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(None, NodeData::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(child).detached = false;
        self.node_mut(parent).children.push(child);
    }

    /// Insert `child` into `parent` immediately before `reference`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(child).detached = false;
        let idx = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(self.node(parent).children.len());
        self.node_mut(parent).children.insert(idx, child);
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node).parent?;
        let siblings = &self.node(parent).children;
        let idx = siblings.iter().position(|&c| c == node)?;
        siblings.get(idx + 1).copied()
    }

    /// Insert `child` into `parent` immediately after `reference`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        match self.next_sibling(reference) {
            Some(next) => self.insert_before(parent, child, next),
            None => self.append_child(parent, child),
        }
    }

    /// Remove a node from its parent. The node stays allocated (arena) but
    /// no traversal will reach it.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.node(node).parent {
            self.node_mut(parent).children.retain(|&c| c != node);
        }
        self.node_mut(node).parent = None;
        self.node_mut(node).detached = true;
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element { .. })
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Text(_))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { id: eid, .. } => eid.as_deref(),
            NodeData::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Text(t) => Some(t),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let NodeData::Text(t) = &mut self.node_mut(id).data {
            *t = text.to_string();
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Nearest ancestor that is an element (the node itself if it already is).
    pub fn containing_element(&self, id: NodeId) -> NodeId {
        if self.is_element(id) {
            id
        } else {
            self.parent(id).map(|p| self.containing_element(p)).unwrap_or(self.root)
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(|s| s.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            attrs.remove(name);
        }
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// All descendants of `node` in document order (excluding `node` itself).
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(node, &mut out);
        out
    }

    fn collect_descendants(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.node(node).children {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    /// All elements in the document, in document order, root included.
    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root).into_iter().filter(|&n| self.is_element(n)));
        out
    }

    /// Whether some ancestor of `node` (or the node itself) satisfies `pred`.
    pub fn has_ancestor_or_self<F>(&self, node: NodeId, mut pred: F) -> bool
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        let mut current = Some(node);
        while let Some(n) = current {
            if pred(self, n) {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Text nodes under `node` in document order, optionally filtered by a
    /// per-node predicate (the tree-walker pattern from the host side).
    pub fn text_nodes_under<F>(&self, node: NodeId, mut accept: F) -> Vec<NodeId>
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .filter(|&n| accept(self, n))
            .collect()
    }

    /// Non-blank text nodes under `node` (whitespace-only runs carry no
    /// anchorable content).
    pub fn visible_text_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.text_nodes_under(node, |doc, n| {
            doc.text(n).map(|t| !is_blank(t)).unwrap_or(false)
        })
    }

    /// Concatenated text of all text descendants, document order — the
    /// `textContent` of the subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(t) = self.text(node) {
            return t.to_string();
        }
        let mut out = String::new();
        for id in self.descendants(node) {
            if let Some(t) = self.text(id) {
                out.push_str(t);
            }
        }
        out
    }

    /// First element with the given `id` attribute, document order.
    pub fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|&n| self.element_id(n) == Some(element_id))
    }

    /// Whether the given id is carried by exactly one element.
    pub fn id_is_unique(&self, element_id: &str) -> bool {
        self.all_elements()
            .iter()
            .filter(|&&n| self.element_id(n) == Some(element_id))
            .count()
            == 1
    }

    /// 1-based position of an element among same-tag element siblings.
    pub fn nth_of_type(&self, id: NodeId) -> usize {
        let Some(tag) = self.tag(id) else { return 1 };
        let Some(parent) = self.parent(id) else { return 1 };
        let mut nth = 1;
        for &sibling in &self.node(parent).children {
            if sibling == id {
                break;
            }
            if self.tag(sibling) == Some(tag) {
                nth += 1;
            }
        }
        nth
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
