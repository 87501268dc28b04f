//! Live text ranges over the arena document.
//!
//! A `DomRange` pins two boundary points inside text nodes (char offsets,
//! node-relative). The helpers here convert between element-relative offsets
//! in the concatenated `textContent` and node-relative boundary points —
//! the same mapping the host performs with a tree walker.

use serde::{Deserialize, Serialize};

use super::node::{Document, NodeId};
use crate::text::char_len;

// =============================================================================
// Types
// =============================================================================

/// A position inside a text node, as a char offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

/// A span of live text between two boundary points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomRange {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl DomRange {
    pub fn new(start: BoundaryPoint, end: BoundaryPoint) -> Self {
        DomRange { start, end }
    }

    /// Both boundaries inside the same text node.
    pub fn collapsed_to_node(&self) -> bool {
        self.start.node == self.end.node
    }
}

// =============================================================================
// Container & offset mapping
// =============================================================================

/// Lowest common ancestor of the two boundary nodes; when that ancestor is a
/// text node its parent element is used (selection semantics).
pub fn common_container(doc: &Document, range: &DomRange) -> NodeId {
    let mut a_chain = Vec::new();
    let mut current = Some(range.start.node);
    while let Some(n) = current {
        a_chain.push(n);
        current = doc.parent(n);
    }
    let mut current = Some(range.end.node);
    while let Some(n) = current {
        if a_chain.contains(&n) {
            return doc.containing_element(n);
        }
        current = doc.parent(n);
    }
    doc.root()
}

/// Char offsets of the range boundaries within `element`'s concatenated
/// text content. `None` when a boundary node is not a text descendant of
/// `element`.
pub fn element_offsets(doc: &Document, element: NodeId, range: &DomRange) -> Option<(usize, usize)> {
    let mut start = None;
    let mut end = None;
    let mut acc = 0usize;
    for node in doc.text_nodes_under(element, |_, _| true) {
        if node == range.start.node {
            start = Some(acc + range.start.offset);
        }
        if node == range.end.node {
            end = Some(acc + range.end.offset);
        }
        acc += char_len(doc.text(node).unwrap_or(""));
    }
    match (start, end) {
        (Some(s), Some(e)) if s <= e => Some((s, e)),
        _ => None,
    }
}

/// Map element-relative char offsets back onto text-node boundary points.
/// Offsets past the end of the text yield `None`.
pub fn range_from_element_offsets(
    doc: &Document,
    element: NodeId,
    start_offset: usize,
    end_offset: usize,
) -> Option<DomRange> {
    if end_offset < start_offset {
        return None;
    }
    let mut start = None;
    let mut end = None;
    let mut acc = 0usize;
    for node in doc.text_nodes_under(element, |_, _| true) {
        let len = char_len(doc.text(node).unwrap_or(""));
        // Strict: a boundary that falls exactly between two nodes belongs to
        // the node that contains the first selected char.
        if start.is_none() && acc + len > start_offset {
            start = Some(BoundaryPoint {
                node,
                offset: start_offset - acc,
            });
        }
        if acc + len >= end_offset {
            end = Some(BoundaryPoint {
                node,
                offset: end_offset - acc,
            });
            break;
        }
        acc += len;
    }
    Some(DomRange::new(start?, end?))
}

/// The text spanned by a range (concatenating across text nodes).
pub fn range_text(doc: &Document, range: &DomRange) -> String {
    if range.collapsed_to_node() {
        let text = doc.text(range.start.node).unwrap_or("");
        return crate::text::char_slice(text, range.start.offset, range.end.offset).to_string();
    }
    let container = common_container(doc, range);
    let mut out = String::new();
    let mut in_range = false;
    for node in doc.text_nodes_under(container, |_, _| true) {
        let text = doc.text(node).unwrap_or("");
        let len = char_len(text);
        let from = if node == range.start.node {
            in_range = true;
            range.start.offset
        } else {
            0
        };
        let to = if node == range.end.node { range.end.offset } else { len };
        if in_range {
            out.push_str(crate::text::char_slice(text, from, to));
        }
        if node == range.end.node {
            break;
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
