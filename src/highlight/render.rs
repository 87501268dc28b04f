//! Highlight Renderer: the overlay wrapper around a resolved range.
//!
//! Wrapping prefers the direct path (split the single boundary text node and
//! re-parent the middle run into a `span`). Ranges that cross node
//! boundaries take the extract-and-reinsert path instead: boundary nodes are
//! split and the covered siblings move into the wrapper at the original
//! position. Either path preserves the relative order of the moved nodes,
//! and the text identity of everything between the boundaries.
//!
//! Unwrapping re-parents the wrapper's children back, in order, immediately
//! before the wrapper, then removes it — surrounding markup is never
//! corrupted.

use std::fmt;

use crate::anchor::HighlightKey;
use crate::dom::range::DomRange;
use crate::dom::{Document, NodeId};
use crate::text::{char_len, char_slice};

/// Class carried by every overlay element.
pub const HIGHLIGHT_CLASS: &str = "margin-highlight";
/// Overlay attribute holding the canonical highlight key.
pub const KEY_ATTR: &str = "data-key";
/// Observable count of comments attached at this overlay.
pub const COMMENT_COUNT_ATTR: &str = "data-comment-count";
/// Present when the display-highlights preference is off.
pub const HIDDEN_ATTR: &str = "hidden";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A boundary point is not inside a text node.
    NotTextBoundary,
    /// Boundary text nodes live under different parents; the wrapper cannot
    /// be placed without splitting elements.
    CrossBoundary,
    /// The range selects no text.
    EmptyRange,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotTextBoundary => write!(f, "range boundary is not a text node"),
            RenderError::CrossBoundary => write!(f, "range crosses an element boundary"),
            RenderError::EmptyRange => write!(f, "range selects no text"),
        }
    }
}

impl std::error::Error for RenderError {}

// =============================================================================
// Wrapping
// =============================================================================

/// Wrap the range's contents in a new overlay element and return it.
pub fn wrap_range(
    doc: &mut Document,
    range: &DomRange,
    key: &HighlightKey,
    visible: bool,
) -> Result<NodeId, RenderError> {
    if !doc.is_text(range.start.node) || !doc.is_text(range.end.node) {
        return Err(RenderError::NotTextBoundary);
    }
    let overlay = if range.collapsed_to_node() {
        wrap_single_node(doc, range)?
    } else {
        wrap_across_nodes(doc, range)?
    };
    doc.set_attr(overlay, "class", HIGHLIGHT_CLASS);
    doc.set_attr(overlay, KEY_ATTR, key.as_str());
    doc.set_attr(overlay, COMMENT_COUNT_ATTR, "1");
    set_visible(doc, overlay, visible);
    Ok(overlay)
}

/// Direct path: split one text node into [before][wrapped][after]. The
/// original node keeps its identity as the wrapped middle run.
fn wrap_single_node(doc: &mut Document, range: &DomRange) -> Result<NodeId, RenderError> {
    let node = range.start.node;
    let parent = doc.parent(node).ok_or(RenderError::CrossBoundary)?;
    let text = doc.text(node).unwrap_or("").to_string();
    let len = char_len(&text);
    let (start, end) = (range.start.offset, range.end.offset.min(len));
    if start >= end {
        return Err(RenderError::EmptyRange);
    }

    let before = char_slice(&text, 0, start).to_string();
    let middle = char_slice(&text, start, end).to_string();
    let after = char_slice(&text, end, len).to_string();

    let span = doc.create_element("span");
    doc.insert_before(parent, span, node);
    if !before.is_empty() {
        let before_node = doc.create_text(&before);
        doc.insert_before(parent, before_node, span);
    }
    doc.set_text(node, &middle);
    doc.append_child(span, node);
    if !after.is_empty() {
        let after_node = doc.create_text(&after);
        doc.insert_after(parent, after_node, span);
    }
    Ok(span)
}

/// Fallback path: extract the covered sibling run into the wrapper. Both
/// boundary text nodes must share a parent.
fn wrap_across_nodes(doc: &mut Document, range: &DomRange) -> Result<NodeId, RenderError> {
    let parent = doc.parent(range.start.node).ok_or(RenderError::CrossBoundary)?;
    if doc.parent(range.end.node) != Some(parent) {
        return Err(RenderError::CrossBoundary);
    }

    // Split the start node: its head stays in place, its tail is covered.
    let start_text = doc.text(range.start.node).unwrap_or("").to_string();
    let first_covered = if range.start.offset == 0 {
        range.start.node
    } else {
        let head = char_slice(&start_text, 0, range.start.offset).to_string();
        let tail = char_slice(&start_text, range.start.offset, char_len(&start_text)).to_string();
        doc.set_text(range.start.node, &head);
        let tail_node = doc.create_text(&tail);
        doc.insert_after(parent, tail_node, range.start.node);
        tail_node
    };

    // Split the end node: its head is covered, its tail stays in place.
    let end_text = doc.text(range.end.node).unwrap_or("").to_string();
    let end_len = char_len(&end_text);
    let last_covered = if range.end.offset >= end_len {
        range.end.node
    } else {
        let head = char_slice(&end_text, 0, range.end.offset).to_string();
        let tail = char_slice(&end_text, range.end.offset, end_len).to_string();
        doc.set_text(range.end.node, &tail);
        let head_node = doc.create_text(&head);
        doc.insert_before(parent, head_node, range.end.node);
        head_node
    };

    let siblings = doc.node(parent).children.clone();
    let from = siblings.iter().position(|&c| c == first_covered);
    let to = siblings.iter().position(|&c| c == last_covered);
    let (Some(from), Some(to)) = (from, to) else {
        return Err(RenderError::CrossBoundary);
    };
    if from > to {
        return Err(RenderError::EmptyRange);
    }

    let span = doc.create_element("span");
    doc.insert_before(parent, span, siblings[from]);
    for &covered in &siblings[from..=to] {
        doc.append_child(span, covered);
    }
    Ok(span)
}

// =============================================================================
// Unwrap & attributes
// =============================================================================

/// Move the overlay's children back to its parent (in order, before the
/// overlay), then remove the overlay.
pub fn unwrap(doc: &mut Document, overlay: NodeId) {
    let Some(parent) = doc.parent(overlay) else {
        doc.detach(overlay);
        return;
    };
    for child in doc.node(overlay).children.clone() {
        doc.insert_before(parent, child, overlay);
    }
    doc.detach(overlay);
}

pub fn set_visible(doc: &mut Document, overlay: NodeId, visible: bool) {
    if visible {
        doc.remove_attr(overlay, HIDDEN_ATTR);
    } else {
        doc.set_attr(overlay, HIDDEN_ATTR, "");
    }
}

pub fn set_comment_count(doc: &mut Document, overlay: NodeId, count: usize) {
    doc.set_attr(overlay, COMMENT_COUNT_ATTR, &count.to_string());
}

pub fn is_overlay(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "class")
        .map(|c| c.split_whitespace().any(|t| t == HIGHLIGHT_CLASS))
        .unwrap_or(false)
}

/// Whether `node` sits inside an overlay strictly below `stop` (exclusive).
pub fn inside_overlay(doc: &Document, node: NodeId, stop: NodeId) -> bool {
    let mut current = doc.parent(node);
    while let Some(n) = current {
        if n == stop {
            return false;
        }
        if is_overlay(doc, n) {
            return true;
        }
        current = doc.parent(n);
    }
    false
}

// =============================================================================
// Tests
// =============================================================================
