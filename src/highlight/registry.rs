//! Highlight Registry: one overlay per distinct highlight key, shared by
//! every comment anchored to the same text.
//!
//! The registry owns the key -> overlay and key -> comments maps and keeps
//! them in lockstep: a key is present in one exactly when it is present in
//! the other. Applying an anchor whose key already has an overlay merges the
//! comment onto it; removing the last comment of a key unwraps the overlay.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::anchor::{Anchor, HighlightKey};
use crate::comment::{Comment, CommentId};
use crate::dom::range::DomRange;
use crate::dom::{query_selector, BoundaryPoint, Document, NodeId};
use crate::highlight::render::{
    inside_overlay, set_comment_count, set_visible, unwrap, wrap_range,
};
use crate::text::{char_len, char_slice};

// =============================================================================
// Types
// =============================================================================

/// What `apply` did (or declined to do). Skips are expected states, not
/// errors: the comment still renders in the panel, just without an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyOutcome {
    /// New overlay wrapped around the anchored text.
    Created,
    /// The key already had an overlay; this comment joined it.
    Merged,
    /// This exact comment is already attached to its overlay.
    AlreadyTracked,
    /// The selector no longer resolves to an element.
    SkippedUnresolved,
    /// The element's text at the stored offsets is not the selected text.
    SkippedMismatch,
    /// The target text already sits inside another key's overlay.
    SkippedNested,
}

impl ApplyOutcome {
    /// Whether the comment is now tracked against a live overlay.
    pub fn attached(self) -> bool {
        matches!(
            self,
            ApplyOutcome::Created | ApplyOutcome::Merged | ApplyOutcome::AlreadyTracked
        )
    }
}

/// Outcome of the read-only half of `apply`.
enum ApplyPlan {
    /// The key already has an overlay; this comment joins it.
    Join,
    /// Wrap a new overlay pinned at this text node + node-relative offset.
    Wrap { node: NodeId, node_start: usize },
    Skip(ApplyOutcome),
}

#[derive(Debug, Default)]
pub struct HighlightRegistry {
    overlays: HashMap<HighlightKey, NodeId>,
    comments: HashMap<HighlightKey, Vec<CommentId>>,
    visible: bool,
}

// =============================================================================
// HighlightRegistry
// =============================================================================

impl HighlightRegistry {
    pub fn new() -> Self {
        HighlightRegistry {
            overlays: HashMap::new(),
            comments: HashMap::new(),
            visible: true,
        }
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn overlay_for(&self, key: &HighlightKey) -> Option<NodeId> {
        self.overlays.get(key).copied()
    }

    pub fn comment_count(&self, key: &HighlightKey) -> usize {
        self.comments.get(key).map(|c| c.len()).unwrap_or(0)
    }

    /// Overlay carrying the given comment, if it has one — the scroll target
    /// for "jump to comment".
    pub fn scroll_target(&self, comment_id: &str) -> Option<NodeId> {
        let (key, _) = self
            .comments
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == comment_id))?;
        self.overlays.get(key).copied()
    }

    /// Decide what `apply` would do, without mutating anything. This is the
    /// synchronous half of the deferred-visibility flow: the skip/attach
    /// decision is taken before the host awaits its preference lookup.
    pub fn precheck(&self, doc: &Document, anchor: &Anchor, comment_id: &str) -> ApplyOutcome {
        match self.plan(doc, anchor, comment_id) {
            ApplyPlan::Skip(outcome) => outcome,
            ApplyPlan::Join => ApplyOutcome::Merged,
            ApplyPlan::Wrap { .. } => ApplyOutcome::Created,
        }
    }

    /// Attach a comment's highlight to the document.
    ///
    /// Same-session trust: the anchor was either just captured or just
    /// re-validated by the resolver, so the selector + offsets are verified
    /// literally here rather than re-running the layered search.
    pub fn apply(&mut self, doc: &mut Document, anchor: &Anchor, comment_id: &str) -> ApplyOutcome {
        let key = anchor.key();
        let (node, node_start) = match self.plan(doc, anchor, comment_id) {
            ApplyPlan::Skip(outcome) => return outcome,
            ApplyPlan::Join => {
                let ids = self.comments.entry(key.clone()).or_default();
                ids.push(comment_id.to_string());
                let count = ids.len();
                let overlay = self.overlays[&key];
                set_comment_count(doc, overlay, count);
                return ApplyOutcome::Merged;
            }
            ApplyPlan::Wrap { node, node_start } => (node, node_start),
        };

        // Clamp to the node: a selection spilling into the next text node
        // highlights the run inside this one.
        let node_len = doc.text(node).map(char_len).unwrap_or(0);
        let node_end = (node_start + char_len(&anchor.selected_text)).min(node_len);
        let range = DomRange::new(
            BoundaryPoint {
                node,
                offset: node_start,
            },
            BoundaryPoint {
                node,
                offset: node_end,
            },
        );
        let Ok(overlay) = wrap_range(doc, &range, &key, self.visible) else {
            return ApplyOutcome::SkippedMismatch;
        };

        self.overlays.insert(key.clone(), overlay);
        self.comments.insert(key, vec![comment_id.to_string()]);
        ApplyOutcome::Created
    }

    fn plan(&self, doc: &Document, anchor: &Anchor, comment_id: &str) -> ApplyPlan {
        // A comment hangs off at most one overlay. An id tracked under any
        // key stays where it is, whatever key the new anchor carries.
        if self.tracked(comment_id) {
            return ApplyPlan::Skip(ApplyOutcome::AlreadyTracked);
        }

        let key = anchor.key();
        if self.overlays.contains_key(&key) {
            return ApplyPlan::Join;
        }

        if !anchor.is_well_formed() {
            return ApplyPlan::Skip(ApplyOutcome::SkippedMismatch);
        }
        let Some(element) = query_selector(doc, &anchor.selector) else {
            return ApplyPlan::Skip(ApplyOutcome::SkippedUnresolved);
        };
        let full_text = doc.text_content(element);
        if char_slice(&full_text, anchor.start_offset, anchor.end_offset) != anchor.selected_text {
            return ApplyPlan::Skip(ApplyOutcome::SkippedMismatch);
        }

        // Pin the element-relative start offset to its containing text node.
        // The walk covers every text node (blank runs included) so offsets
        // stay aligned with the element's concatenated text content.
        let Some((node, node_start)) = locate_text_node(doc, element, anchor.start_offset) else {
            return ApplyPlan::Skip(ApplyOutcome::SkippedMismatch);
        };
        if inside_overlay(doc, node, element) {
            return ApplyPlan::Skip(ApplyOutcome::SkippedNested);
        }
        ApplyPlan::Wrap { node, node_start }
    }

    /// Whether any key's comment set already holds this id.
    fn tracked(&self, comment_id: &str) -> bool {
        self.comments
            .values()
            .any(|ids| ids.iter().any(|id| id == comment_id))
    }

    /// Detach a comment from its overlay; the overlay itself is unwrapped
    /// only when this was its last comment. Returns false for untracked ids.
    pub fn remove(&mut self, doc: &mut Document, comment_id: &str) -> bool {
        let Some(key) = self
            .comments
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == comment_id))
            .map(|(key, _)| key.clone())
        else {
            return false;
        };

        let ids = self.comments.get_mut(&key).expect("key tracked above");
        ids.retain(|id| id != comment_id);
        if ids.is_empty() {
            self.comments.remove(&key);
            if let Some(overlay) = self.overlays.remove(&key) {
                unwrap(doc, overlay);
            }
        } else {
            let count = ids.len();
            if let Some(&overlay) = self.overlays.get(&key) {
                set_comment_count(doc, overlay, count);
            }
        }
        true
    }

    /// Tear down every overlay and re-apply from the given comments, in
    /// order. The recovery path after the page mutated under us.
    pub fn refresh_all(&mut self, doc: &mut Document, comments: &[Comment]) {
        self.clear(doc);
        for comment in comments {
            self.apply(doc, &comment.anchor, &comment.id);
        }
    }

    /// Unwrap all overlays and forget all tracking.
    pub fn clear(&mut self, doc: &mut Document) {
        for (_, overlay) in self.overlays.drain() {
            unwrap(doc, overlay);
        }
        self.comments.clear();
    }

    /// Show or hide every overlay; new overlays inherit the setting.
    pub fn set_visibility(&mut self, doc: &mut Document, visible: bool) {
        self.visible = visible;
        for &overlay in self.overlays.values() {
            set_visible(doc, overlay, visible);
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }
}

/// Containing text node of an element-relative char offset, plus the offset
/// rebased into that node.
fn locate_text_node(doc: &Document, element: NodeId, offset: usize) -> Option<(NodeId, usize)> {
    let mut acc = 0usize;
    for node in doc.text_nodes_under(element, |_, _| true) {
        let len = char_len(doc.text(node).unwrap_or(""));
        if acc + len > offset {
            return Some((node, offset - acc));
        }
        acc += len;
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
