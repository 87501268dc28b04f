//! Selector Builder: turn a live selection into an immutable `Anchor`.
//!
//! Read-only over the document. The containing element is the lowest common
//! ancestor of the selection boundaries, which can be larger than intended
//! for selections spanning elements — accepted limitation.

use std::fmt;

use crate::anchor::types::{Anchor, CONTEXT_CHARS};
use crate::dom::range::{common_container, element_offsets, DomRange};
use crate::dom::selector::element_path;
use crate::dom::{Document, NodeId};
use crate::text::{char_index_of, char_len, window_after, window_before};

/// Selections shorter than this (after trimming) carry too little signal to
/// re-locate and are rejected.
pub const MIN_SELECTION_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Trimmed selection is under `MIN_SELECTION_CHARS`.
    SelectionTooShort,
    /// The selection boundaries could not be located inside the containing
    /// element and the selected text does not occur in its text either.
    TextNotFound,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::SelectionTooShort => {
                write!(f, "selection shorter than {} chars", MIN_SELECTION_CHARS)
            }
            BuildError::TextNotFound => write!(f, "selection text not found in container"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Build an anchor from a live range and its (pre-trimmed) selected text.
pub fn build_anchor(
    doc: &Document,
    range: &DomRange,
    selected_text: &str,
    page_url: &str,
    captured_at: i64,
) -> Result<Anchor, BuildError> {
    let selected_text = selected_text.trim();
    if char_len(selected_text) < MIN_SELECTION_CHARS {
        return Err(BuildError::SelectionTooShort);
    }

    let container = common_container(doc, range);
    let selector = element_path(doc, container);
    let full_text = doc.text_content(container);

    // Locate boundaries by walking text descendants; fall back to the first
    // occurrence of the selected text when the boundary nodes cannot be
    // matched (e.g. a range captured against a now-edited snapshot).
    let (start_offset, end_offset) = match element_offsets(doc, container, range) {
        Some(offsets) => offsets,
        None => {
            let start = char_index_of(&full_text, selected_text).ok_or(BuildError::TextNotFound)?;
            (start, start + char_len(selected_text))
        }
    };

    Ok(Anchor {
        page_url: page_url.to_string(),
        selector,
        selected_text: selected_text.to_string(),
        start_offset,
        end_offset,
        context_before: window_before(&full_text, start_offset, CONTEXT_CHARS),
        context_after: window_after(&full_text, end_offset, CONTEXT_CHARS),
        captured_at,
    })
}

// =============================================================================
// Tests
// =============================================================================
