//! Anchor: the durable, serializable descriptor of a text selection.
//!
//! Field names on the wire stay camelCase (`selectedText`, `startOffset`,
//! ...) so anchors round-trip against documents persisted by the JS host.
//! Context fields are optional in later anchor revisions and default to
//! empty strings, which degrades the context-driven resolver layers to bare
//! offset/text matching.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::char_len;

/// Max chars captured on each side of a selection.
pub const CONTEXT_CHARS: usize = 20;

// =============================================================================
// Anchor
// =============================================================================

/// Immutable descriptor of where a selection lived. Created once at
/// selection time, persisted alongside its comment, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Page the selection was made on.
    #[serde(rename = "url")]
    pub page_url: String,
    /// Structural path from the document root to the containing element.
    pub selector: String,
    #[serde(rename = "selectedText")]
    pub selected_text: String,
    /// Char offsets of the selection within the containing element's
    /// concatenated text content, at capture time.
    #[serde(rename = "startOffset")]
    pub start_offset: usize,
    #[serde(rename = "endOffset")]
    pub end_offset: usize,
    #[serde(rename = "contextBefore", default)]
    pub context_before: String,
    #[serde(rename = "contextAfter", default)]
    pub context_after: String,
    /// Capture time, ms since epoch.
    #[serde(rename = "timestamp", default)]
    pub captured_at: i64,
}

impl Anchor {
    /// Capture-time invariant: the offsets span exactly the selected text.
    pub fn is_well_formed(&self) -> bool {
        self.end_offset >= self.start_offset
            && self.end_offset - self.start_offset == char_len(&self.selected_text)
    }

    pub fn key(&self) -> HighlightKey {
        HighlightKey::from_anchor(self)
    }

    /// Stable id for this anchor, used as a document key by the storage
    /// collaborator.
    pub fn anchor_id(&self) -> String {
        let raw = format!(
            "{}|{}|{}|{}|{}",
            self.page_url, self.selector, self.selected_text, self.start_offset, self.end_offset
        );
        hash_base36(&raw)
    }
}

// =============================================================================
// HighlightKey
// =============================================================================

/// Deterministic identity of a physical highlight. Two anchors with the same
/// key point at the same text and must share one overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightKey(String);

impl HighlightKey {
    pub fn from_anchor(anchor: &Anchor) -> Self {
        HighlightKey(format!(
            "{}::{}::{}::{}",
            anchor.selector, anchor.start_offset, anchor.end_offset, anchor.selected_text
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Hashing
// =============================================================================

/// 31x string hash over UTF-16 code units, wrapped to i32 and rendered in
/// base 36 — bit-compatible with ids persisted by the original host
/// (`hash = ((hash << 5) - hash) + code`).
fn hash_base36(s: &str) -> String {
    let mut hash: i32 = 0;
    for unit in s.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    to_base36(hash.unsigned_abs())
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> Anchor {
        Anchor {
            page_url: "https://example.com/a".to_string(),
            selector: "html > body > p".to_string(),
            selected_text: "quick".to_string(),
            start_offset: 4,
            end_offset: 9,
            context_before: "The ".to_string(),
            context_after: " brown".to_string(),
            captured_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_well_formed() {
        assert!(anchor().is_well_formed());
        let mut bad = anchor();
        bad.end_offset = 12;
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn test_key_is_deterministic_and_position_sensitive() {
        let a = anchor();
        let b = anchor();
        assert_eq!(a.key(), b.key());
        assert_eq!(
            a.key().as_str(),
            "html > body > p::4::9::quick"
        );

        let mut moved = anchor();
        moved.start_offset = 5;
        moved.end_offset = 10;
        assert_ne!(a.key(), moved.key());
    }

    #[test]
    fn test_anchor_id_stable() {
        let a = anchor();
        assert_eq!(a.anchor_id(), a.anchor_id());
        // Differs when any identity field differs.
        let mut other = anchor();
        other.selected_text = "brown".to_string();
        other.start_offset = 10;
        other.end_offset = 15;
        assert_ne!(a.anchor_id(), other.anchor_id());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_serde_uses_wire_field_names() {
        let json = serde_json::to_string(&anchor()).unwrap();
        assert!(json.contains("\"selectedText\""));
        assert!(json.contains("\"startOffset\""));
        assert!(json.contains("\"contextBefore\""));
        assert!(json.contains("\"url\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_missing_context_defaults_to_empty() {
        let json = r#"{
            "url": "https://example.com",
            "selector": "html > body > p",
            "selectedText": "abc",
            "startOffset": 0,
            "endOffset": 3
        }"#;
        let a: Anchor = serde_json::from_str(json).unwrap();
        assert_eq!(a.context_before, "");
        assert_eq!(a.context_after, "");
        assert!(a.is_well_formed());
    }
}
