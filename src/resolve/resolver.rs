//! Anchor Resolver: map a stored `Anchor` back onto a live document.
//!
//! Layered strategy, first satisfying match wins:
//!
//! 1. exact selector + exact offsets            -> confidence 1.0
//! 2. exact selector + context-pattern search   -> confidence 0.9
//! 3. exact selector + bare text + context sim  -> confidence = similarity (> 0.7)
//! 4. document-wide fuzzy scan                  -> best-scoring occurrence, no floor
//!
//! Resolution is pure: same document + same anchor always produces the same
//! result. Misses are `None`, never errors — a page that lost the text
//! simply shows the comment without a highlight.

use aho_corasick::AhoCorasick;
use instant::Instant;
use serde::{Deserialize, Serialize};

use crate::anchor::{Anchor, CONTEXT_CHARS};
use crate::dom::range::{range_from_element_offsets, DomRange};
use crate::dom::selector::SelectorPath;
use crate::dom::{BoundaryPoint, Document, NodeId};
use crate::resolve::similarity::similarity;
use crate::text::{char_len, char_offset_at, char_slice, window_after, window_before};

/// Layer-3 acceptance floor for context similarity.
pub const MIN_CONTEXT_SIMILARITY: f64 = 0.7;
/// Validation floor: below this a resolution is reported as invalid.
pub const ACCEPT_THRESHOLD: f64 = 0.5;
/// Upper bound on scored occurrences in the document-wide layer, so a huge
/// page with a pathologically common selection stays bounded.
pub const MAX_FUZZY_CANDIDATES: usize = 64;

/// Marker attribute carried by the engine's own chrome; subtrees under it
/// are never scanned.
pub const UI_MARKER_ATTR: &str = "data-margin-ui";

// =============================================================================
// Types
// =============================================================================

/// Which layer produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStrategy {
    ExactOffsets,
    ContextSearch,
    TextSearch,
    FuzzyScan,
}

/// A resolved live position with a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMatch {
    /// Containing element of the match.
    pub element: NodeId,
    /// Set when the match was pinned inside a single text node by the
    /// document-wide layer; offsets are then node-relative.
    pub text_node: Option<NodeId>,
    /// Char offsets — element-relative, unless `text_node` is set.
    pub start_offset: usize,
    pub end_offset: usize,
    pub confidence: f64,
    pub strategy: MatchStrategy,
}

/// `validate` verdict: resolution plus the acceptance decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorValidation {
    pub valid: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<NodeId>,
    #[serde(skip)]
    pub range: Option<DomRange>,
}

/// Resolution outcome with timing, in the engine's usual stats shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReport {
    pub matched: Option<ResolvedMatch>,
    pub elapsed_ms: f64,
    /// Occurrences scored by the document-wide layer (0 when an earlier
    /// layer matched).
    pub fuzzy_candidates: usize,
}

// =============================================================================
// AnchorResolver
// =============================================================================

#[derive(Debug, Clone)]
pub struct AnchorResolver {
    max_fuzzy_candidates: usize,
}

impl Default for AnchorResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorResolver {
    pub fn new() -> Self {
        AnchorResolver {
            max_fuzzy_candidates: MAX_FUZZY_CANDIDATES,
        }
    }

    /// Best live match for the anchor, or `None` when the text is gone.
    pub fn resolve(&self, doc: &Document, anchor: &Anchor) -> Option<ResolvedMatch> {
        self.resolve_inner(doc, anchor, &mut 0)
    }

    /// `resolve` plus timing and scan statistics.
    pub fn resolve_with_report(&self, doc: &Document, anchor: &Anchor) -> ResolveReport {
        let started = Instant::now();
        let mut fuzzy_candidates = 0usize;
        let matched = self.resolve_inner(doc, anchor, &mut fuzzy_candidates);
        ResolveReport {
            matched,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            fuzzy_candidates,
        }
    }

    /// Resolve and apply the acceptance threshold, constructing a live range
    /// for valid matches.
    pub fn validate(&self, doc: &Document, anchor: &Anchor) -> AnchorValidation {
        let Some(matched) = self.resolve(doc, anchor) else {
            return AnchorValidation {
                valid: false,
                confidence: 0.0,
                element: None,
                range: None,
            };
        };
        AnchorValidation {
            valid: matched.confidence > ACCEPT_THRESHOLD,
            confidence: matched.confidence,
            element: Some(matched.element),
            range: match_range(doc, &matched),
        }
    }

    fn resolve_inner(
        &self,
        doc: &Document,
        anchor: &Anchor,
        fuzzy_candidates: &mut usize,
    ) -> Option<ResolvedMatch> {
        if anchor.selected_text.is_empty() {
            return None;
        }
        if let Some(element) = resolve_selector(doc, &anchor.selector) {
            if let Some(found) = find_in_element(doc, element, anchor) {
                return Some(found);
            }
        }
        self.fuzzy_scan(doc, anchor, fuzzy_candidates)
    }

    /// Layer 4: scan every non-blank text node in the document (outside the
    /// engine's own chrome), score each literal occurrence of the selected
    /// text by context similarity, keep the best. First-in-document-order
    /// wins ties.
    fn fuzzy_scan(
        &self,
        doc: &Document,
        anchor: &Anchor,
        scored: &mut usize,
    ) -> Option<ResolvedMatch> {
        let pattern = format!(
            "{}{}{}",
            anchor.context_before, anchor.selected_text, anchor.context_after
        );
        let automaton = AhoCorasick::new([anchor.selected_text.as_str()]).ok()?;
        let before_len = char_len(&anchor.context_before);
        let after_len = char_len(&anchor.context_after);
        let selected_len = char_len(&anchor.selected_text);

        let mut best: Option<ResolvedMatch> = None;
        let mut best_score = 0.0f64;

        'nodes: for node in doc.visible_text_nodes(doc.root()) {
            if !outside_engine_ui(doc, node) {
                continue;
            }
            let text = doc.text(node).unwrap_or("");
            for hit in automaton.find_iter(text) {
                if *scored >= self.max_fuzzy_candidates {
                    break 'nodes;
                }
                *scored += 1;

                let start = char_offset_at(text, hit.start());
                let end = start + selected_len;
                let found = format!(
                    "{}{}{}",
                    window_before(text, start, before_len.min(CONTEXT_CHARS)),
                    &anchor.selected_text,
                    window_after(text, end, after_len.min(CONTEXT_CHARS)),
                );
                let score = similarity(&pattern, &found);
                if score > best_score {
                    best_score = score;
                    best = Some(ResolvedMatch {
                        element: doc.containing_element(node),
                        text_node: Some(node),
                        start_offset: start,
                        end_offset: end,
                        confidence: score,
                        strategy: MatchStrategy::FuzzyScan,
                    });
                }
            }
        }
        best
    }
}

// =============================================================================
// Per-element layers
// =============================================================================

/// Re-query the stored selector. A duplicated id makes the path ambiguous
/// and is treated as a miss (the document-wide layer takes over).
fn resolve_selector(doc: &Document, selector: &str) -> Option<NodeId> {
    let path = SelectorPath::parse(selector).ok()?;
    if let Some(id) = path.leading_id() {
        if !doc.id_is_unique(id) {
            return None;
        }
    }
    path.query(doc)
}

fn find_in_element(doc: &Document, element: NodeId, anchor: &Anchor) -> Option<ResolvedMatch> {
    let full_text = doc.text_content(element);
    let selected_len = char_len(&anchor.selected_text);

    // Layer 1: the stored offsets still hold the exact text.
    if char_slice(&full_text, anchor.start_offset, anchor.end_offset) == anchor.selected_text {
        return Some(ResolvedMatch {
            element,
            text_node: None,
            start_offset: anchor.start_offset,
            end_offset: anchor.end_offset,
            confidence: 1.0,
            strategy: MatchStrategy::ExactOffsets,
        });
    }

    // Layer 2: the literal context+text+context pattern moved within the
    // element; recompute offsets relative to where it landed.
    let pattern = format!(
        "{}{}{}",
        anchor.context_before, anchor.selected_text, anchor.context_after
    );
    if let Some(idx) = crate::text::char_index_of(&full_text, &pattern) {
        let start = idx + char_len(&anchor.context_before);
        return Some(ResolvedMatch {
            element,
            text_node: None,
            start_offset: start,
            end_offset: start + selected_len,
            confidence: 0.9,
            strategy: MatchStrategy::ContextSearch,
        });
    }

    // Layer 3: the text occurs but its surroundings drifted; accept when the
    // surroundings still look similar enough. Windows are clamped to the
    // stored context lengths so short captured contexts are compared
    // like-for-like instead of against a 20-char slab of new text.
    let idx = crate::text::char_index_of(&full_text, &anchor.selected_text)?;
    let found_before = window_before(&full_text, idx, char_len(&anchor.context_before));
    let found_after = window_after(
        &full_text,
        idx + selected_len,
        char_len(&anchor.context_after),
    );
    let stored = format!("{}{}", anchor.context_before, anchor.context_after);
    let found = format!("{}{}", found_before, found_after);
    let score = similarity(&stored, &found);
    if score > MIN_CONTEXT_SIMILARITY {
        return Some(ResolvedMatch {
            element,
            text_node: None,
            start_offset: idx,
            end_offset: idx + selected_len,
            confidence: score,
            strategy: MatchStrategy::TextSearch,
        });
    }
    None
}

/// True when the node is not inside the engine's own UI subtree.
fn outside_engine_ui(doc: &Document, node: NodeId) -> bool {
    !doc.has_ancestor_or_self(node, |d, n| d.has_attr(n, UI_MARKER_ATTR))
}

/// Construct a live range for a match (node-pinned or element-relative).
pub fn match_range(doc: &Document, matched: &ResolvedMatch) -> Option<DomRange> {
    match matched.text_node {
        Some(node) => Some(DomRange::new(
            BoundaryPoint {
                node,
                offset: matched.start_offset,
            },
            BoundaryPoint {
                node,
                offset: matched.end_offset,
            },
        )),
        None => range_from_element_offsets(
            doc,
            matched.element,
            matched.start_offset,
            matched.end_offset,
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::range::range_text;

    fn page(text: &str) -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let article = doc.create_element_with_id("div", "article");
        let p = doc.create_element("p");
        let t = doc.create_text(text);
        doc.append_child(body, article);
        doc.append_child(article, p);
        doc.append_child(p, t);
        (doc, p, t)
    }

    fn quick_anchor() -> Anchor {
        Anchor {
            page_url: "https://x.test".to_string(),
            selector: "#article > p".to_string(),
            selected_text: "quick".to_string(),
            start_offset: 4,
            end_offset: 9,
            context_before: "The ".to_string(),
            context_after: " brown".to_string(),
            captured_at: 0,
        }
    }

    #[test]
    fn test_unmodified_page_resolves_exactly() {
        let (doc, p, _) = page("The quick brown fox");
        let resolver = AnchorResolver::new();
        let m = resolver.resolve(&doc, &quick_anchor()).unwrap();
        assert_eq!(m.element, p);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.strategy, MatchStrategy::ExactOffsets);
        assert_eq!((m.start_offset, m.end_offset), (4, 9));

        // Idempotent: resolving again yields the same result.
        assert_eq!(resolver.resolve(&doc, &quick_anchor()).unwrap(), m);
    }

    #[test]
    fn test_context_search_after_prefix_insertion() {
        // Text shifted but the full context pattern survives intact.
        let (doc, _, _) = page("NEW: The quick brown fox");
        let m = AnchorResolver::new().resolve(&doc, &quick_anchor()).unwrap();
        assert_eq!(m.strategy, MatchStrategy::ContextSearch);
        assert_eq!(m.confidence, 0.9);
        assert_eq!((m.start_offset, m.end_offset), (9, 14));
    }

    #[test]
    fn test_drift_tolerance_scenario() {
        // Leading context changed: exact offsets fail, the context pattern
        // fails, bare text search scores the drifted surroundings.
        let (doc, _, _) = page("Well, the quick brown fox jumps");
        let resolver = AnchorResolver::new();
        let m = resolver.resolve(&doc, &quick_anchor()).unwrap();
        assert_eq!(m.strategy, MatchStrategy::TextSearch);
        assert!(m.confidence > 0.5 && m.confidence < 1.0, "{}", m.confidence);
        // "The  brown" vs "the  brown": one substitution over ten chars.
        assert!((m.confidence - 0.9).abs() < 1e-9);

        let v = resolver.validate(&doc, &quick_anchor());
        assert!(v.valid);
        assert_eq!(range_text(&doc, &v.range.unwrap()), "quick");
    }

    #[test]
    fn test_selector_miss_falls_through_to_fuzzy() {
        // Anchored under #article, but the page was rebuilt without it.
        let mut doc = Document::new();
        let body = doc.body();
        let section = doc.create_element("section");
        let t = doc.create_text("intro... The quick brown fox ...outro");
        doc.append_child(body, section);
        doc.append_child(section, t);

        let report = AnchorResolver::new().resolve_with_report(&doc, &quick_anchor());
        let m = report.matched.unwrap();
        assert_eq!(m.strategy, MatchStrategy::FuzzyScan);
        assert_eq!(m.text_node, Some(t));
        assert!(m.confidence > ACCEPT_THRESHOLD);
        assert!(report.fuzzy_candidates >= 1);
        assert_eq!(
            range_text(&doc, &match_range(&doc, &m).unwrap()),
            "quick"
        );
    }

    #[test]
    fn test_fuzzy_picks_best_context_among_occurrences() {
        let mut doc = Document::new();
        let body = doc.body();
        let t1 = doc.create_text("a quick note about nothing");
        let t2 = doc.create_text("The quick brown fox again");
        let p1 = doc.create_element("p");
        doc.append_child(body, p1);
        doc.append_child(p1, t1);
        let p2 = doc.create_element("p");
        doc.append_child(body, p2);
        doc.append_child(p2, t2);

        let m = AnchorResolver::new().resolve(&doc, &quick_anchor()).unwrap();
        assert_eq!(m.text_node, Some(t2));
    }

    #[test]
    fn test_no_match_returns_none_and_invalid() {
        let (doc, _, _) = page("Entirely unrelated content here");
        let resolver = AnchorResolver::new();
        assert!(resolver.resolve(&doc, &quick_anchor()).is_none());
        let v = resolver.validate(&doc, &quick_anchor());
        assert!(!v.valid);
        assert_eq!(v.confidence, 0.0);
        assert!(v.range.is_none());
    }

    #[test]
    fn test_low_confidence_is_invalid_not_error() {
        // The word survives once but in an unrecognizable context and under
        // a different selector: fuzzy finds it, validation rejects it.
        let mut doc = Document::new();
        let body = doc.body();
        let t = doc.create_text("zzzzzzzzzzzzzzzz quick yyyyyyyyyyyyyyyy");
        let pre = doc.create_element("pre");
        doc.append_child(body, pre);
        doc.append_child(pre, t);

        let resolver = AnchorResolver::new();
        let m = resolver.resolve(&doc, &quick_anchor()).unwrap();
        assert_eq!(m.strategy, MatchStrategy::FuzzyScan);
        let v = resolver.validate(&doc, &quick_anchor());
        assert_eq!(v.valid, v.confidence > ACCEPT_THRESHOLD);
        assert!(!v.valid, "confidence {}", v.confidence);
    }

    #[test]
    fn test_duplicate_id_treated_as_selector_miss() {
        let (mut doc, _, _) = page("The quick brown fox");
        // A second #article appears (id reuse): the path is ambiguous.
        let body = doc.body();
        let dup = doc.create_element_with_id("div", "article");
        doc.append_child(body, dup);

        let m = AnchorResolver::new().resolve(&doc, &quick_anchor()).unwrap();
        assert_eq!(m.strategy, MatchStrategy::FuzzyScan);
    }

    #[test]
    fn test_engine_ui_subtree_excluded() {
        // Only copy of the text lives inside the engine's own chrome.
        let mut doc = Document::new();
        let body = doc.body();
        let panel = doc.create_element("div");
        doc.set_attr(panel, UI_MARKER_ATTR, "panel");
        let inner = doc.create_element("span");
        let t = doc.create_text("The quick brown fox");
        doc.append_child(body, panel);
        doc.append_child(panel, inner);
        doc.append_child(inner, t);

        assert!(AnchorResolver::new().resolve(&doc, &quick_anchor()).is_none());
    }

    #[test]
    fn test_missing_context_degrades_to_bare_search() {
        let (doc, _, _) = page("moved... The quick brown fox");
        let mut anchor = quick_anchor();
        anchor.context_before = String::new();
        anchor.context_after = String::new();
        // Offsets are stale; with no context the pattern layer degenerates
        // to a bare text search and still lands on the text.
        let m = AnchorResolver::new().resolve(&doc, &anchor).unwrap();
        assert_eq!(m.strategy, MatchStrategy::ContextSearch);
        assert_eq!(m.confidence, 0.9);
        assert_eq!((m.start_offset, m.end_offset), (13, 18));
    }

    #[test]
    fn test_scan_skips_blank_text_runs() {
        // Formatting whitespace between elements never carries the text.
        let mut doc = Document::new();
        let body = doc.body();
        let gap1 = doc.create_text("\n    ");
        let p = doc.create_element("p");
        let t = doc.create_text("The quick brown fox");
        let gap2 = doc.create_text("\n  ");
        doc.append_child(body, gap1);
        doc.append_child(body, p);
        doc.append_child(p, t);
        doc.append_child(body, gap2);

        let report = AnchorResolver::new().resolve_with_report(&doc, &quick_anchor());
        let m = report.matched.unwrap();
        assert_eq!(m.text_node, Some(t));
        assert_eq!(report.fuzzy_candidates, 1);
    }

    #[test]
    fn test_candidate_cap_bounds_scan() {
        let mut doc = Document::new();
        let body = doc.body();
        // 200 occurrences across many nodes; the scan must stop at the cap.
        for _ in 0..200 {
            let p = doc.create_element("p");
            let t = doc.create_text("quick");
            doc.append_child(body, p);
            doc.append_child(p, t);
        }
        let report = AnchorResolver::new().resolve_with_report(&doc, &quick_anchor());
        assert!(report.matched.is_some());
        assert_eq!(report.fuzzy_candidates, MAX_FUZZY_CANDIDATES);
    }

    #[test]
    fn test_empty_selected_text_never_matches() {
        let (doc, _, _) = page("The quick brown fox");
        let mut anchor = quick_anchor();
        anchor.selected_text = String::new();
        anchor.end_offset = anchor.start_offset;
        assert!(AnchorResolver::new().resolve(&doc, &anchor).is_none());
    }
}
