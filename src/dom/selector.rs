//! Structural selector paths.
//!
//! The grammar is exactly what anchors persist: ` > `-joined segments, each
//! either `#id` (which short-circuits the path — ids are assumed unique) or
//! `tag` with an optional `:nth-of-type(n)` disambiguator:
//!
//! ```text
//! html > body > div:nth-of-type(2) > p
//! #article > p:nth-of-type(3)
//! ```
//!
//! Building walks from the element to the document root; querying matches
//! the first element in document order whose ancestor chain satisfies the
//! path with strict child combinators.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::{Document, NodeId};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// `#id` — anchors the path at the id'd element.
    Id(String),
    /// `tag` or `tag:nth-of-type(n)`.
    Tag { name: String, nth: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorPath {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    Empty,
    BadSegment(String),
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::Empty => write!(f, "selector is empty"),
            SelectorError::BadSegment(s) => write!(f, "invalid selector segment: {:?}", s),
        }
    }
}

impl std::error::Error for SelectorError {}

// =============================================================================
// Building
// =============================================================================

/// Build the selector path string for an element, walking to the root.
/// An ancestor with an id terminates the walk (`#id` prefix).
pub fn element_path(doc: &Document, element: NodeId) -> String {
    let mut path: Vec<String> = Vec::new();
    let mut current = Some(element);

    while let Some(node) = current {
        if !doc.is_element(node) {
            break;
        }
        if let Some(id) = doc.element_id(node) {
            path.insert(0, format!("#{}", id));
            break;
        }
        let tag = doc.tag(node).unwrap_or("").to_string();
        let nth = doc.nth_of_type(node);
        if nth > 1 {
            path.insert(0, format!("{}:nth-of-type({})", tag, nth));
        } else {
            path.insert(0, tag);
        }
        current = doc.parent(node);
    }

    path.join(" > ")
}

// =============================================================================
// Parsing & Querying
// =============================================================================

impl SelectorPath {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(SelectorError::Empty);
        }
        // Compiled per parse; selectors are short and resolution is bounded
        // by page size, not selector count.
        let tag_re = Regex::new(r"^([a-zA-Z][a-zA-Z0-9\-]*)(?::nth-of-type\((\d+)\))?$")
            .expect("static regex");
        let id_re = Regex::new(r"^#([A-Za-z][\w\-:.]*)$").expect("static regex");

        let mut segments = Vec::new();
        for raw in selector.split(" > ") {
            let raw = raw.trim();
            if let Some(caps) = id_re.captures(raw) {
                segments.push(Segment::Id(caps[1].to_string()));
            } else if let Some(caps) = tag_re.captures(raw) {
                let nth = caps.get(2).map(|m| m.as_str().parse::<usize>().unwrap());
                segments.push(Segment::Tag {
                    name: caps[1].to_ascii_lowercase(),
                    nth,
                });
            } else {
                return Err(SelectorError::BadSegment(raw.to_string()));
            }
        }
        Ok(SelectorPath { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The id this path is anchored at, when it starts with `#id`.
    pub fn leading_id(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Id(id)) => Some(id),
            _ => None,
        }
    }

    /// First element in document order matching the full path.
    pub fn query(&self, doc: &Document) -> Option<NodeId> {
        if self.segments.is_empty() {
            return None;
        }
        doc.all_elements()
            .into_iter()
            .find(|&el| self.matches_chain(doc, el))
    }

    /// `element` must match the last segment, its parent the one before,
    /// and so on (strict child combinators).
    fn matches_chain(&self, doc: &Document, element: NodeId) -> bool {
        let mut current = Some(element);
        for segment in self.segments.iter().rev() {
            let Some(node) = current else { return false };
            if !doc.is_element(node) || !segment_matches(doc, node, segment) {
                return false;
            }
            current = doc.parent(node);
        }
        true
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Id(id) => format!("#{}", id),
                Segment::Tag { name, nth: Some(n) } => format!("{}:nth-of-type({})", name, n),
                Segment::Tag { name, nth: None } => name.clone(),
            })
            .collect();
        write!(f, "{}", parts.join(" > "))
    }
}

fn segment_matches(doc: &Document, node: NodeId, segment: &Segment) -> bool {
    match segment {
        Segment::Id(id) => doc.element_id(node) == Some(id.as_str()),
        Segment::Tag { name, nth } => {
            doc.tag(node) == Some(name.as_str())
                && nth.map(|n| doc.nth_of_type(node) == n).unwrap_or(true)
        }
    }
}

/// Parse-and-query convenience used by the resolver.
pub fn query_selector(doc: &Document, selector: &str) -> Option<NodeId> {
    SelectorPath::parse(selector).ok()?.query(doc)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> (Document, NodeId, NodeId, NodeId) {
        // <body><div><p>one</p><p>two</p></div><div id="aside"><span>x</span></div></body>
        let mut doc = Document::new();
        let body = doc.body();
        let div1 = doc.create_element("div");
        let p1 = doc.create_element("p");
        let p2 = doc.create_element("p");
        let t1 = doc.create_text("one");
        let t2 = doc.create_text("two");
        let aside = doc.create_element_with_id("div", "aside");
        let span = doc.create_element("span");
        let tx = doc.create_text("x");
        doc.append_child(body, div1);
        doc.append_child(div1, p1);
        doc.append_child(p1, t1);
        doc.append_child(div1, p2);
        doc.append_child(p2, t2);
        doc.append_child(body, aside);
        doc.append_child(aside, span);
        doc.append_child(span, tx);
        (doc, p1, p2, span)
    }

    #[test]
    fn test_path_walks_to_root() {
        let (doc, p1, p2, _) = layout();
        assert_eq!(element_path(&doc, p1), "html > body > div > p");
        assert_eq!(element_path(&doc, p2), "html > body > div > p:nth-of-type(2)");
    }

    #[test]
    fn test_path_short_circuits_at_id() {
        let (doc, _, _, span) = layout();
        assert_eq!(element_path(&doc, span), "#aside > span");
    }

    #[test]
    fn test_roundtrip_build_query() {
        let (doc, p1, p2, span) = layout();
        for el in [p1, p2, span] {
            let path = element_path(&doc, el);
            assert_eq!(query_selector(&doc, &path), Some(el), "path {:?}", path);
        }
    }

    #[test]
    fn test_query_first_in_document_order_without_nth() {
        let (doc, p1, _, _) = layout();
        // Bare "p" has no positional constraint: first p in document order.
        assert_eq!(query_selector(&doc, "html > body > div > p"), Some(p1));
    }

    #[test]
    fn test_query_miss() {
        let (doc, _, _, _) = layout();
        assert_eq!(query_selector(&doc, "html > body > article"), None);
        assert_eq!(query_selector(&doc, "#nonexistent > span"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(SelectorPath::parse(""), Err(SelectorError::Empty)));
        assert!(matches!(
            SelectorPath::parse("div > @bad"),
            Err(SelectorError::BadSegment(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        let path = SelectorPath::parse("#aside > span:nth-of-type(2)").unwrap();
        assert_eq!(path.to_string(), "#aside > span:nth-of-type(2)");
        assert_eq!(path.leading_id(), Some("aside"));
    }
}
