//! WASM boundary: the `AnchorEngine` facade the JS host drives.
//!
//! The host owns the live page; the engine owns an arena mirror of it. Calls
//! come in with plain data (node ids, offsets, JSON-ish values via
//! `serde-wasm-bindgen`), structural mutations are read back out of
//! `documentJson` and mirrored onto the real DOM by the host.

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::anchor::{build_anchor, Anchor};
use crate::comment::{format_relative_time, sort_comments, Comment};
use crate::dom::{BoundaryPoint, Document, NodeId};
use crate::dom::range::DomRange;
use crate::highlight::HighlightRegistry;
use crate::resolve::AnchorResolver;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct AnchorEngine {
    doc: Document,
    registry: HighlightRegistry,
    resolver: AnchorResolver,
    page_url: String,
}

#[wasm_bindgen]
impl AnchorEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(page_url: &str) -> Self {
        AnchorEngine {
            doc: Document::new(),
            registry: HighlightRegistry::new(),
            resolver: AnchorResolver::new(),
            page_url: page_url.to_string(),
        }
    }

    // ========================================================================
    // Document snapshot
    // ========================================================================

    /// Replace the arena with a snapshot of the page tree. Drops all overlay
    /// tracking; the host re-applies highlights afterwards.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, snapshot: JsValue) -> Result<(), JsValue> {
        self.doc = serde_wasm_bindgen::from_value(snapshot).map_err(js_err)?;
        self.registry = HighlightRegistry::new();
        crate::log(&format!("[margincore] document loaded for {}", self.page_url));
        Ok(())
    }

    /// Current arena state, including overlay spans, for mirroring back.
    #[wasm_bindgen(js_name = documentJson)]
    pub fn document_json(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.doc).map_err(js_err)
    }

    // ========================================================================
    // Anchors
    // ========================================================================

    /// Capture a selection (boundary node ids + node-relative char offsets)
    /// into a durable anchor.
    #[wasm_bindgen(js_name = createAnchor)]
    pub fn create_anchor(
        &self,
        start_node: u32,
        start_offset: usize,
        end_node: u32,
        end_offset: usize,
        selected_text: &str,
    ) -> Result<JsValue, JsValue> {
        let range = DomRange::new(
            BoundaryPoint {
                node: NodeId(start_node),
                offset: start_offset,
            },
            BoundaryPoint {
                node: NodeId(end_node),
                offset: end_offset,
            },
        );
        let captured_at = js_sys::Date::now() as i64;
        let anchor = build_anchor(&self.doc, &range, selected_text, &self.page_url, captured_at)
            .map_err(js_err)?;
        serde_wasm_bindgen::to_value(&anchor).map_err(js_err)
    }

    /// Re-locate an anchor; returns `{ matched, elapsedMs, fuzzyCandidates }`.
    #[wasm_bindgen(js_name = resolveAnchor)]
    pub fn resolve_anchor(&self, anchor: JsValue) -> Result<JsValue, JsValue> {
        let anchor: Anchor = serde_wasm_bindgen::from_value(anchor).map_err(js_err)?;
        let report = self.resolver.resolve_with_report(&self.doc, &anchor);
        serde_wasm_bindgen::to_value(&report).map_err(js_err)
    }

    /// Resolve plus the acceptance verdict: `{ valid, confidence, element }`.
    #[wasm_bindgen(js_name = validateAnchor)]
    pub fn validate_anchor(&self, anchor: JsValue) -> Result<JsValue, JsValue> {
        let anchor: Anchor = serde_wasm_bindgen::from_value(anchor).map_err(js_err)?;
        let verdict = self.resolver.validate(&self.doc, &anchor);
        serde_wasm_bindgen::to_value(&verdict).map_err(js_err)
    }

    /// Stable storage id for an anchor.
    #[wasm_bindgen(js_name = anchorId)]
    pub fn anchor_id(&self, anchor: JsValue) -> Result<String, JsValue> {
        let anchor: Anchor = serde_wasm_bindgen::from_value(anchor).map_err(js_err)?;
        Ok(anchor.anchor_id())
    }

    // ========================================================================
    // Highlights
    // ========================================================================

    /// Synchronous decision for the deferred-visibility flow: what
    /// `applyHighlight` would do, without touching the tree. Call this,
    /// await the visibility preference, then apply.
    #[wasm_bindgen(js_name = precheckApply)]
    pub fn precheck_apply(&self, anchor: JsValue, comment_id: &str) -> Result<JsValue, JsValue> {
        let anchor: Anchor = serde_wasm_bindgen::from_value(anchor).map_err(js_err)?;
        let outcome = self.registry.precheck(&self.doc, &anchor, comment_id);
        serde_wasm_bindgen::to_value(&outcome).map_err(js_err)
    }

    /// Wrap (or join) the overlay for this anchor; returns an `ApplyOutcome`
    /// string ("created", "merged", ...).
    #[wasm_bindgen(js_name = applyHighlight)]
    pub fn apply_highlight(&mut self, anchor: JsValue, comment_id: &str) -> Result<JsValue, JsValue> {
        let anchor: Anchor = serde_wasm_bindgen::from_value(anchor).map_err(js_err)?;
        let outcome = self.registry.apply(&mut self.doc, &anchor, comment_id);
        serde_wasm_bindgen::to_value(&outcome).map_err(js_err)
    }

    /// Detach a comment; unwraps the overlay when it was the last one.
    #[wasm_bindgen(js_name = removeHighlight)]
    pub fn remove_highlight(&mut self, comment_id: &str) -> bool {
        self.registry.remove(&mut self.doc, comment_id)
    }

    /// Overlay node id to scroll to for a comment, if it has one.
    #[wasm_bindgen(js_name = scrollTarget)]
    pub fn scroll_target(&self, comment_id: &str) -> Option<u32> {
        self.registry.scroll_target(comment_id).map(|n| n.0)
    }

    #[wasm_bindgen(js_name = setHighlightVisibility)]
    pub fn set_highlight_visibility(&mut self, visible: bool) {
        self.registry.set_visibility(&mut self.doc, visible);
    }

    /// Tear down and re-apply every highlight from the comment list.
    #[wasm_bindgen(js_name = refreshAll)]
    pub fn refresh_all(&mut self, comments: JsValue) -> Result<(), JsValue> {
        let comments: Vec<Comment> = serde_wasm_bindgen::from_value(comments).map_err(js_err)?;
        self.registry.refresh_all(&mut self.doc, &comments);
        Ok(())
    }

    #[wasm_bindgen(js_name = highlightCount)]
    pub fn highlight_count(&self) -> usize {
        self.registry.overlay_count()
    }
}

// ============================================================================
// Comment helpers for the host UI
// ============================================================================

/// Sort comments for display (upvotes desc, then newest).
#[wasm_bindgen(js_name = sortCommentsForDisplay)]
pub fn sort_comments_for_display(comments: JsValue) -> Result<JsValue, JsValue> {
    let mut comments: Vec<Comment> = serde_wasm_bindgen::from_value(comments).map_err(js_err)?;
    sort_comments(&mut comments);
    serde_wasm_bindgen::to_value(&comments).map_err(js_err)
}

/// "just now" / "5m ago" / "3h ago" / "2d ago" / date.
#[wasm_bindgen(js_name = relativeTime)]
pub fn relative_time(timestamp_ms: f64) -> String {
    format_relative_time(timestamp_ms as i64, js_sys::Date::now() as i64)
}

/// Await a host preference lookup (a Promise resolving to a boolean-ish
/// value) before the caller decides highlight visibility. Rejections read as
/// `false` rather than surfacing an error.
#[wasm_bindgen(js_name = awaitPreference)]
pub async fn await_preference(preference: js_sys::Promise) -> bool {
    match JsFuture::from(preference).await {
        Ok(value) => value.is_truthy(),
        Err(_) => false,
    }
}
