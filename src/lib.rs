//! MarginCore: Text Anchoring + Highlight Engine
//!
//! A Rust/WASM core for anchoring comments to text selections on web pages
//! and re-locating them after the page changes.
//!
//! # Architecture
//!
//! ## Document Model
//! - `dom/node.rs` - Arena page tree fed in by the JS host
//! - `dom/selector.rs` - Structural selector paths (`#id > p:nth-of-type(2)`)
//! - `dom/range.rs` - Text ranges, element-offset mapping
//!
//! ## Anchoring
//! - `anchor/types.rs` - `Anchor`, `HighlightKey`, stable anchor ids
//! - `anchor/builder.rs` - Selector Builder: selection -> durable `Anchor`
//! - `resolve/resolver.rs` - Layered anchor resolution (exact offsets ->
//!   context pattern -> scored text search -> document-wide fuzzy scan)
//! - `resolve/similarity.rs` - Normalized Levenshtein similarity
//!
//! ## Highlights & Comments
//! - `highlight/render.rs` - Overlay wrap/unwrap on the arena tree
//! - `highlight/registry.rs` - One overlay per key, shared across comments
//! - `comment.rs` - Comment model, votes/reactions, display ordering
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { AnchorEngine, awaitPreference } from 'margincore';
//!
//! await init();
//!
//! const engine = new AnchorEngine(location.href);
//! engine.loadDocument(snapshotPageTree());
//!
//! // Capture a selection into a durable anchor.
//! const anchor = engine.createAnchor(startNode, 4, endNode, 9, 'quick');
//!
//! // Later, on another visit: re-locate and highlight.
//! const { valid, confidence } = engine.validateAnchor(anchor);
//! if (valid) {
//!   const visible = await awaitPreference(prefs.get('showHighlights'));
//!   engine.setHighlightVisibility(visible);
//!   engine.applyHighlight(anchor, commentId);   // "created" | "merged" | ...
//!   mirrorDocument(engine.documentJson());
//! }
//! ```

pub mod anchor;
pub mod comment;
pub mod dom;
pub mod highlight;
pub mod resolve;
pub mod text;
pub mod wasm;

pub use anchor::{build_anchor, Anchor, BuildError, HighlightKey};
pub use comment::{sort_comments, Comment, CommentStore, IdentityProvider, PreferenceStore};
pub use dom::{Document, NodeId};
pub use highlight::{ApplyOutcome, HighlightRegistry};
pub use resolve::{AnchorResolver, AnchorValidation, MatchStrategy, ResolvedMatch};

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("margincore v{}", env!("CARGO_PKG_VERSION"))
}

/// Log to the browser console on wasm, stderr elsewhere.
pub(crate) fn log(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{}", message);
}
