//! Anchors: durable descriptors of text selections.
//!
//! - `types.rs` - `Anchor`, `HighlightKey`, stable anchor ids
//! - `builder.rs` - Selector Builder (selection -> `Anchor`)

pub mod builder;
pub mod types;

pub use builder::{build_anchor, BuildError, MIN_SELECTION_CHARS};
pub use types::{Anchor, HighlightKey, CONTEXT_CHARS};
