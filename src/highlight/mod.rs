//! Highlight lifecycle.
//!
//! - `render.rs`   - Overlay wrap/unwrap mechanics on the arena document
//! - `registry.rs` - Key -> overlay bookkeeping and comment sharing

pub mod registry;
pub mod render;

pub use registry::{ApplyOutcome, HighlightRegistry};
pub use render::{
    inside_overlay, is_overlay, set_comment_count, set_visible, unwrap, wrap_range, RenderError,
    COMMENT_COUNT_ATTR, HIDDEN_ATTR, HIGHLIGHT_CLASS, KEY_ATTR,
};
