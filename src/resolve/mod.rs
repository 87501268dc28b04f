//! Anchor resolution.
//!
//! - `similarity.rs` - Normalized Levenshtein similarity
//! - `resolver.rs` - Layered anchor -> live range resolution

pub mod resolver;
pub mod similarity;

pub use resolver::{
    match_range, AnchorResolver, AnchorValidation, MatchStrategy, ResolveReport, ResolvedMatch,
    ACCEPT_THRESHOLD, MAX_FUZZY_CANDIDATES, MIN_CONTEXT_SIMILARITY, UI_MARKER_ATTR,
};
pub use similarity::{levenshtein, similarity};
