//! In-memory page document model.
//!
//! - `node.rs` - Arena tree: elements, text runs, structural editing
//! - `selector.rs` - Structural selector paths (build + query)
//! - `range.rs` - Text ranges and element-offset mapping

pub mod node;
pub mod range;
pub mod selector;

pub use node::{Document, Node, NodeData, NodeId};
pub use range::{BoundaryPoint, DomRange};
pub use selector::{element_path, query_selector, SelectorError, SelectorPath};
