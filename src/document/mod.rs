// ============================================================================
// DOCUMENT MODULE: layer tree, node variants and text rasterization
// ============================================================================
//
//   node.rs  NodeId handles, NodeKind variants, TextStyle
//   tree.rs  Document arena: structure edits, walks, opacity inheritance
//   text.rs  TextRenderer (ab_glyph + font-kit) for text layers
// ============================================================================

pub mod node;
pub mod text;
pub mod tree;

pub use node::{LayerType, Node, NodeId, NodeKind, TextStyle};
pub use text::TextRenderer;
pub use tree::{Document, WalkEntry};
