// ============================================================================
// SELECTION MODULE: outlines, masks, floating transforms and the clipboard
// ============================================================================
//
//   path.rs       SelectionPath, Rect, even-odd mask rasterization
//   transform.rs  Affine2, TransformState, bilinear render-through
//   engine.rs     SelectionEngine state machine (create / lift / commit)
//   clipboard.rs  copy / cut / paste, delete, bucket fill
// ============================================================================

pub mod clipboard;
pub mod engine;
pub mod path;
pub mod transform;

pub use clipboard::{bucket_fill, delete_selection, Clipboard};
pub use engine::{CreateShape, FloatingItem, Handle, SelectionEngine, SelectionState};
pub use path::{mask_bounds, Rect, SelectionPath};
pub use transform::{render_through, Affine2, TransformState};
