// ============================================================================
// BRUSH MODULE: descriptors, tips, the preset library, stroke stamping and smudge
// ============================================================================

pub mod descriptor;
pub mod library;
pub mod smudge;
pub mod stroke;
pub mod tip;

pub use descriptor::{Brush, BrushBlendMode, BrushDescriptor};
pub use library::BrushLibrary;
pub use smudge::{smudge_patch, SmudgeSession, DEFAULT_SMUDGE_STRENGTH};
pub use stroke::{stamp_points, stroke_segment, StrokeSession};
pub use tip::{StampTip, TipShape, TIP_SIZE};
