// ============================================================================
// STRATA: layered raster image editor core
// ============================================================================
//
//   document/   node tree, text layers
//   surface     premultiplied pixel store with lazy GPU binding
//   compositor  draw plan + CPU source-over
//   gpu/        wgpu compositor and texture pool
//   brush/      brush assets and the stroke engine
//   selection/  selection state machine, transforms, clipboard
//   history     bounded undo / redo
//   ops         new document, canvas resize, adjustments
//   project/    .strata files, import, background image inbox
//   editor      facade that routes input into all of the above
// ============================================================================

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod blend;
pub mod brush;
pub mod compositor;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod events;
pub mod gpu;
pub mod history;
pub mod logger;
pub mod ops;
pub mod project;
pub mod selection;
pub mod surface;

pub use config::EditorConfig;
pub use document::{Document, LayerType, NodeId};
pub use editor::{Editor, Key, Modifiers, Tool};
pub use history::UndoStack;
