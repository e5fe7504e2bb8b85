// ============================================================================
// PROJECT MODULE: files in and out of a Document
// ============================================================================
//
//   persistence.rs  .strata archive save / load
//   import.rs       adopt a decoded foreign layered image
//   inbox.rs        background-generated images appended as layers
// ============================================================================

pub mod import;
pub mod inbox;
pub mod persistence;

pub use import::{adopt, ImportedImage, ImportedLayer};
pub use inbox::ImageInbox;
pub use persistence::{load, save, PROJECT_EXTENSION};
