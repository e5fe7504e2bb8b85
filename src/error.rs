// ============================================================================
// ERRORS: typed failure taxonomy for the editor core
// ============================================================================
//
// Every core operation contains its failures at its own boundary:
//   StructuralViolation  invalid tree edit, logged and dropped
//   SurfaceError         pixel store / GPU resource failure, layer skipped
//   PersistenceError     archive or manifest problem, live document untouched
//   BrushError           brush asset could not be read, brush skipped
//   GpuError             adapter or readback failure, CPU path used instead
//
// Empty operations (commit with nothing floating, undo on an empty stack) are
// not errors and have no variant here.

use crate::document::NodeId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("node {0} is a leaf and cannot have children")]
    LeafParent(NodeId),
    #[error("node handle {0} is stale or unknown")]
    StaleHandle(NodeId),
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the document root cannot be attached, moved or deleted")]
    RootImmovable,
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface {0} has been disposed")]
    Disposed(u64),
    #[error("surface {0} was already disposed")]
    AlreadyDisposed(u64),
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("node has no pixel storage")]
    NoPixels,
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive encoding error: {0}")]
    Archive(#[from] bincode::Error),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("archive is missing entry '{0}'")]
    MissingEntry(String),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(thiserror::Error, Debug)]
pub enum BrushError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("brush config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("brush texture error: {0}")]
    Texture(#[from] image::ImageError),
    #[error("invalid brush: {0}")]
    Invalid(String),
}

#[derive(thiserror::Error, Debug)]
pub enum GpuError {
    #[error("no GPU adapter available")]
    NoAdapter,
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("texture {width}x{height} exceeds the device limit {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
    #[error("readback failed: {0}")]
    Readback(String),
}
