// ============================================================================
// GPU MODULE: optional hardware compositing
// ============================================================================
//
//   context.rs     headless wgpu device and queue
//   shaders.rs     WGSL source
//   texture.rs     LayerTexture (per surface) and the composite target
//   compositor.rs  fixed-function source-over pipeline + readback
//   pool.rs        texture recycling by size
//   renderer.rs    GpuRenderer: surface sync and document composite
// ============================================================================

pub mod compositor;
pub mod context;
pub mod pool;
pub mod renderer;
pub mod shaders;
pub mod texture;

pub use context::GpuContext;
pub use renderer::GpuRenderer;
