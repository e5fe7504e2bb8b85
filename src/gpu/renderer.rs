// ============================================================================
// GPU RENDERER: syncs layer surfaces to textures and composites them
// ============================================================================

use image::RgbaImage;

use super::compositor::Compositor;
use super::context::GpuContext;
use super::pool::TexturePool;
use super::texture::{LayerTexture, TargetTexture};
use crate::compositor::{self, DrawItem};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::GpuError;
use crate::surface::RasterSurface;

pub struct GpuRenderer {
    pub ctx: GpuContext,
    pub compositor: Compositor,
    pub texture_pool: TexturePool,
    target: Option<TargetTexture>,
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer").field("ctx", &self.ctx).finish()
    }
}

impl GpuRenderer {
    pub fn try_new(preferred_gpu: &str) -> Result<Self, GpuError> {
        let ctx = GpuContext::new(preferred_gpu)?;
        let compositor = Compositor::new(&ctx.device);
        Ok(Self {
            ctx,
            compositor,
            texture_pool: TexturePool::new(),
            target: None,
        })
    }

    /// Renderer per the user's settings; `None` when acceleration is off or
    /// no adapter could be opened (the CPU compositor is used instead).
    pub fn from_config(config: &EditorConfig) -> Option<Self> {
        if !config.gpu_acceleration {
            log::info!("[GPU] acceleration disabled in settings");
            return None;
        }
        match Self::try_new(&config.preferred_gpu) {
            Ok(r) => Some(r),
            Err(e) => {
                log::warn!("[GPU] unavailable, compositing on the CPU: {}", e);
                None
            }
        }
    }

    /// Bring a surface's texture up to date with its pixels.  Textures whose
    /// size no longer matches go back to the pool.
    pub fn sync_surface(&mut self, surface: &mut RasterSurface) -> Result<(), GpuError> {
        if surface.gpu_is_current() {
            return Ok(());
        }
        let (width, height) = surface.dimensions();
        self.ctx.check_size(width, height)?;

        let data = match surface.pixels() {
            Ok(p) => p.as_raw().clone(),
            Err(e) => return Err(GpuError::Readback(e.to_string())),
        };

        if let Some(binding) = surface.take_gpu() {
            let tex = binding.texture;
            if tex.width == width && tex.height == height {
                tex.upload_full(&self.ctx.queue, &data);
                surface.set_gpu(tex);
                return Ok(());
            }
            self.texture_pool.release(tex.texture, tex.width, tex.height);
        }

        let layer = match self.texture_pool.acquire(width, height) {
            Some(recycled) => LayerTexture::from_texture(
                &self.ctx.device,
                &self.ctx.queue,
                &self.compositor.texture_bind_group_layout,
                &self.compositor.sampler_nearest,
                recycled,
                width,
                height,
                &data,
            ),
            None => LayerTexture::new(
                &self.ctx.device,
                &self.ctx.queue,
                &self.compositor.texture_bind_group_layout,
                &self.compositor.sampler_nearest,
                width,
                height,
                &data,
            ),
        };
        surface.set_gpu(layer);
        Ok(())
    }

    /// Hand a surface's texture back to the pool (e.g. before deleting it).
    pub fn release_surface(&mut self, surface: &mut RasterSurface) {
        if let Some(binding) = surface.take_gpu() {
            let tex = binding.texture;
            self.texture_pool.release(tex.texture, tex.width, tex.height);
        }
    }

    /// Flatten the document on the GPU.  Layers that cannot be uploaded are
    /// skipped with a diagnostic, as on the CPU path.
    pub fn composite(&mut self, doc: &mut Document) -> Result<RgbaImage, GpuError> {
        let (width, height) = doc.size();
        self.ctx.check_size(width, height)?;

        let plan = compositor::plan(doc);
        let mut drawable: Vec<DrawItem> = Vec::with_capacity(plan.len());
        for item in plan {
            let Some(surface) = doc.surface_mut(item.node) else { continue };
            match self.sync_surface(surface) {
                Ok(()) => drawable.push(item),
                Err(e) => log::warn!("[GPU] layer {} skipped: {}", item.node, e),
            }
        }

        if self.target.as_ref().is_none_or(|t| t.width != width || t.height != height) {
            self.target = Some(TargetTexture::new(&self.ctx.device, width, height));
        }
        let Some(target) = self.target.as_ref() else {
            return Err(GpuError::Readback("no composite target".to_string()));
        };

        let layers: Vec<(f32, &LayerTexture)> = drawable
            .iter()
            .filter_map(|item| {
                let binding = doc.surface(item.node)?.gpu_binding()?;
                Some((item.opacity, &binding.texture))
            })
            .collect();
        self.compositor.composite_layers(&self.ctx, &target.view, &layers);

        let raw = Compositor::readback_texture(&self.ctx, &target.texture, width, height)?;
        RgbaImage::from_raw(width, height, raw)
            .ok_or_else(|| GpuError::Readback("readback size mismatch".to_string()))
    }
}
