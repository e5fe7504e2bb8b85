// ============================================================================
// GPU CONTEXT: headless wgpu device and queue
// ============================================================================

use std::sync::Arc;

use crate::error::GpuError;

/// Device and queue shared by every GPU resource of one renderer.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Largest 2D texture edge the device accepts.
    pub max_texture_dim: u32,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter_name)
            .field("max_texture_dim", &self.max_texture_dim)
            .finish()
    }
}

impl GpuContext {
    /// Open a device.  A hardware adapter is tried first, then the
    /// software rasterizer.  `preferred_gpu` is a power hint
    /// ("low power", "high performance", or anything else for the default).
    pub fn new(preferred_gpu: &str) -> Result<Self, GpuError> {
        match pollster::block_on(Self::new_async(preferred_gpu, false)) {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                log::warn!("[GPU] hardware adapter unavailable ({}), trying software fallback", e);
                pollster::block_on(Self::new_async(preferred_gpu, true))
            }
        }
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power = match preferred_gpu.to_lowercase().as_str() {
            "low power" | "integrated" => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None,
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Strata GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await?;

        log::info!(
            "[GPU] using '{}' (max texture {}px{})",
            adapter_name,
            limits.max_texture_dimension_2d,
            if force_fallback { ", software" } else { "" }
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    pub fn check_size(&self, width: u32, height: u32) -> Result<(), GpuError> {
        if self.supports_size(width, height) {
            Ok(())
        } else {
            Err(GpuError::TooLarge { width, height, limit: self.max_texture_dim })
        }
    }

    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
