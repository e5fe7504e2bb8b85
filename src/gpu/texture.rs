// ============================================================================
// LAYER TEXTURE: GPU copy of one raster surface
// ============================================================================

/// A sampled texture mirroring a surface's premultiplied pixels, plus the
/// bind group the composite pipeline draws it with.
pub struct LayerTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub bind_group: wgpu::BindGroup,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for LayerTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LayerTexture({}x{})", self.width, self.height)
    }
}

impl LayerTexture {
    /// Create the texture and upload `data` (tightly packed RGBA8 rows).
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bind_group_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Self {
        let texture = Self::create_raw(device, width, height);
        Self::from_texture(device, queue, bind_group_layout, sampler, texture, width, height, data)
    }

    /// Allocate a bare layer texture (used by the pool on a miss).
    pub fn create_raw(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("LayerTexture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Wrap an existing (possibly recycled) texture and upload `data`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bind_group_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        texture: wgpu::Texture,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("LayerTexture bind group"),
            layout: bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let layer = Self { texture, view, bind_group, width, height };
        layer.upload_full(queue, data);
        layer
    }

    /// Upload a sub-rectangle.  `data` holds `rect_width * rect_height * 4`
    /// bytes for the region starting at `(x, y)`.
    pub fn update_rect(
        &self,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
        rect_width: u32,
        rect_height: u32,
        data: &[u8],
    ) {
        debug_assert_eq!(data.len(), (rect_width * rect_height * 4) as usize);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * rect_width),
                rows_per_image: Some(rect_height),
            },
            wgpu::Extent3d { width: rect_width, height: rect_height, depth_or_array_layers: 1 },
        );
    }

    pub fn upload_full(&self, queue: &wgpu::Queue, data: &[u8]) {
        self.update_rect(queue, 0, 0, self.width, self.height, data);
    }
}

/// Off-screen colour target the composite is rendered into and read back
/// from.
pub struct TargetTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl TargetTexture {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Composite target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, width, height }
    }
}
