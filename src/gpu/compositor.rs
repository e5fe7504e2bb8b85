// ============================================================================
// GPU COMPOSITOR: fixed-function source-over of layer textures
// ============================================================================
//
// One render pipeline.  Each draw is a full-target quad sampling one layer
// texture; the colour target's BlendState is built from
// `BlendEquation::PREMULTIPLIED_OVER`, the same equation the CPU compositor
// evaluates, so both paths agree to within rounding.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::texture::LayerTexture;
use crate::blend::BlendEquation;
use crate::error::GpuError;

// ============================================================================
// UNIFORM TYPES
// ============================================================================

/// View matrix + per-draw opacity.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ViewUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub opacity: f32,
    pub _pad: [f32; 3],
}

impl ViewUniforms {
    /// Maps the unit quad onto the whole target, y pointing down.
    pub fn identity(opacity: f32) -> Self {
        let view_proj: [[f32; 4]; 4] = [
            [ 2.0,  0.0, 0.0, 0.0],
            [ 0.0, -2.0, 0.0, 0.0],
            [ 0.0,  0.0, 1.0, 0.0],
            [-1.0,  1.0, 0.0, 1.0],
        ];
        Self { view_proj, opacity, _pad: [0.0; 3] }
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

pub struct Compositor {
    pub pipeline: wgpu::RenderPipeline,
    pub view_bind_group_layout: wgpu::BindGroupLayout,
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
    /// Layers are drawn 1:1 onto the target, so texel centres map exactly.
    pub sampler_nearest: wgpu::Sampler,
    pub output_format: wgpu::TextureFormat,
}

impl Compositor {
    pub fn new(device: &wgpu::Device) -> Self {
        let output_format = wgpu::TextureFormat::Rgba8Unorm;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite_shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::COMPOSITE_SHADER.into()),
        });

        let view_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("view_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("layer_tex_bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite_pipeline_layout"),
            bind_group_layouts: &[&view_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("composite_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: Some(BlendEquation::PREMULTIPLIED_OVER.into()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
        });

        let sampler_nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler_nearest"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            view_bind_group_layout,
            texture_bind_group_layout,
            sampler_nearest,
            output_format,
        }
    }

    fn create_view_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &ViewUniforms,
    ) -> (wgpu::BindGroup, wgpu::Buffer) {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("view_uniform_buf"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("view_bg"),
            layout: &self.view_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (bind_group, buffer)
    }

    /// Clear `output_view` to transparent, then draw `layers` in order.
    pub fn composite_layers(
        &self,
        ctx: &GpuContext,
        output_view: &wgpu::TextureView,
        layers: &[(f32, &LayerTexture)],
    ) {
        let device = &ctx.device;
        // Uniform buffers and bind groups must outlive the pass.
        let per_layer: Vec<_> = layers
            .iter()
            .map(|(opacity, _)| self.create_view_bind_group(device, &ViewUniforms::identity(*opacity)))
            .collect();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("composite_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            for ((view_bg, _buf), (_, layer_tex)) in per_layer.iter().zip(layers) {
                pass.set_bind_group(0, view_bg, &[]);
                pass.set_bind_group(1, &layer_tex.bind_group, &[]);
                pass.draw(0..6, 0..1);
            }
        }
        ctx.submit_one(encoder);
    }

    /// Copy `texture` back to the CPU as tightly packed RGBA8 rows.
    pub fn readback_texture(
        ctx: &GpuContext,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, GpuError> {
        let device = &ctx.device;
        let bytes_per_row = Self::aligned_bytes_per_row(width);
        let buffer_size = (bytes_per_row * height) as u64;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        ctx.submit_one(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GpuError::Readback(format!("map failed: {:?}", e))),
            Err(e) => return Err(GpuError::Readback(format!("channel closed: {}", e))),
        }

        let mapped = slice.get_mapped_range();
        let actual_row = (width * 4) as usize;
        let mut result = Vec::with_capacity(actual_row * height as usize);
        for y in 0..height as usize {
            let start = y * bytes_per_row as usize;
            result.extend_from_slice(&mapped[start..start + actual_row]);
        }
        drop(mapped);
        staging.unmap();
        Ok(result)
    }

    pub(crate) fn aligned_bytes_per_row(width: u32) -> u32 {
        let unaligned = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unaligned.div_ceil(align) * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_align_to_copy_pitch() {
        assert_eq!(Compositor::aligned_bytes_per_row(1), 256);
        assert_eq!(Compositor::aligned_bytes_per_row(64), 256);
        assert_eq!(Compositor::aligned_bytes_per_row(65), 512);
    }
}
