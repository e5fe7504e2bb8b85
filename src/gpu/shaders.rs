// ============================================================================
// WGSL SHADERS
// ============================================================================

// ============================================================================
// COMPOSITE SHADER
// ============================================================================
//
// Draws one layer as a full-target quad.  Texels are already premultiplied,
// so opacity scales all four channels and the pipeline's fixed-function
// blend (One, OneMinusSrcAlpha) performs the source-over.

pub const COMPOSITE_SHADER: &str = r#"
struct ViewUniforms {
    view_proj: mat4x4<f32>,
    opacity: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> view: ViewUniforms;
@group(1) @binding(0) var layer_texture: texture_2d<f32>;
@group(1) @binding(1) var layer_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
    );

    let pos = positions[vi];
    var out: VertexOutput;
    out.position = view.view_proj * vec4<f32>(pos, 0.0, 1.0);
    out.uv = pos;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(layer_texture, layer_sampler, in.uv) * view.opacity;
}
"#;
