//! Split-sum BRDF integration pass
//!
//! Integrates the environment-independent part of the split-sum
//! approximation into a 2D lookup table: x is N.V, y is roughness, and the
//! red/green channels hold the Fresnel scale and bias terms.

use crate::context::RenderContext;
use crate::error::IblResult;
use crate::scratch::{ScratchRenderTarget, DEPTH_FORMAT};

use super::{linear_clamp_sampler, BakedLut};

/// Integrates the split-sum BRDF lookup table
pub struct BrdfIntegrator {
    pipeline: wgpu::RenderPipeline,
    format: wgpu::TextureFormat,
}

impl BrdfIntegrator {
    pub fn new(ctx: &RenderContext, format: wgpu::TextureFormat) -> IblResult<Self> {
        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("BRDF Integration Shader"),
                source: wgpu::ShaderSource::Wgsl(BRDF_SHADER.into()),
            });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("BRDF Integration Pipeline Layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("BRDF Integration Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                // The fullscreen triangle ignores the scratch depth buffer,
                // but the pass still attaches it.
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            });

        Ok(Self { pipeline, format })
    }

    /// Integrate the lookup table at `size`x`size` with a single fullscreen
    /// draw and copy it into its own texture.
    pub fn run(
        &self,
        ctx: &RenderContext,
        scratch: &mut ScratchRenderTarget,
        size: u32,
    ) -> IblResult<BakedLut> {
        scratch.resize(ctx, size, size)?;
        scratch.set_format(ctx, self.format)?;

        let lut = ctx.create_output_texture("BRDF LUT", size, size, self.format);

        log::info!("Integrating BRDF LUT at {size}x{size}");
        ctx.run_commands("BRDF Integration", |encoder| {
            {
                let mut pass = scratch.begin_pass(encoder, "BRDF Integration Pass");
                pass.set_pipeline(&self.pipeline);
                pass.draw(0..3, 0..1);
            }
            scratch.copy_color_to(encoder, &lut, 0, 0);
        });

        let view = lut.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = linear_clamp_sampler(ctx, "BRDF LUT Sampler", f32::MAX);

        Ok(BakedLut {
            texture: lut,
            view,
            sampler,
            size,
        })
    }
}

/// Split-sum BRDF integration shader
pub const BRDF_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var out: VertexOutput;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.uv = uv;
    out.clip_position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    return out;
}

const PI: f32 = 3.14159265359;
const SAMPLE_COUNT: u32 = 1024u;

fn radical_inverse_vdc(bits: u32) -> f32 {
    return f32(reverseBits(bits)) * 2.3283064365386963e-10;
}

fn hammersley(i: u32, n: u32) -> vec2<f32> {
    return vec2<f32>(f32(i) / f32(n), radical_inverse_vdc(i));
}

fn importance_sample_ggx(xi: vec2<f32>, n: vec3<f32>, roughness: f32) -> vec3<f32> {
    let a = roughness * roughness;

    let phi = 2.0 * PI * xi.x;
    let cos_theta = sqrt((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y));
    let sin_theta = sqrt(1.0 - cos_theta * cos_theta);

    let h = vec3<f32>(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta);

    var up = vec3<f32>(0.0, 0.0, 1.0);
    if (abs(n.z) > 0.999) {
        up = vec3<f32>(1.0, 0.0, 0.0);
    }
    let tangent = normalize(cross(up, n));
    let bitangent = cross(n, tangent);

    return normalize(tangent * h.x + bitangent * h.y + n * h.z);
}

// Smith geometry term with the IBL k remapping, k = a^2 / 2.
fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let a = roughness;
    let k = (a * a) / 2.0;
    return n_dot_v / (n_dot_v * (1.0 - k) + k);
}

fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    return geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
}

fn integrate_brdf(n_dot_v: f32, roughness: f32) -> vec2<f32> {
    let v = vec3<f32>(sqrt(1.0 - n_dot_v * n_dot_v), 0.0, n_dot_v);
    let n = vec3<f32>(0.0, 0.0, 1.0);

    var scale = 0.0;
    var bias = 0.0;
    for (var i = 0u; i < SAMPLE_COUNT; i += 1u) {
        let xi = hammersley(i, SAMPLE_COUNT);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);

        let n_dot_l = max(l.z, 0.0);
        let n_dot_h = max(h.z, 0.0);
        let v_dot_h = max(dot(v, h), 0.0);

        if (n_dot_l > 0.0) {
            let g = geometry_smith(n_dot_v, n_dot_l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v);
            let fc = pow(1.0 - v_dot_h, 5.0);

            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }
    return vec2<f32>(scale, bias) / f32(SAMPLE_COUNT);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n_dot_v = max(in.uv.x, 0.001);
    let roughness = in.uv.y;
    let brdf = integrate_brdf(n_dot_v, roughness);
    return vec4<f32>(brdf, 0.0, 1.0);
}
"#;
