//! GGX specular prefilter pass
//!
//! Builds the prefiltered environment mip chain: each mip level is rendered
//! at half the previous resolution with the roughness that the runtime
//! shader will select through its level of detail.

use crate::basis::{FaceBasis, CUBE_FACE_BASES};
use crate::camera::{BakeUniforms, FaceCamera};
use crate::context::RenderContext;
use crate::error::{IblError, IblResult};
use crate::mesh::{GpuMesh, Vertex};
use crate::scratch::{ScratchRenderTarget, DEPTH_FORMAT};

use super::{cube_env_bind_group_layout, BakedCubemap};

/// One prefilter step: mip level, face resolution and GGX roughness
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MipStep {
    pub mip: u32,
    pub resolution: u32,
    pub roughness: f32,
}

/// The full mip chain plan for a prefiltered cubemap
#[derive(Debug, Clone)]
pub struct MipSchedule {
    steps: Vec<MipStep>,
}

impl MipSchedule {
    /// Plan a chain of `mip_count` levels starting at `base_resolution`.
    /// Resolutions halve per level and roughness runs linearly from 0 at
    /// the base to 1 at the last mip.
    pub fn new(base_resolution: u32, mip_count: u32) -> IblResult<Self> {
        if base_resolution == 0 || mip_count == 0 {
            return Err(IblError::ResourceCreation(format!(
                "invalid mip schedule: base {base_resolution}, mips {mip_count}"
            )));
        }
        if base_resolution >> (mip_count - 1) == 0 {
            return Err(IblError::ResourceCreation(format!(
                "mip schedule underflows: {mip_count} mips from base {base_resolution}"
            )));
        }

        let steps = (0..mip_count)
            .map(|mip| MipStep {
                mip,
                resolution: base_resolution >> mip,
                roughness: if mip_count == 1 {
                    0.0
                } else {
                    mip as f32 / (mip_count - 1) as f32
                },
            })
            .collect();

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[MipStep] {
        &self.steps
    }

    pub fn mip_count(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn base_resolution(&self) -> u32 {
        self.steps[0].resolution
    }
}

/// Prefilters the environment for GGX specular reflection, one roughness
/// per mip level
pub struct SpecularPrefilterer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    format: wgpu::TextureFormat,
}

impl SpecularPrefilterer {
    pub const FACE_BASES: &'static [FaceBasis; 6] = &CUBE_FACE_BASES;

    pub fn new(ctx: &RenderContext, format: wgpu::TextureFormat) -> IblResult<Self> {
        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Specular Prefilter Shader"),
                source: wgpu::ShaderSource::Wgsl(PREFILTER_SHADER.into()),
            });

        let bind_group_layout =
            cube_env_bind_group_layout(ctx, "Specular Prefilter Bind Group Layout");

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Specular Prefilter Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Specular Prefilter Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[Vertex::buffer_layout()],
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
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
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

        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Specular Prefilter Uniforms"),
            size: std::mem::size_of::<BakeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            format,
        })
    }

    /// Prefilter `environment` into a new mip-chained cubemap following
    /// `schedule`. The scratch target is resized once per mip level; the
    /// sampler spanning the chain is created only after the last copy.
    pub fn run(
        &self,
        ctx: &RenderContext,
        scratch: &mut ScratchRenderTarget,
        mesh: &GpuMesh,
        environment: &BakedCubemap,
        schedule: &MipSchedule,
    ) -> IblResult<BakedCubemap> {
        scratch.set_format(ctx, self.format)?;

        let base = schedule.base_resolution();
        let mip_count = schedule.mip_count();
        let cube = ctx.create_cube_texture("Prefiltered Cubemap", base, mip_count, self.format);

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Specular Prefilter Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&environment.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&environment.sampler),
                },
            ],
        });

        for step in schedule.steps() {
            log::info!(
                "Prefiltering mip {} at {}x{} (roughness {:.3})",
                step.mip,
                step.resolution,
                step.resolution,
                step.roughness
            );
            scratch.resize(ctx, step.resolution, step.resolution)?;

            for face in 0..CUBE_FACE_BASES.len() {
                let camera = FaceCamera::for_face(face);
                ctx.queue.write_buffer(
                    &self.uniform_buffer,
                    0,
                    bytemuck::bytes_of(&camera.uniform_data(step.roughness)),
                );
                ctx.run_commands("Specular Prefilter Face", |encoder| {
                    {
                        let mut pass = scratch.begin_pass(encoder, "Specular Prefilter Pass");
                        pass.set_pipeline(&self.pipeline);
                        pass.set_bind_group(0, &bind_group, &[]);
                        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                        pass.set_index_buffer(
                            mesh.index_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    }
                    scratch.copy_color_to(encoder, &cube, step.mip, face as u32);
                });
            }
        }

        Ok(BakedCubemap::finish(ctx, cube, base, mip_count))
    }
}

/// GGX specular prefilter shader
pub const PREFILTER_SHADER: &str = r#"
struct BakeUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: BakeUniforms;
@group(0) @binding(1) var env_map: texture_cube<f32>;
@group(0) @binding(2) var env_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local_pos: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.local_pos = position;
    out.clip_position = uniforms.proj * uniforms.view * vec4<f32>(position, 1.0);
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

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.local_pos);
    let r = n;
    let v = r;
    let roughness = uniforms.params.x;

    var prefiltered = vec3<f32>(0.0);
    var total_weight = 0.0;
    for (var i = 0u; i < SAMPLE_COUNT; i += 1u) {
        let xi = hammersley(i, SAMPLE_COUNT);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);

        let n_dot_l = max(dot(n, l), 0.0);
        if (n_dot_l > 0.0) {
            prefiltered += textureSampleLevel(env_map, env_sampler, l, 0.0).rgb * n_dot_l;
            total_weight += n_dot_l;
        }
    }
    prefiltered = prefiltered / max(total_weight, 0.001);

    return vec4<f32>(prefiltered, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_halves_resolution_per_mip() {
        let schedule = MipSchedule::new(128, 8).unwrap();
        assert_eq!(schedule.mip_count(), 8);
        assert_eq!(schedule.base_resolution(), 128);
        for step in schedule.steps() {
            assert_eq!(step.resolution, 128 >> step.mip);
        }
        assert_eq!(schedule.steps().last().unwrap().resolution, 1);
    }

    #[test]
    fn schedule_roughness_spans_zero_to_one() {
        let schedule = MipSchedule::new(128, 8).unwrap();
        let steps = schedule.steps();
        assert_eq!(steps[0].roughness, 0.0);
        assert_eq!(steps[7].roughness, 1.0);
        for pair in steps.windows(2) {
            assert!(pair[0].roughness < pair[1].roughness);
            assert!(pair[0].resolution > pair[1].resolution);
        }
    }

    #[test]
    fn single_mip_schedule_uses_zero_roughness() {
        let schedule = MipSchedule::new(64, 1).unwrap();
        assert_eq!(schedule.steps(), &[MipStep { mip: 0, resolution: 64, roughness: 0.0 }]);
    }

    #[test]
    fn schedule_rejects_underflow() {
        assert!(MipSchedule::new(128, 9).is_err());
        assert!(MipSchedule::new(0, 1).is_err());
        assert!(MipSchedule::new(128, 0).is_err());
        assert!(MipSchedule::new(128, 8).is_ok());
    }
}
