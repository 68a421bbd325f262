//! Equirectangular to cubemap projection pass
//!
//! Renders the unit cube once per face with a camera at the origin and
//! samples the panorama by inverse spherical mapping, copying each result
//! into the matching cubemap layer.

use crate::basis::{FaceBasis, CUBE_FACE_BASES};
use crate::camera::{BakeUniforms, FaceCamera};
use crate::context::RenderContext;
use crate::environment::EnvironmentSource;
use crate::error::IblResult;
use crate::mesh::{GpuMesh, Vertex};
use crate::scratch::{ScratchRenderTarget, DEPTH_FORMAT};

use super::{linear_clamp_sampler, BakedCubemap};

/// Projects an equirectangular environment onto the six cubemap faces
pub struct CubeProjector {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    source_sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
}

impl CubeProjector {
    pub const FACE_BASES: &'static [FaceBasis; 6] = &CUBE_FACE_BASES;

    pub fn new(ctx: &RenderContext, format: wgpu::TextureFormat) -> IblResult<Self> {
        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Equirect Projection Shader"),
                source: wgpu::ShaderSource::Wgsl(PROJECTION_SHADER.into()),
            });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Equirect Projection Bind Group Layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Equirect Projection Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Equirect Projection Pipeline"),
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
                    // The camera sits inside the cube
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
            label: Some("Equirect Projection Uniforms"),
            size: std::mem::size_of::<BakeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let source_sampler = linear_clamp_sampler(ctx, "Equirect Source Sampler", f32::MAX);

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            source_sampler,
            format,
        })
    }

    /// Render the panorama into a new base environment cubemap of the given
    /// face size. One submission per face, each waited on before the next.
    pub fn run(
        &self,
        ctx: &RenderContext,
        scratch: &mut ScratchRenderTarget,
        mesh: &GpuMesh,
        source: &EnvironmentSource,
        size: u32,
    ) -> IblResult<BakedCubemap> {
        scratch.resize(ctx, size, size)?;
        scratch.set_format(ctx, self.format)?;

        let cube = ctx.create_cube_texture("Environment Cubemap", size, 1, self.format);

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Equirect Projection Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.source_sampler),
                },
            ],
        });

        log::info!("Projecting environment to {size}x{size} cubemap");
        for face in 0..CUBE_FACE_BASES.len() {
            let camera = FaceCamera::for_face(face);
            ctx.queue.write_buffer(
                &self.uniform_buffer,
                0,
                bytemuck::bytes_of(&camera.uniform_data(0.0)),
            );
            ctx.run_commands("Equirect Projection Face", |encoder| {
                {
                    let mut pass = scratch.begin_pass(encoder, "Equirect Projection Pass");
                    pass.set_pipeline(&self.pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
                scratch.copy_color_to(encoder, &cube, 0, face as u32);
            });
        }

        Ok(BakedCubemap::finish(ctx, cube, size, 1))
    }
}

/// Equirectangular projection shader
pub const PROJECTION_SHADER: &str = r#"
struct BakeUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: BakeUniforms;
@group(0) @binding(1) var equirect_map: texture_2d<f32>;
@group(0) @binding(2) var equirect_sampler: sampler;

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

const INV_ATAN: vec2<f32> = vec2<f32>(0.1591549, 0.3183099);

fn sample_spherical_map(dir: vec3<f32>) -> vec2<f32> {
    var uv = vec2<f32>(atan2(dir.z, dir.x), asin(dir.y));
    uv = uv * INV_ATAN + vec2<f32>(0.5);
    return vec2<f32>(uv.x, 1.0 - uv.y);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = sample_spherical_map(normalize(in.local_pos));
    let color = textureSampleLevel(equirect_map, equirect_sampler, uv, 0.0).rgb;
    return vec4<f32>(color, 1.0);
}
"#;
