//! Diffuse irradiance convolution pass
//!
//! Convolves the base environment cubemap with a cosine-weighted kernel
//! over the hemisphere around each texel's direction. The result is very
//! low frequency, so a small face size is enough.

use crate::basis::{FaceBasis, CUBE_FACE_BASES};
use crate::camera::{BakeUniforms, FaceCamera};
use crate::context::RenderContext;
use crate::error::IblResult;
use crate::mesh::{GpuMesh, Vertex};
use crate::scratch::{ScratchRenderTarget, DEPTH_FORMAT};

use super::{cube_env_bind_group_layout, BakedCubemap};

/// Convolves the base environment into a diffuse irradiance cubemap
pub struct DiffuseConvolver {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    format: wgpu::TextureFormat,
}

impl DiffuseConvolver {
    pub const FACE_BASES: &'static [FaceBasis; 6] = &CUBE_FACE_BASES;

    pub fn new(ctx: &RenderContext, format: wgpu::TextureFormat) -> IblResult<Self> {
        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Irradiance Convolution Shader"),
                source: wgpu::ShaderSource::Wgsl(IRRADIANCE_SHADER.into()),
            });

        let bind_group_layout =
            cube_env_bind_group_layout(ctx, "Irradiance Convolution Bind Group Layout");

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Irradiance Convolution Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Irradiance Convolution Pipeline"),
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
            label: Some("Irradiance Convolution Uniforms"),
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

    /// Convolve `environment` into a new irradiance cubemap of the given
    /// face size.
    pub fn run(
        &self,
        ctx: &RenderContext,
        scratch: &mut ScratchRenderTarget,
        mesh: &GpuMesh,
        environment: &BakedCubemap,
        size: u32,
    ) -> IblResult<BakedCubemap> {
        scratch.resize(ctx, size, size)?;
        scratch.set_format(ctx, self.format)?;

        let cube = ctx.create_cube_texture("Irradiance Cubemap", size, 1, self.format);

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Irradiance Convolution Bind Group"),
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

        log::info!("Convolving irradiance at {size}x{size}");
        for face in 0..CUBE_FACE_BASES.len() {
            let camera = FaceCamera::for_face(face);
            ctx.queue.write_buffer(
                &self.uniform_buffer,
                0,
                bytemuck::bytes_of(&camera.uniform_data(0.0)),
            );
            ctx.run_commands("Irradiance Convolution Face", |encoder| {
                {
                    let mut pass = scratch.begin_pass(encoder, "Irradiance Convolution Pass");
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

/// Diffuse irradiance convolution shader
pub const IRRADIANCE_SHADER: &str = r#"
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
const SAMPLE_DELTA: f32 = 0.05;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(in.local_pos);

    var up = vec3<f32>(0.0, 1.0, 0.0);
    if (abs(normal.y) > 0.999) {
        up = vec3<f32>(1.0, 0.0, 0.0);
    }
    let right = normalize(cross(normal, up));
    up = cross(normal, right);

    var irradiance = vec3<f32>(0.0);
    var sample_count = 0.0;
    for (var phi = 0.0; phi < 2.0 * PI; phi += SAMPLE_DELTA) {
        for (var theta = 0.0; theta < 0.5 * PI; theta += SAMPLE_DELTA) {
            let tangent_sample = vec3<f32>(
                sin(theta) * cos(phi),
                sin(theta) * sin(phi),
                cos(theta),
            );
            let sample_vec = tangent_sample.x * right
                + tangent_sample.y * up
                + tangent_sample.z * normal;
            irradiance += textureSampleLevel(env_map, env_sampler, sample_vec, 0.0).rgb
                * cos(theta) * sin(theta);
            sample_count += 1.0;
        }
    }
    irradiance = PI * irradiance / sample_count;

    return vec4<f32>(irradiance, 1.0);
}
"#;
