//! IBL bake pipeline
//!
//! Four stages run in a fixed order against one shared scratch target:
//! 1. Projection - equirectangular panorama to base environment cubemap
//! 2. Irradiance - cosine convolution for diffuse lighting
//! 3. Prefilter - GGX mip chain for specular reflection
//! 4. BRDF LUT - split-sum integration lookup table

pub mod brdf_lut;
pub mod irradiance;
pub mod prefilter;
pub mod projector;

pub use brdf_lut::BrdfIntegrator;
pub use irradiance::DiffuseConvolver;
pub use prefilter::{MipSchedule, MipStep, SpecularPrefilterer};
pub use projector::CubeProjector;

use crate::context::RenderContext;
use crate::environment::EnvironmentSource;
use crate::error::{IblError, IblResult};
use crate::mesh::{GpuMesh, Mesh};
use crate::scratch::ScratchRenderTarget;

/// Configuration for the IBL bake
#[derive(Debug, Clone)]
pub struct IblConfig {
    /// Face size of the base environment cubemap
    pub base_size: u32,
    /// Face size of the diffuse irradiance cubemap
    pub irradiance_size: u32,
    /// Face size of mip 0 of the prefiltered specular cubemap
    pub specular_base_size: u32,
    /// Number of mips in the prefiltered chain
    pub specular_mip_count: u32,
    /// Edge size of the square BRDF lookup table
    pub brdf_lut_size: u32,
    /// Color format used for every bake output
    pub color_format: wgpu::TextureFormat,
}

impl Default for IblConfig {
    fn default() -> Self {
        Self {
            base_size: 512,
            irradiance_size: 32,
            specular_base_size: 128,
            specular_mip_count: 8,
            brdf_lut_size: 512,
            color_format: wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// A finished cubemap: texture, cube view and sampler, ready to bind
pub struct BakedCubemap {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: u32,
    pub mip_count: u32,
}

impl BakedCubemap {
    /// Seal a fully written cube texture. The view and sampler only exist
    /// from this point on, so nothing can sample a half-written chain.
    pub(crate) fn finish(
        ctx: &RenderContext,
        texture: wgpu::Texture,
        size: u32,
        mip_count: u32,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: None,
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = linear_clamp_sampler(ctx, "Cubemap Sampler", mip_count as f32);
        Self {
            texture,
            view,
            sampler,
            size,
            mip_count,
        }
    }
}

/// A finished 2D lookup table
pub struct BakedLut {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: u32,
}

/// Everything a PBR renderer needs from one bake
pub struct IblOutput {
    pub environment: BakedCubemap,
    pub irradiance: BakedCubemap,
    pub specular: BakedCubemap,
    pub brdf_lut: BakedLut,
}

/// Runs the four bake stages over one shared scratch target
pub struct IblPipeline {
    config: IblConfig,
    schedule: MipSchedule,
    projector: CubeProjector,
    convolver: DiffuseConvolver,
    prefilterer: SpecularPrefilterer,
    integrator: BrdfIntegrator,
    mesh: GpuMesh,
    scratch: ScratchRenderTarget,
}

impl IblPipeline {
    pub fn new(ctx: &RenderContext, config: IblConfig) -> IblResult<Self> {
        if config.base_size == 0 || config.irradiance_size == 0 || config.brdf_lut_size == 0 {
            return Err(IblError::ResourceCreation(format!(
                "invalid bake sizes: base {}, irradiance {}, brdf {}",
                config.base_size, config.irradiance_size, config.brdf_lut_size
            )));
        }
        let schedule = MipSchedule::new(config.specular_base_size, config.specular_mip_count)?;

        let projector = CubeProjector::new(ctx, config.color_format)?;
        let convolver = DiffuseConvolver::new(ctx, config.color_format)?;
        let prefilterer = SpecularPrefilterer::new(ctx, config.color_format)?;
        let integrator = BrdfIntegrator::new(ctx, config.color_format)?;

        let mesh = GpuMesh::upload(ctx, &Mesh::cube());
        let scratch =
            ScratchRenderTarget::new(ctx, config.base_size, config.base_size, config.color_format)?;

        Ok(Self {
            config,
            schedule,
            projector,
            convolver,
            prefilterer,
            integrator,
            mesh,
            scratch,
        })
    }

    pub fn config(&self) -> &IblConfig {
        &self.config
    }

    /// Run the full bake. Blocks until every stage has finished; each stage
    /// borrows the scratch target exclusively while it runs.
    pub fn bake(&mut self, ctx: &RenderContext, source: &EnvironmentSource) -> IblResult<IblOutput> {
        log::info!("Starting IBL bake");

        let environment = self.projector.run(
            ctx,
            &mut self.scratch,
            &self.mesh,
            source,
            self.config.base_size,
        )?;

        let irradiance = self.convolver.run(
            ctx,
            &mut self.scratch,
            &self.mesh,
            &environment,
            self.config.irradiance_size,
        )?;

        let specular = self.prefilterer.run(
            ctx,
            &mut self.scratch,
            &self.mesh,
            &environment,
            &self.schedule,
        )?;

        let brdf_lut = self
            .integrator
            .run(ctx, &mut self.scratch, self.config.brdf_lut_size)?;

        log::info!("IBL bake finished");
        Ok(IblOutput {
            environment,
            irradiance,
            specular,
            brdf_lut,
        })
    }
}

/// Linear clamp-to-edge sampler shared by the bake outputs.
pub(crate) fn linear_clamp_sampler(
    ctx: &RenderContext,
    label: &str,
    lod_max_clamp: f32,
) -> wgpu::Sampler {
    ctx.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        lod_min_clamp: 0.0,
        lod_max_clamp,
        compare: None,
        anisotropy_clamp: 1,
        border_color: None,
    })
}

/// Bind group layout shared by the two passes that sample a cubemap:
/// uniforms, cube texture, sampler.
pub(crate) fn cube_env_bind_group_layout(
    ctx: &RenderContext,
    label: &str,
) -> wgpu::BindGroupLayout {
    ctx.device
        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
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
                        view_dimension: wgpu::TextureViewDimension::Cube,
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
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_stages_share_one_face_basis_table() {
        assert_eq!(CubeProjector::FACE_BASES, DiffuseConvolver::FACE_BASES);
        assert_eq!(CubeProjector::FACE_BASES, SpecularPrefilterer::FACE_BASES);
        assert_eq!(CubeProjector::FACE_BASES, &crate::basis::CUBE_FACE_BASES);
    }

    #[test]
    fn default_config_matches_bake_tiers() {
        let config = IblConfig::default();
        assert_eq!(config.specular_base_size, 128);
        assert_eq!(config.specular_mip_count, 8);
        assert_eq!(config.brdf_lut_size, 512);
        assert_eq!(config.color_format, wgpu::TextureFormat::Rgba16Float);
        // The default schedule reaches a 1x1 top mip exactly.
        let schedule =
            MipSchedule::new(config.specular_base_size, config.specular_mip_count).unwrap();
        assert_eq!(schedule.steps().last().unwrap().resolution, 1);
    }
}
