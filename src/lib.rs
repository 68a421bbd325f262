//! IBL Pipeline - offline image-based-lighting precomputation on the GPU
//!
//! Takes an equirectangular HDR panorama and bakes the four resources a
//! PBR renderer samples at runtime:
//! - Base environment cubemap (equirectangular projection)
//! - Diffuse irradiance cubemap (cosine-weighted convolution)
//! - Prefiltered specular cubemap (GGX importance sampling, one roughness per mip)
//! - Split-sum BRDF lookup table
//!
//! All stages render through one shared offscreen scratch target and run
//! synchronously, one submission per face and mip.
//!
//! ```no_run
//! use ibl_pipeline::{EnvironmentSource, IblConfig, IblPipeline, RenderContext};
//!
//! # fn main() -> ibl_pipeline::IblResult<()> {
//! let ctx = RenderContext::new_headless()?;
//! let source = EnvironmentSource::load_hdr(&ctx, "environment.hdr")?;
//! let mut pipeline = IblPipeline::new(&ctx, IblConfig::default())?;
//! let output = pipeline.bake(&ctx, &source)?;
//! # let _ = output.irradiance;
//! # Ok(())
//! # }
//! ```

pub mod basis;
pub mod camera;
pub mod context;
pub mod environment;
pub mod error;
pub mod mesh;
pub mod pipeline;
pub mod scratch;

pub use basis::{FaceBasis, CUBE_FACE_BASES};
pub use camera::{BakeUniforms, FaceCamera};
pub use context::RenderContext;
pub use environment::EnvironmentSource;
pub use error::{IblError, IblResult};
pub use mesh::{GpuMesh, Mesh, Vertex};
pub use pipeline::{
    BakedCubemap, BakedLut, BrdfIntegrator, CubeProjector, DiffuseConvolver, IblConfig, IblOutput,
    IblPipeline, MipSchedule, MipStep, SpecularPrefilterer,
};
pub use scratch::ScratchRenderTarget;
