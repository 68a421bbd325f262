//! Equirectangular environment sources
//!
//! Loads a Radiance HDR panorama (or raw pixel data) and uploads it as an
//! `Rgba16Float` texture for the projection pass to sample.

use std::path::Path;

use crate::context::RenderContext;
use crate::error::{IblError, IblResult};

/// An equirectangular radiance map resident on the GPU
pub struct EnvironmentSource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl EnvironmentSource {
    /// Load a Radiance `.hdr` panorama from disk.
    pub fn load_hdr(ctx: &RenderContext, path: impl AsRef<Path>) -> IblResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| IblError::SourceLoad(format!("{}: {e}", path.display())))?;
        let rgba = image.into_rgba32f();
        let (width, height) = rgba.dimensions();
        log::info!(
            "Loaded environment {} ({}x{})",
            path.display(),
            width,
            height
        );
        Self::from_pixels(ctx, width, height, rgba.as_raw())
    }

    /// Build a source from raw RGBA f32 pixels, row-major from the top-left.
    /// `pixels` must hold exactly `width * height * 4` floats.
    pub fn from_pixels(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        pixels: &[f32],
    ) -> IblResult<Self> {
        if width == 0 || height == 0 {
            return Err(IblError::SourceLoad(format!(
                "environment dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = (width * height * 4) as usize;
        if pixels.len() != expected {
            return Err(IblError::SourceLoad(format!(
                "expected {expected} floats for a {width}x{height} RGBA image, got {}",
                pixels.len()
            )));
        }

        let texels = pack_rgba_f16(pixels);

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Equirect Environment"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 8),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }
}

/// Pack RGBA f32 pixels into little-endian f16 texel bytes.
fn pack_rgba_f16(pixels: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 2);
    for &value in pixels {
        out.extend_from_slice(&half::f16::from_f32(value).to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f16_packing_round_trips() {
        let packed = pack_rgba_f16(&[0.0, 0.5, 1.0, 2.5]);
        assert_eq!(packed.len(), 8);
        let values: Vec<f32> = packed
            .chunks_exact(2)
            .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0, 2.5]);
    }
}
