//! Headless GPU context
//!
//! Wraps a wgpu device/queue acquired without a surface and provides the
//! small set of services the bake stages need: texture allocation,
//! submit-and-wait command execution and aligned texture readback.

use crate::error::{IblError, IblResult};

/// Headless device/queue pair used by every bake stage
pub struct RenderContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl RenderContext {
    /// Acquire a headless context on the first available adapter.
    pub fn new_headless() -> IblResult<Self> {
        pollster::block_on(Self::new_headless_async())
    }

    async fn new_headless_async() -> IblResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| IblError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("IBL Bake Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| IblError::InitializationFailed(e.to_string()))?;

        Ok(Self { device, queue })
    }

    /// Create a cubemap texture (6 array layers).
    pub fn create_cube_texture(
        &self,
        label: &str,
        size: u32,
        mip_level_count: u32,
        format: wgpu::TextureFormat,
    ) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Create a 2D texture that receives copies and is later sampled.
    pub fn create_output_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Record commands, submit them and block until the queue is idle.
    /// Every bake step runs through here, one submission at a time.
    pub fn run_commands<F>(&self, label: &str, record: F)
    where
        F: FnOnce(&mut wgpu::CommandEncoder),
    {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        record(&mut encoder);
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Read one (mip, layer) of a texture back to the CPU, with the 256-byte
    /// row alignment padding stripped. Returns tightly packed rows.
    pub fn read_texture_layer(
        &self,
        texture: &wgpu::Texture,
        mip: u32,
        layer: u32,
    ) -> IblResult<Vec<u8>> {
        let texel = texel_bytes(texture.format())?;
        let width = (texture.width() >> mip).max(1);
        let height = (texture.height() >> mip).max(1);

        let unpadded_bytes_per_row = width * texel;
        let padded_bytes_per_row = align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.run_commands("Texture Readback", |encoder| {
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture,
                    mip_level: mip,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &buffer,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bytes_per_row),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        });

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| IblError::Readback("map callback dropped".into()))?
            .map_err(|e| IblError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        buffer.unmap();

        Ok(pixels)
    }
}

/// Bytes per texel for the formats the pipeline renders into.
pub fn texel_bytes(format: wgpu::TextureFormat) -> IblResult<u32> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(4),
        wgpu::TextureFormat::Rgba16Float => Ok(8),
        wgpu::TextureFormat::Rgba32Float => Ok(16),
        other => Err(IblError::Readback(format!(
            "unsupported readback format {other:?}"
        ))),
    }
}

pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_alignment_rounds_up() {
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(1, 256), 256);
        // 32 texels of Rgba16Float need exactly one aligned row
        assert_eq!(align_to(32 * 8, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT), 256);
    }

    #[test]
    fn texel_sizes_for_render_formats() {
        assert_eq!(texel_bytes(wgpu::TextureFormat::Rgba16Float).unwrap(), 8);
        assert_eq!(texel_bytes(wgpu::TextureFormat::Rgba8UnormSrgb).unwrap(), 4);
        assert!(texel_bytes(wgpu::TextureFormat::Depth32Float).is_err());
    }
}
