//! Reusable offscreen render target
//!
//! One color+depth attachment pair shared by every bake stage. Each stage
//! leases it mutably, renders a face into it and copies the result out into
//! the stage's own texture. `resize` and `set_format` tear down and rebuild
//! every attachment together with the staging buffer, and do nothing when
//! the requested state already matches.

use crate::context::{align_to, texel_bytes, RenderContext};
use crate::error::{IblError, IblResult};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct ScratchRenderTarget {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    staging: wgpu::Buffer,
    padded_bytes_per_row: u32,
    recreations: u64,
}

impl ScratchRenderTarget {
    pub fn new(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> IblResult<Self> {
        if width == 0 || height == 0 {
            return Err(IblError::ResourceCreation(format!(
                "scratch target dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let (color, color_view, depth_view, staging, padded_bytes_per_row) =
            Self::create_resources(ctx, width, height, format)?;
        Ok(Self {
            width,
            height,
            format,
            color,
            color_view,
            depth_view,
            staging,
            padded_bytes_per_row,
            recreations: 0,
        })
    }

    fn create_resources(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> IblResult<(
        wgpu::Texture,
        wgpu::TextureView,
        wgpu::TextureView,
        wgpu::Buffer,
        u32,
    )> {
        let color = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scratch Color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scratch Depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = align_to(
            width * texel_bytes(format)?,
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        );
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scratch Staging"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok((color, color_view, depth_view, staging, padded_bytes_per_row))
    }

    fn recreate(&mut self, ctx: &RenderContext) -> IblResult<()> {
        let (color, color_view, depth_view, staging, padded_bytes_per_row) =
            Self::create_resources(ctx, self.width, self.height, self.format)?;
        self.color = color;
        self.color_view = color_view;
        self.depth_view = depth_view;
        self.staging = staging;
        self.padded_bytes_per_row = padded_bytes_per_row;
        self.recreations += 1;
        Ok(())
    }

    /// Resize the target. A no-op when the extent already matches.
    pub fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) -> IblResult<()> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        if width == 0 || height == 0 {
            return Err(IblError::ResourceCreation(format!(
                "scratch target dimensions must be non-zero, got {width}x{height}"
            )));
        }
        log::info!(
            "Resizing scratch target {}x{} -> {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        self.width = width;
        self.height = height;
        self.recreate(ctx)
    }

    /// Switch the color format. A no-op when the format already matches.
    pub fn set_format(&mut self, ctx: &RenderContext, format: wgpu::TextureFormat) -> IblResult<()> {
        if format == self.format {
            return Ok(());
        }
        self.format = format;
        self.recreate(ctx)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Number of teardown/recreate cycles since creation.
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    /// Begin a render pass over the full target, clearing color and depth.
    pub fn begin_pass<'e>(
        &'e self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Copy the color attachment into the region `(mip, layer)` of `dst`.
    /// The destination mip extent must match the current target extent.
    pub fn copy_color_to(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        dst: &wgpu::Texture,
        mip: u32,
        layer: u32,
    ) {
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: dst,
                mip_level: mip,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Read the color attachment back to the CPU through the staging buffer.
    /// Returns tightly packed rows.
    pub fn read_back(&self, ctx: &RenderContext) -> IblResult<Vec<u8>> {
        let unpadded_bytes_per_row = self.width * texel_bytes(self.format)?;

        ctx.run_commands("Scratch Readback", |encoder| {
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: &self.color,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &self.staging,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(self.padded_bytes_per_row),
                        rows_per_image: Some(self.height),
                    },
                },
                wgpu::Extent3d {
                    width: self.width,
                    height: self.height,
                    depth_or_array_layers: 1,
                },
            );
        });

        let slice = self.staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| IblError::Readback("map callback dropped".into()))?
            .map_err(|e| IblError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * self.height) as usize);
        for row in 0..self.height {
            let start = (row * self.padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        self.staging.unmap();

        Ok(pixels)
    }
}
