//! Sprite texture for the render pass.
//!
//! Particles are drawn as white discs modulated by their fade-out alpha; a
//! sprite texture, when configured, replaces the flat white. Loading is
//! recoverable: on failure the engine logs and falls back to the solid
//! white 1x1 texture, which leaves the modulation a no-op.

use std::path::Path;

use log::warn;

use crate::error::TextureError;

/// An RGBA8 texture plus the sampler the render pass uses.
pub struct SpriteTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl SpriteTexture {
    /// Load a PNG or JPEG sprite from disk.
    pub fn load<P: AsRef<Path>>(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: P,
    ) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        let img = image::load_from_memory(&bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(device, queue, &img.into_raw(), width, height))
    }

    /// Load a sprite, falling back to solid white when loading fails.
    pub fn load_or_white<P: AsRef<Path>>(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: Option<P>,
    ) -> Self {
        match path {
            Some(p) => match Self::load(device, queue, p.as_ref()) {
                Ok(sprite) => sprite,
                Err(e) => {
                    warn!(
                        "sprite '{}' unavailable, rendering untextured: {}",
                        p.as_ref().display(),
                        e
                    );
                    Self::solid_white(device, queue)
                }
            },
            None => Self::solid_white(device, queue),
        }
    }

    /// The 1x1 white fallback.
    pub fn solid_white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_rgba(device, queue, &[255, 255, 255, 255], 1, 1)
    }

    /// Upload raw RGBA8 pixels.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
        }
    }

    /// Texture view for bind group construction.
    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Sampler for bind group construction.
    #[inline]
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}
