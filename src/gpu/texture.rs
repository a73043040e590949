//! GPU textures backing `Texture` nodes.

use anyhow::*;

use crate::render::{Filter, TextureBinding, TextureDesc, TextureFormat, Wrap};

/// Format of every depth attachment.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

pub fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth24Stencil8 => DEPTH_FORMAT,
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    }
}

/// A texture node's GPU side. `revision` is the node revision last uploaded.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub desc: TextureDesc,
    pub revision: u64,
}

impl GpuTexture {
    pub fn new(device: &wgpu::Device, desc: TextureDesc, label: &str) -> Self {
        let format = wgpu_format(desc.format);
        let usage = if desc.format.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(desc.width, desc.height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address_mode(desc.wrap_s),
            address_mode_v: address_mode(desc.wrap_t),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(desc.mag_filter),
            min_filter: filter_mode(desc.min_filter),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            desc,
            revision: 0,
        }
    }

    /// Creates or refreshes the texture of `binding` in `slot`.
    pub fn sync(
        slot: &mut Option<GpuTexture>,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        binding: &TextureBinding,
    ) -> Result<()> {
        let stale = match slot {
            Some(texture) if texture.desc == binding.desc => texture.revision != binding.revision,
            _ => {
                let label = format!("texture n{}", binding.node_id);
                *slot = Some(GpuTexture::new(device, binding.desc, &label));
                true
            }
        };
        let Some(texture) = slot else {
            return Ok(());
        };
        if stale {
            if let Some(image) = &binding.image {
                texture.upload(queue, image)?;
            }
            texture.revision = binding.revision;
        }
        Ok(())
    }

    /// Uploads `image`, resized to the texture size if needed.
    pub fn upload(&self, queue: &wgpu::Queue, image: &image::RgbaImage) -> Result<()> {
        if !matches!(self.desc.format, TextureFormat::Rgba8 | TextureFormat::Rgba8Srgb) {
            bail!("media data can only be uploaded to 8-bit RGBA textures");
        }
        let size = extent(self.desc.width, self.desc.height);
        let resized;
        let rgba = if image.dimensions() == (size.width, size.height) {
            image
        } else {
            resized = image::imageops::resize(
                image,
                size.width,
                size.height,
                image::imageops::FilterType::Triangle,
            );
            &resized
        };
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
        Ok(())
    }
}

/// 1x1 opaque white texture bound where a program expects a texture that
/// the scene does not provide.
pub fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<GpuTexture> {
    let desc = TextureDesc {
        width: 1,
        height: 1,
        format: TextureFormat::Rgba8,
        min_filter: Filter::Nearest,
        mag_filter: Filter::Nearest,
        wrap_s: Wrap::ClampToEdge,
        wrap_t: Wrap::ClampToEdge,
    };
    let texture = GpuTexture::new(device, desc, "placeholder texture");
    texture.upload(queue, &image::RgbaImage::from_pixel(1, 1, image::Rgba([255; 4])))?;
    Ok(texture)
}

/// Depth/stencil attachment for targets that do not come with one.
pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(size[0], size[1]),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[DEPTH_FORMAT],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
