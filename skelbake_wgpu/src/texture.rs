use log::warn;
use skelbake_model::{PixelFormat, PoseAtlas, Texel, TextureDescriptor, TextureFactory};
use wgpu::util::DeviceExt;

/// Creates textures from baked texel data on a wgpu device.
pub struct WgpuTextureFactory<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl TextureFactory for WgpuTextureFactory<'_> {
    type Texture = wgpu::Texture;

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texels: &[Texel],
    ) -> wgpu::Texture {
        create_texture(self.device, self.queue, descriptor, texels, Some("pose atlas"))
    }
}

#[tracing::instrument(skip_all)]
pub fn create_pose_atlas_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    atlas: &PoseAtlas,
) -> wgpu::Texture {
    create_texture(
        device,
        queue,
        &atlas.texture_descriptor(),
        &atlas.pixels,
        Some("pose atlas"),
    )
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    descriptor: &TextureDescriptor,
    texels: &[Texel],
    label: Option<&str>,
) -> wgpu::Texture {
    let max_dimension = device.limits().max_texture_dimension_2d;
    if descriptor.width > max_dimension || descriptor.height > max_dimension {
        warn!(
            "Texture size {}x{} exceeds the device limit of {}",
            descriptor.width, descriptor.height, max_dimension
        );
    }

    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: descriptor.depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(descriptor.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        bytemuck::cast_slice(texels),
    )
}

fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}
