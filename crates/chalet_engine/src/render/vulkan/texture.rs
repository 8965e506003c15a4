//! Sampled texture with a full mip chain

use ash::{vk, Device};

use crate::assets::ImageData;
use crate::render::vulkan::image::{mip_level_count, next_mip_extent};
use crate::render::vulkan::{
    DeviceContext, GpuImage, ImageDesc, ImageView, TransferContext, VulkanError, VulkanResult,
};

/// Texel format of every texture
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Maximum sampler anisotropy
pub const MAX_ANISOTROPY: f32 = 16.0;

/// Texture image, view and sampler
pub struct Texture {
    sampler: vk::Sampler,
    view: ImageView,
    image: GpuImage,
    device: Device,
}

impl Texture {
    /// Upload `pixels`, generate mipmaps and create the view and sampler
    ///
    /// Fails with `UnsupportedFormat` if the device cannot linearly blit
    /// the texture format.
    pub fn from_image_data(
        context: &DeviceContext,
        transfer: &TransferContext<'_>,
        pixels: &ImageData,
    ) -> VulkanResult<Self> {
        let mip_levels = mip_level_count(pixels.width, pixels.height);
        let staging = transfer.staging_buffer(&pixels.data)?;

        let mut image = GpuImage::new(
            context.device().clone(),
            transfer.memory_properties(),
            &ImageDesc {
                width: pixels.width,
                height: pixels.height,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                memory: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        transfer.transition_layout(&mut image, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        transfer.one_shot(|command_buffer| image.copy_from_buffer(command_buffer, staging.handle()))?;
        drop(staging);

        generate_mipmaps(context, transfer, &mut image)?;

        let view = ImageView::new(
            context.device().clone(),
            image.handle(),
            TEXTURE_FORMAT,
            vk::ImageAspectFlags::COLOR,
            mip_levels,
        )?;
        let sampler = create_sampler(context.device(), mip_levels)?;

        log::debug!(
            "Texture uploaded: {}x{} with {} mip levels",
            pixels.width,
            pixels.height,
            mip_levels
        );

        Ok(Self {
            sampler,
            view,
            image,
            device: context.device().clone(),
        })
    }

    /// Sampled image view
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Underlying image
    pub fn image(&self) -> &GpuImage {
        &self.image
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
        // view then image drop in field order
    }
}

/// Blit each level down from the previous one and leave all levels shader-readable
///
/// Expects every level in `TRANSFER_DST_OPTIMAL`, with level 0 holding the
/// source pixels.
pub fn generate_mipmaps(
    context: &DeviceContext,
    transfer: &TransferContext<'_>,
    image: &mut GpuImage,
) -> VulkanResult<()> {
    let required = vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
    let properties = context.format_properties(image.format());
    if !properties.optimal_tiling_features.contains(required) {
        return Err(VulkanError::UnsupportedFormat {
            format: image.format(),
            tiling: vk::ImageTiling::OPTIMAL,
            features: required,
        });
    }
    image.require_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL, "mipmap generation")?;

    let device = transfer.device();
    let handle = image.handle();
    let extent = image.extent();
    let mip_levels = image.mip_levels();

    transfer.one_shot(|command_buffer| {
        let mut barrier = vk::ImageMemoryBarrier::builder()
            .image(handle)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();

        let mut mip_width = extent.width as i32;
        let mut mip_height = extent.height as i32;

        for level in 1..mip_levels {
            barrier.subresource_range.base_mip_level = level - 1;
            barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
            barrier.dst_access_mask = vk::AccessFlags::TRANSFER_READ;
            pipeline_barrier(device, command_buffer, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER, barrier);

            let next_width = next_mip_extent(mip_width);
            let next_height = next_mip_extent(mip_height);

            let blit = vk::ImageBlit {
                src_subresource: color_layers(level - 1),
                src_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: mip_width, y: mip_height, z: 1 },
                ],
                dst_subresource: color_layers(level),
                dst_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: next_width, y: next_height, z: 1 },
                ],
            };
            unsafe {
                device.cmd_blit_image(
                    command_buffer,
                    handle,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    handle,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );
            }

            barrier.old_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_READ;
            barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
            pipeline_barrier(device, command_buffer, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER, barrier);

            mip_width = next_width;
            mip_height = next_height;
        }

        // Last level was only ever a blit destination
        barrier.subresource_range.base_mip_level = mip_levels - 1;
        barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
        barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
        pipeline_barrier(device, command_buffer, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER, barrier);

        Ok(())
    })?;

    image.set_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    Ok(())
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn pipeline_barrier(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
    barrier: vk::ImageMemoryBarrier,
) {
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

fn create_sampler(device: &Device, mip_levels: u32) -> VulkanResult<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(MAX_ANISOTROPY)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod((mip_levels - 1) as f32);

    unsafe {
        device.create_sampler(&sampler_info, None)
            .map_err(VulkanError::Api)
    }
}
