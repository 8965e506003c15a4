//! Multisampled color and depth attachments sized to the swapchain

use ash::vk;

use crate::render::vulkan::image::barrier_aspect;
use crate::render::vulkan::{
    DeviceContext, GpuImage, ImageDesc, ImageView, TransferContext, VulkanResult,
};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate usable as an optimally tiled depth attachment
pub fn find_depth_format(context: &DeviceContext) -> VulkanResult<vk::Format> {
    context.find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
    )
}

/// Image plus view for one attachment
pub struct Attachment {
    view: ImageView,
    image: GpuImage,
}

impl Attachment {
    fn new(
        context: &DeviceContext,
        transfer: &TransferContext<'_>,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        layout: vk::ImageLayout,
    ) -> VulkanResult<Self> {
        let mut image = GpuImage::new(
            context.device().clone(),
            transfer.memory_properties(),
            &ImageDesc {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples: context.msaa_samples(),
                format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                memory: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        // Views of depth-stencil formats may only select the depth aspect
        let view_aspect = barrier_aspect(format, layout) & !vk::ImageAspectFlags::STENCIL;
        let view = ImageView::new(context.device().clone(), image.handle(), format, view_aspect, 1)?;

        transfer.transition_layout(&mut image, layout)?;

        Ok(Self { view, image })
    }

    /// View handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }
}

/// MSAA color target and depth buffer
pub struct RenderTargets {
    /// Transient multisampled color target, resolved into the swapchain image
    pub color: Attachment,
    /// Multisampled depth buffer
    pub depth: Attachment,
}

impl RenderTargets {
    /// Create both attachments at `extent` and move them into attachment layouts
    pub fn new(
        context: &DeviceContext,
        transfer: &TransferContext<'_>,
        extent: vk::Extent2D,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> VulkanResult<Self> {
        let color = Attachment::new(
            context,
            transfer,
            extent,
            color_format,
            vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )?;
        let depth = Attachment::new(
            context,
            transfer,
            extent,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        log::debug!(
            "Render targets {}x{}: color {:?}, depth {:?}, {:?}",
            extent.width,
            extent.height,
            color_format,
            depth_format,
            context.msaa_samples()
        );

        Ok(Self { color, depth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_view_aspect_drops_stencil() {
        let aspect = barrier_aspect(vk::Format::D24_UNORM_S8_UINT, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            & !vk::ImageAspectFlags::STENCIL;
        assert_eq!(aspect, vk::ImageAspectFlags::DEPTH);
    }
}
