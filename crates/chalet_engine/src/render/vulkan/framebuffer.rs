//! Per-image framebuffers

use ash::{vk, Device};

use crate::render::vulkan::{RenderTargets, Swapchain, VulkanError, VulkanResult};

/// One framebuffer per swapchain image: `[msaa color, depth, swapchain view]`
pub struct Framebuffers {
    device: Device,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    /// Build a framebuffer for every swapchain image view
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        swapchain: &Swapchain,
        targets: &RenderTargets,
    ) -> VulkanResult<Self> {
        let extent = swapchain.extent();
        let mut this = Self {
            device,
            framebuffers: Vec::with_capacity(swapchain.image_count()),
        };

        for view in swapchain.image_views() {
            let attachments = [targets.color.view(), targets.depth.view(), view.handle()];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            // Already-created framebuffers are released by Drop on error
            let framebuffer = unsafe {
                this.device.create_framebuffer(&create_info, None)
                    .map_err(VulkanError::Api)?
            };
            this.framebuffers.push(framebuffer);
        }

        Ok(this)
    }

    /// Framebuffer for swapchain image `index`
    pub fn get(&self, index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index).copied()
    }

    /// Number of framebuffers
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether there are none
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
