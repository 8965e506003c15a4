//! GPU images with explicit layout tracking
//!
//! An image's `layout` field changes only when a recorded transition is
//! committed after its submission completed (or through the mipmap
//! generator, which leaves every level shader-readable). Operations that
//! need a particular layout check it before recording.

use ash::{vk, Device};

use crate::foundation::math::utils::floor_log2;
use crate::render::vulkan::buffer::allocate_memory;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Access masks and pipeline stages for one layout transition barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage producing the source accesses
    pub src_stage: vk::PipelineStageFlags,
    /// Stage consuming the destination accesses
    pub dst_stage: vk::PipelineStageFlags,
}

/// A layout transition that has been recorded but not yet committed
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    /// Layout the barrier leaves
    pub from: vk::ImageLayout,
    /// Layout the barrier enters
    pub to: vk::ImageLayout,
    /// Barrier masks for the pair
    pub masks: TransitionMasks,
}

impl PendingTransition {
    /// Plan a transition, failing for unsupported pairs
    pub fn new(from: vk::ImageLayout, to: vk::ImageLayout) -> VulkanResult<Self> {
        Ok(Self {
            from,
            to,
            masks: transition_masks(from, to)?,
        })
    }

    /// Layout after committing on top of `current`
    ///
    /// Fails if the image moved since the transition was recorded.
    pub fn apply(self, current: vk::ImageLayout) -> VulkanResult<vk::ImageLayout> {
        if current == self.from {
            Ok(self.to)
        } else {
            Err(VulkanError::InvalidOperation {
                reason: format!(
                    "transition {:?} -> {:?} recorded but image is in {:?}",
                    self.from, self.to, current
                ),
            })
        }
    }
}

/// Barrier masks for the supported layout transitions
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionMasks> {
    use vk::ImageLayout as L;

    let masks = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        },
        (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        },
        _ => return Err(VulkanError::UnsupportedLayoutTransition { old, new }),
    };
    Ok(masks)
}

/// Whether a depth format carries a stencil component
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(format, vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT)
}

/// Aspect flags a barrier into `layout` must cover for `format`
pub fn barrier_aspect(format: vk::Format, layout: vk::ImageLayout) -> vk::ImageAspectFlags {
    if layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// `floor(log2(max(width, height))) + 1`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    floor_log2(width.max(height)) + 1
}

/// Half of a mip dimension, never below 1
pub fn next_mip_extent(dimension: i32) -> i32 {
    if dimension > 1 {
        dimension / 2
    } else {
        1
    }
}

/// Parameters for a 2-D image allocation
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Samples per pixel
    pub samples: vk::SampleCountFlags,
    /// Pixel format
    pub format: vk::Format,
    /// Tiling mode
    pub tiling: vk::ImageTiling,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Required memory properties
    pub memory: vk::MemoryPropertyFlags,
}

/// 2-D image owning its memory, with its current layout
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
    layout: vk::ImageLayout,
}

impl GpuImage {
    /// Create the image in `UNDEFINED` layout and bind fresh memory to it
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &ImageDesc,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(desc.samples)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe {
            device.create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate_memory(&device, memory_properties, requirements, desc.memory) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let this = Self {
            device,
            image,
            memory,
            format: desc.format,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            mip_levels: desc.mip_levels,
            layout: vk::ImageLayout::UNDEFINED,
        };
        unsafe {
            this.device.bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(this)
    }

    /// Record a barrier moving every mip level from the current layout to `new_layout`
    ///
    /// The tracked layout is untouched until the returned transition is
    /// passed to [`Self::commit_transition`].
    pub fn record_transition(
        &self,
        command_buffer: vk::CommandBuffer,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<PendingTransition> {
        let pending = PendingTransition::new(self.layout, new_layout)?;
        let masks = pending.masks;

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(pending.from)
            .new_layout(pending.to)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: barrier_aspect(self.format, new_layout),
                base_mip_level: 0,
                level_count: self.mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access);

        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.build()],
            );
        }

        Ok(pending)
    }

    /// Adopt the layout of a transition whose submission completed
    pub fn commit_transition(&mut self, pending: PendingTransition) -> VulkanResult<()> {
        self.layout = pending.apply(self.layout)?;
        log::debug!("Image {:?}: {:?} -> {:?}", self.image, pending.from, pending.to);
        Ok(())
    }

    /// Record a copy of tightly packed pixels from `buffer` into mip level 0
    pub fn copy_from_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer) -> VulkanResult<()> {
        self.require_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL, "buffer copy")?;

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            });

        unsafe {
            self.device.cmd_copy_buffer_to_image(
                command_buffer,
                buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }
        Ok(())
    }

    /// Fail with `InvalidOperation` unless the image is in `expected`
    pub fn require_layout(&self, expected: vk::ImageLayout, operation: &str) -> VulkanResult<()> {
        if self.layout == expected {
            Ok(())
        } else {
            Err(VulkanError::InvalidOperation {
                reason: format!("{} needs {:?} but image is in {:?}", operation, expected, self.layout),
            })
        }
    }

    /// Record the layout that commands recorded outside this type left the image in
    pub(crate) fn set_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size of mip level 0
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Current layout
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Image view wrapper with RAII cleanup
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    /// Create a 2-D view over the first `mip_levels` levels of `image`
    pub fn new(
        device: Device,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe {
            device.create_image_view(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, view })
    }

    /// View handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(4096, 4096), 13);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(3, 5), 3);
    }

    #[test]
    fn test_next_mip_extent_floors_and_clamps() {
        assert_eq!(next_mip_extent(512), 256);
        assert_eq!(next_mip_extent(5), 2);
        assert_eq!(next_mip_extent(1), 1);
    }

    #[test]
    fn test_mip_chain_reaches_one_by_one() {
        let (mut w, mut h) = (512, 256);
        for _ in 1..mip_level_count(512, 256) {
            w = next_mip_extent(w);
            h = next_mip_extent(h);
        }
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn test_supported_transitions() {
        use vk::ImageLayout as L;

        let upload = transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(upload.src_access, vk::AccessFlags::empty());
        assert_eq!(upload.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(upload.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(upload.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let sample = transition_masks(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL).unwrap();
        assert_eq!(sample.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(sample.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let depth = transition_masks(L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL).unwrap();
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);

        let color = transition_masks(L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL).unwrap();
        assert_eq!(
            color.dst_access,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        );
    }

    #[test]
    fn test_unsupported_transition_fails() {
        use vk::ImageLayout as L;
        for (old, new) in [
            (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL),
            (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL),
            (L::UNDEFINED, L::PRESENT_SRC_KHR),
        ] {
            assert!(matches!(
                transition_masks(old, new),
                Err(VulkanError::UnsupportedLayoutTransition { old: o, new: n }) if o == old && n == new
            ));
        }
    }

    #[test]
    fn test_pending_transition_commits_only_on_matching_layout() {
        use vk::ImageLayout as L;

        let pending = PendingTransition::new(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(pending.masks, transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap());
        assert_eq!(pending.apply(L::UNDEFINED).unwrap(), L::TRANSFER_DST_OPTIMAL);

        // A transition whose submission never ran leaves the tracked layout
        // behind; committing a stale one is refused
        assert!(matches!(
            pending.apply(L::SHADER_READ_ONLY_OPTIMAL),
            Err(VulkanError::InvalidOperation { .. })
        ));

        assert!(matches!(
            PendingTransition::new(L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL),
            Err(VulkanError::UnsupportedLayoutTransition { .. })
        ));
    }

    #[test]
    fn test_depth_barrier_aspect() {
        let depth = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        assert_eq!(barrier_aspect(vk::Format::D32_SFLOAT, depth), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            barrier_aspect(vk::Format::D24_UNORM_S8_UINT, depth),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            barrier_aspect(vk::Format::R8G8B8A8_UNORM, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            vk::ImageAspectFlags::COLOR
        );
    }
}
