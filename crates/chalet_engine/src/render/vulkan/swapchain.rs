//! Vulkan swapchain management
//!
//! Negotiates format, present mode, extent and image count with the surface,
//! owns the presentable images and their views, and tracks the recreation
//! state machine (`Active -> Invalidated -> Rebuilding -> Active`).

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::vulkan::{DeviceContext, ImageView, VulkanError, VulkanResult};

/// Surface format used when the surface expresses no preference
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Pick the surface format
///
/// A single `UNDEFINED` entry means any format is acceptable and yields the
/// preferred pair. Otherwise the preferred pair wins when listed, else the
/// first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    match formats {
        [] => Err(VulkanError::SwapchainNegotiation("surface reports no formats".to_string())),
        [only] if only.format == vk::Format::UNDEFINED => Ok(PREFERRED_SURFACE_FORMAT),
        [first, ..] => Ok(formats
            .iter()
            .copied()
            .find(|f| f.format == PREFERRED_SURFACE_FORMAT.format && f.color_space == PREFERRED_SURFACE_FORMAT.color_space)
            .unwrap_or(*first)),
    }
}

/// Pick the present mode: mailbox, then FIFO, then immediate
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> VulkanResult<vk::PresentModeKHR> {
    if modes.is_empty() {
        return Err(VulkanError::SwapchainNegotiation("surface reports no present modes".to_string()));
    }

    let mut best = vk::PresentModeKHR::IMMEDIATE;
    for &mode in modes {
        if mode == vk::PresentModeKHR::MAILBOX {
            return Ok(mode);
        }
        if mode == vk::PresentModeKHR::FIFO {
            best = mode;
        }
    }
    Ok(best)
}

/// Pick the swapchain extent
///
/// `u32::MAX` in the current extent means the window manager lets the
/// application decide; the framebuffer size is used, clamped to the
/// surface limits.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width.max(capabilities.min_image_extent.width),
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height.max(capabilities.min_image_extent.height),
        ),
    }
}

/// One more than the minimum, bounded by the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Swapchain wrapper owning the presentable images' views
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Negotiate with the surface and create the swapchain and its views
    pub fn new(context: &DeviceContext, framebuffer_size: (u32, u32)) -> VulkanResult<Self> {
        let surface = context.surface();
        let physical_device = context.physical_device().device;

        let (capabilities, formats, present_modes) = unsafe {
            let loader = surface.loader();
            (
                loader
                    .get_physical_device_surface_capabilities(physical_device, surface.handle())
                    .map_err(VulkanError::Api)?,
                loader
                    .get_physical_device_surface_formats(physical_device, surface.handle())
                    .map_err(VulkanError::Api)?,
                loader
                    .get_physical_device_surface_present_modes(physical_device, surface.handle())
                    .map_err(VulkanError::Api)?,
            )
        };

        let format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes)?;
        let extent = choose_extent(&capabilities, framebuffer_size);
        let image_count = choose_image_count(&capabilities);
        let (sharing_mode, family_indices) = context.queue_families().sharing();

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = context.swapchain_loader().clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        // From here on Drop owns the swapchain handle
        let mut this = Self {
            loader,
            swapchain,
            images,
            image_views: Vec::new(),
            format,
            present_mode,
            extent,
        };
        this.image_views = Self::create_image_views(context.device(), &this.images, format.format)?;

        log::info!(
            "Swapchain created: {} images, {}x{}, {:?}, {:?}",
            this.images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );

        Ok(this)
    }

    fn create_image_views(device: &Device, images: &[vk::Image], format: vk::Format) -> VulkanResult<Vec<ImageView>> {
        images
            .iter()
            .map(|&image| ImageView::new(device.clone(), image, format, vk::ImageAspectFlags::COLOR, 1))
            .collect()
    }

    /// Acquire the next presentable image, waiting without timeout
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> ash::prelude::VkResult<(u32, bool)> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation after `wait` is signaled
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> ash::prelude::VkResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    /// Swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Views over the presentable images, in image-index order
    pub fn image_views(&self) -> &[ImageView] {
        &self.image_views
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // Views must go before the images they reference
        self.image_views.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Why the swapchain was invalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreationTrigger {
    /// Acquire or present reported `ERROR_OUT_OF_DATE_KHR`
    OutOfDate,
    /// Present reported `SUBOPTIMAL_KHR`
    Suboptimal,
    /// The window reported a framebuffer resize
    Resized,
}

/// Recreation state of the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// Usable for acquire and present
    Active,
    /// Must be rebuilt before the next frame
    Invalidated(RecreationTrigger),
    /// Teardown and rebuild in progress
    Rebuilding,
}

/// Tracks the swapchain recreation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainStatus {
    state: SwapchainState,
}

impl Default for SwapchainStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapchainStatus {
    /// Start in the active state
    pub fn new() -> Self {
        Self {
            state: SwapchainState::Active,
        }
    }

    /// Current state
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Whether frames may be drawn
    pub fn is_active(&self) -> bool {
        self.state == SwapchainState::Active
    }

    /// Mark the swapchain stale; the first trigger is kept if already invalidated
    pub fn invalidate(&mut self, trigger: RecreationTrigger) -> VulkanResult<()> {
        match self.state {
            SwapchainState::Active => {
                self.state = SwapchainState::Invalidated(trigger);
                Ok(())
            }
            SwapchainState::Invalidated(_) => Ok(()),
            SwapchainState::Rebuilding => Err(VulkanError::InvalidOperation {
                reason: format!("swapchain invalidated ({:?}) while rebuilding", trigger),
            }),
        }
    }

    /// Enter the rebuilding state, returning what triggered it
    pub fn begin_rebuild(&mut self) -> VulkanResult<RecreationTrigger> {
        match self.state {
            SwapchainState::Invalidated(trigger) => {
                self.state = SwapchainState::Rebuilding;
                Ok(trigger)
            }
            other => Err(VulkanError::InvalidOperation {
                reason: format!("cannot begin swapchain rebuild from {:?}", other),
            }),
        }
    }

    /// Return to the active state after a successful rebuild
    pub fn finish_rebuild(&mut self) -> VulkanResult<()> {
        if self.state != SwapchainState::Rebuilding {
            return Err(VulkanError::InvalidOperation {
                reason: format!("cannot finish swapchain rebuild from {:?}", self.state),
            });
        }
        self.state = SwapchainState::Active;
        Ok(())
    }

    /// Return to `Invalidated` after a failed rebuild so it can be retried
    pub fn abort_rebuild(&mut self, trigger: RecreationTrigger) {
        self.state = SwapchainState::Invalidated(trigger);
    }
}

/// Outcome of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image ready to render into; suboptimal images are still drawn
    Ready(u32),
    /// Swapchain is out of date; rebuild and skip this frame
    OutOfDate,
    /// Any other failure; skip this frame without rebuilding
    Failed(vk::Result),
}

impl AcquireOutcome {
    /// Classify the raw acquire result
    pub fn from_result(result: ash::prelude::VkResult<(u32, bool)>) -> Self {
        match result {
            Ok((index, _suboptimal)) => Self::Ready(index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Self::OutOfDate,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Decide whether a present result (plus the resize flag) calls for recreation
///
/// A set resize flag requests recreation even when present failed.
pub fn present_trigger(
    result: ash::prelude::VkResult<bool>,
    framebuffer_resized: bool,
) -> VulkanResult<Option<RecreationTrigger>> {
    match result {
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Some(RecreationTrigger::OutOfDate)),
        Ok(true) => Ok(Some(RecreationTrigger::Suboptimal)),
        Ok(false) if framebuffer_resized => Ok(Some(RecreationTrigger::Resized)),
        Ok(false) => Ok(None),
        Err(e) if framebuffer_resized => {
            log::warn!("Present failed ({:?}) after a resize, rebuilding", e);
            Ok(Some(RecreationTrigger::Resized))
        }
        Err(e) => Err(VulkanError::Presentation(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_format_prefers_bgra_unorm_srgb() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[1]);
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn test_single_undefined_format_uses_default() {
        let formats = [fmt(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        assert_eq!(choose_surface_format(&formats).unwrap(), PREFERRED_SURFACE_FORMAT);
    }

    #[test]
    fn test_empty_lists_fail_negotiation() {
        assert!(matches!(choose_surface_format(&[]), Err(VulkanError::SwapchainNegotiation(_))));
        assert!(matches!(choose_present_mode(&[]), Err(VulkanError::SwapchainNegotiation(_))));
    }

    #[test]
    fn test_present_mode_preference() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO, P::IMMEDIATE, P::MAILBOX]).unwrap(), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::MAILBOX, P::FIFO]).unwrap(), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::IMMEDIATE, P::FIFO]).unwrap(), P::FIFO);
        assert_eq!(choose_present_mode(&[P::FIFO_RELAXED]).unwrap(), P::IMMEDIATE);
    }

    #[test]
    fn test_image_count_clamping() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(1, 1)), 1);
    }

    #[test]
    fn test_extent_uses_current_unless_sentinel() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 1024, height: 768 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        };
        assert_eq!(choose_extent(&capabilities, (800, 600)), vk::Extent2D { width: 1024, height: 768 });

        capabilities.current_extent = vk::Extent2D { width: u32::MAX, height: u32::MAX };
        assert_eq!(choose_extent(&capabilities, (800, 600)), vk::Extent2D { width: 800, height: 600 });
        assert_eq!(choose_extent(&capabilities, (9000, 0)), vk::Extent2D { width: 4096, height: 1 });
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut status = SwapchainStatus::new();
        assert!(status.is_active());

        status.invalidate(RecreationTrigger::Resized).unwrap();
        status.invalidate(RecreationTrigger::OutOfDate).unwrap();
        assert_eq!(status.state(), SwapchainState::Invalidated(RecreationTrigger::Resized));

        assert_eq!(status.begin_rebuild().unwrap(), RecreationTrigger::Resized);
        assert_eq!(status.state(), SwapchainState::Rebuilding);

        status.finish_rebuild().unwrap();
        assert!(status.is_active());
    }

    #[test]
    fn test_state_machine_rejects_out_of_order() {
        let mut status = SwapchainStatus::new();
        assert!(status.begin_rebuild().is_err());
        assert!(status.finish_rebuild().is_err());

        status.invalidate(RecreationTrigger::Suboptimal).unwrap();
        assert!(status.finish_rebuild().is_err());

        status.begin_rebuild().unwrap();
        assert!(status.invalidate(RecreationTrigger::OutOfDate).is_err());
        assert!(status.begin_rebuild().is_err());

        status.abort_rebuild(RecreationTrigger::Suboptimal);
        assert_eq!(status.state(), SwapchainState::Invalidated(RecreationTrigger::Suboptimal));
    }

    #[test]
    fn test_acquire_classification() {
        assert_eq!(AcquireOutcome::from_result(Ok((2, false))), AcquireOutcome::Ready(2));
        assert_eq!(AcquireOutcome::from_result(Ok((1, true))), AcquireOutcome::Ready(1));
        assert_eq!(
            AcquireOutcome::from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            AcquireOutcome::OutOfDate
        );
        assert_eq!(
            AcquireOutcome::from_result(Err(vk::Result::ERROR_DEVICE_LOST)),
            AcquireOutcome::Failed(vk::Result::ERROR_DEVICE_LOST)
        );
    }

    #[test]
    fn test_present_trigger() {
        assert_eq!(present_trigger(Ok(false), false).unwrap(), None);
        assert_eq!(present_trigger(Ok(false), true).unwrap(), Some(RecreationTrigger::Resized));
        assert_eq!(present_trigger(Ok(true), false).unwrap(), Some(RecreationTrigger::Suboptimal));
        assert_eq!(
            present_trigger(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), true).unwrap(),
            Some(RecreationTrigger::OutOfDate)
        );
        assert!(matches!(
            present_trigger(Err(vk::Result::ERROR_SURFACE_LOST_KHR), false),
            Err(VulkanError::Presentation(vk::Result::ERROR_SURFACE_LOST_KHR))
        ));
    }

    #[test]
    fn test_resize_flag_wins_over_present_error() {
        assert_eq!(
            present_trigger(Err(vk::Result::ERROR_SURFACE_LOST_KHR), true).unwrap(),
            Some(RecreationTrigger::Resized)
        );
        assert_eq!(
            present_trigger(Err(vk::Result::ERROR_DEVICE_LOST), true).unwrap(),
            Some(RecreationTrigger::Resized)
        );
    }
}
