//! Synchronization primitives and per-frame-in-flight sets

use ash::{vk, Device};
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// GPU-GPU synchronization primitive
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device.create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Replace the semaphore with a new unsignaled one
    pub fn recreate(&mut self) -> VulkanResult<()> {
        *self = Self::new(self.device.clone())?;
        Ok(())
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device.create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait for the fence without a timeout
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device.wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device.reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Replace the fence with a new signaled one
    pub fn recreate_signaled(&mut self) -> VulkanResult<()> {
        *self = Self::new(self.device.clone(), true)?;
        Ok(())
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame in flight
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: Semaphore,
    /// Signaled when rendering into the image has finished
    pub render_finished: Semaphore,
    /// Signaled when the frame's submission completes; created signaled
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Restore the slot after a frame was dropped between acquire and submit
    ///
    /// The acquire left `image_available` signaled and the reset left
    /// `in_flight` unsignaled with no work to signal it. The device must be
    /// idle.
    pub fn recover_dropped_frame(&mut self) -> VulkanResult<()> {
        self.image_available.recreate()?;
        self.in_flight.recreate_signaled()
    }
}

/// What a queue submission left behind for its frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Work is queued and the slot's fence will signal
    Submitted,
    /// Nothing was queued; the slot must be recovered before reuse
    Dropped(vk::Result),
}

impl SubmitOutcome {
    /// Classify a `vkQueueSubmit` result
    pub fn from_result(result: ash::prelude::VkResult<()>) -> Self {
        match result {
            Ok(()) => Self::Submitted,
            Err(e) => Self::Dropped(e),
        }
    }

    /// Whether [`FrameSync::recover_dropped_frame`] has to run for the slot
    pub fn needs_recovery(self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

/// One [`FrameSync`] per frame slot, indexed by [`FrameCounter`]
pub struct FrameSyncSet {
    frames: Vec<FrameSync>,
}

impl FrameSyncSet {
    /// Create `MAX_FRAMES_IN_FLIGHT` slots
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { frames })
    }

    /// Objects for `slot`
    pub fn get(&self, slot: usize) -> &FrameSync {
        &self.frames[slot % MAX_FRAMES_IN_FLIGHT]
    }

    /// Mutable objects for `slot`
    pub fn get_mut(&mut self, slot: usize) -> &mut FrameSync {
        &mut self.frames[slot % MAX_FRAMES_IN_FLIGHT]
    }
}

/// Rotating frame-slot index, independent of the swapchain image index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
}

impl FrameCounter {
    /// Start at slot 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for the frame being drawn
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move to the next slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_counter_rotation() {
        let mut counter = FrameCounter::new();
        for k in 0..7 {
            assert_eq!(counter.current(), k % MAX_FRAMES_IN_FLIGHT);
            counter.advance();
        }
        assert_eq!(counter.current(), 7 % 2);
    }

    #[test]
    fn test_failed_submit_needs_slot_recovery() {
        let submitted = SubmitOutcome::from_result(Ok(()));
        assert_eq!(submitted, SubmitOutcome::Submitted);
        assert!(!submitted.needs_recovery());

        for error in [vk::Result::ERROR_OUT_OF_HOST_MEMORY, vk::Result::ERROR_DEVICE_LOST] {
            let dropped = SubmitOutcome::from_result(Err(error));
            assert_eq!(dropped, SubmitOutcome::Dropped(error));
            assert!(dropped.needs_recovery());
        }
    }
}
