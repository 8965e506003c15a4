//! Synchronous staged uploads
//!
//! Every operation records into a one-shot command buffer, submits it to
//! the graphics queue and blocks until the queue is idle before returning.

use ash::{vk, Device};
use bytemuck::Pod;

use crate::render::vulkan::{
    CommandPool, CommandRecorder, DeviceContext, GpuBuffer, GpuImage, VulkanError, VulkanResult,
};

/// One-shot command submission and staging helpers
pub struct TransferContext<'a> {
    device: &'a Device,
    queue: vk::Queue,
    pool: &'a CommandPool,
    memory_properties: &'a vk::PhysicalDeviceMemoryProperties,
}

impl<'a> TransferContext<'a> {
    /// Borrow the graphics queue and `pool` for transfers
    pub fn new(context: &'a DeviceContext, pool: &'a CommandPool) -> Self {
        Self {
            device: context.device(),
            queue: context.graphics_queue(),
            pool,
            memory_properties: &context.physical_device().memory_properties,
        }
    }

    /// Memory properties used for allocations
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        self.memory_properties
    }

    /// Device the transfers run on
    pub fn device(&self) -> &Device {
        self.device
    }

    /// Record with `record`, submit, and wait for the queue to drain
    ///
    /// The command buffer is freed whether or not recording succeeds. The
    /// value `record` returns is handed back only once the work completed.
    pub fn one_shot<T, F>(&self, record: F) -> VulkanResult<T>
    where
        F: FnOnce(vk::CommandBuffer) -> VulkanResult<T>,
    {
        let command_buffers = self.pool.allocate_command_buffers(1)?;
        let result = self.record_and_submit(command_buffers[0], record);
        self.pool.free_command_buffers(&command_buffers);
        result
    }

    fn record_and_submit<T, F>(&self, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<T>
    where
        F: FnOnce(vk::CommandBuffer) -> VulkanResult<T>,
    {
        let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        let recorded = record(recorder.handle())?;
        let command_buffer = recorder.end()?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device
                .queue_wait_idle(self.queue)
                .map_err(VulkanError::Api)?;
        }
        Ok(recorded)
    }

    /// Host-visible buffer filled with `data`, usable as a copy source
    pub fn staging_buffer<T: Pod>(&self, data: &[T]) -> VulkanResult<GpuBuffer> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot stage an empty upload".to_string(),
            });
        }

        let staging = GpuBuffer::host_visible(
            self.device.clone(),
            self.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )?;
        staging.write_data(data)?;
        Ok(staging)
    }

    /// Upload `data` into a new device-local buffer with `usage`
    pub fn upload_buffer<T: Pod>(&self, data: &[T], usage: vk::BufferUsageFlags) -> VulkanResult<GpuBuffer> {
        let staging = self.staging_buffer(data)?;
        let size = staging.size();

        let buffer = GpuBuffer::new(
            self.device.clone(),
            self.memory_properties,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.one_shot(|command_buffer| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            unsafe {
                self.device.cmd_copy_buffer(command_buffer, staging.handle(), buffer.handle(), &[region]);
            }
            Ok(())
        })?;

        log::debug!("Uploaded {} bytes ({:?})", size, usage);
        Ok(buffer)
    }

    /// Transition `image` to `new_layout` in its own submission
    ///
    /// The tracked layout changes only after the submission has completed.
    pub fn transition_layout(&self, image: &mut GpuImage, new_layout: vk::ImageLayout) -> VulkanResult<()> {
        let pending = self.one_shot(|command_buffer| image.record_transition(command_buffer, new_layout))?;
        image.commit_transition(pending)
    }
}
