//! Vulkan backend
//!
//! RAII wrappers for every GPU object plus the [`ModelRenderer`] that owns
//! them. Creation order runs leaf-first (context, transfers, swapchain,
//! pipeline, frame loop); destruction runs in reverse through field order.

pub mod error;
pub mod window;
pub mod context;
pub mod swapchain;
pub mod buffer;
pub mod image;
pub mod commands;
pub mod transfer;
pub mod texture;
pub mod attachments;
pub mod render_pass;
pub mod framebuffer;
pub mod shader;
pub mod vertex_layout;
pub mod descriptor_set;
pub mod uniform_buffer;
pub mod sync;
pub mod renderer;

// Re-export commonly used types
pub use error::{VulkanError, VulkanResult};
pub use window::{Window, WindowError};
pub use context::{DeviceContext, LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, Surface, VulkanInstance};
pub use swapchain::{AcquireOutcome, RecreationTrigger, Swapchain, SwapchainState, SwapchainStatus};
pub use buffer::GpuBuffer;
pub use image::{GpuImage, ImageDesc, ImageView, PendingTransition};
pub use commands::{CommandBuffers, CommandPool, CommandRecorder};
pub use transfer::TransferContext;
pub use texture::Texture;
pub use attachments::RenderTargets;
pub use render_pass::RenderPass;
pub use framebuffer::Framebuffers;
pub use shader::{GraphicsPipeline, ShaderModule};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout};
pub use uniform_buffer::{UniformBufferObject, UniformBuffers};
pub use sync::{Fence, FrameCounter, FrameSync, FrameSyncSet, Semaphore, SubmitOutcome, MAX_FRAMES_IN_FLIGHT};
pub use renderer::ModelRenderer;
