//! Vulkan error taxonomy

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No physical device met the selection requirements
    #[error("No suitable GPU found (need discrete GPU, anisotropy, tessellation, swapchain support, graphics and present queues)")]
    NoSuitableDevice,

    /// Surface reported nothing usable to negotiate with
    #[error("Swapchain negotiation failed: {0}")]
    SwapchainNegotiation(String),

    /// No memory type matched the requirement mask and property flags
    #[error("No suitable memory type found (type filter {type_filter:#034b}, required {properties:?})")]
    NoSuitableMemoryType {
        /// Memory type bits allowed by the resource
        type_filter: u32,
        /// Property flags requested by the caller
        properties: vk::MemoryPropertyFlags,
    },

    /// Format lacks features required for an operation
    #[error("Format {format:?} does not support {features:?} with {tiling:?} tiling")]
    UnsupportedFormat {
        /// Format that was checked (`UNDEFINED` when a candidate list was exhausted)
        format: vk::Format,
        /// Tiling mode that was checked
        tiling: vk::ImageTiling,
        /// Features that were required
        features: vk::FormatFeatureFlags,
    },

    /// Layout pair outside the supported transition table
    #[error("Unsupported layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
    },

    /// Shader bytecode was rejected before or during module creation
    #[error("Shader module error: {0}")]
    ShaderModule(String),

    /// Pipeline layout or pipeline creation failed
    #[error("Pipeline creation failed: {0:?}")]
    PipelineCreation(vk::Result),

    /// A model, texture or shader file could not be read
    #[error("Failed to load {path}: {reason}")]
    FileIo {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Acquire, submit or present failed for a reason other than out-of-date/suboptimal
    #[error("Presentation error: {0:?}")]
    Presentation(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

impl VulkanError {
    /// Build a [`VulkanError::FileIo`] from any displayable error
    pub fn file_io(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::FileIo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_error_reports_filter_and_flags() {
        let err = VulkanError::NoSuitableMemoryType {
            type_filter: 0b1010,
            properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        };
        let message = err.to_string();
        assert!(message.contains("1010"));
        assert!(message.contains("DEVICE_LOCAL"));
    }

    #[test]
    fn test_format_error_reports_tiling() {
        let err = VulkanError::UnsupportedFormat {
            format: vk::Format::R8G8B8A8_UNORM,
            tiling: vk::ImageTiling::OPTIMAL,
            features: vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
        };
        let message = err.to_string();
        assert!(message.contains("R8G8B8A8_UNORM"));
        assert!(message.contains("OPTIMAL"));
    }
}
