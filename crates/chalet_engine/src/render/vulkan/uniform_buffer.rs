//! Per-image uniform buffers holding the model/view/projection matrices

use ash::{vk, Device};
use std::mem::size_of;

use crate::foundation::math::{look_at, perspective_zo, rotation_z, utils::deg_to_rad, Mat4, Point3, Vec3};
use crate::render::vulkan::{GpuBuffer, VulkanError, VulkanResult};

/// Model rotation speed about +Z, in degrees per second
pub const ROTATION_DEGREES_PER_SEC: f32 = 30.0;
/// Vertical field of view in degrees
pub const FOV_Y_DEGREES: f32 = 45.0;
/// Near clip distance
pub const Z_NEAR: f32 = 0.1;
/// Far clip distance
pub const Z_FAR: f32 = 10.0;

/// Matrices consumed by the vertex shader, column-major
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBufferObject {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to camera
    pub view: [[f32; 4]; 4],
    /// Camera to clip, Y flipped for Vulkan
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Matrices for `elapsed_secs` since start, rendering into `extent`
    pub fn compute(elapsed_secs: f32, extent: vk::Extent2D) -> Self {
        let model = rotation_z(elapsed_secs * deg_to_rad(ROTATION_DEGREES_PER_SEC));
        let view = look_at(
            Point3::new(2.0, 2.0, 2.0),
            Point3::origin(),
            Vec3::new(0.0, 0.0, 1.0),
        );

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let mut proj = perspective_zo(deg_to_rad(FOV_Y_DEGREES), aspect, Z_NEAR, Z_FAR);
        proj[(1, 1)] *= -1.0;

        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }

    /// Model matrix as nalgebra type
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from(self.model)
    }

    /// View matrix as nalgebra type
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from(self.view)
    }

    /// Projection matrix as nalgebra type
    pub fn proj_matrix(&self) -> Mat4 {
        Mat4::from(self.proj)
    }
}

/// One host-visible uniform buffer per swapchain image
pub struct UniformBuffers {
    buffers: Vec<GpuBuffer>,
}

impl UniformBuffers {
    /// Create `count` buffers sized for one [`UniformBufferObject`]
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        count: usize,
    ) -> VulkanResult<Self> {
        let buffers = (0..count)
            .map(|_| {
                GpuBuffer::host_visible(
                    device.clone(),
                    memory_properties,
                    Self::range(),
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { buffers })
    }

    /// Bytes bound per descriptor
    pub fn range() -> vk::DeviceSize {
        size_of::<UniformBufferObject>() as vk::DeviceSize
    }

    /// Overwrite the buffer for `image_index`
    pub fn update(&self, image_index: usize, ubo: &UniformBufferObject) -> VulkanResult<()> {
        self.buffers
            .get(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no uniform buffer for image {}", image_index),
            })?
            .write_data(std::slice::from_ref(ubo))
    }

    /// Buffer handles in image-index order
    pub fn handles(&self) -> impl Iterator<Item = vk::Buffer> + '_ {
        self.buffers.iter().map(GpuBuffer::handle)
    }

    /// Number of buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether there are none
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_ubo_layout() {
        assert_eq!(size_of::<UniformBufferObject>(), 3 * 64);
    }

    #[test]
    fn test_ubo_at_time_zero() {
        let ubo = UniformBufferObject::compute(0.0, extent(800, 600));

        assert_relative_eq!(ubo.model_matrix(), Mat4::identity(), epsilon = EPSILON);

        // Rows are side, up and -forward for eye (2,2,2), target 0, up +Z
        let (r2, r3, r6) = (2.0f32.sqrt(), 3.0f32.sqrt(), 6.0f32.sqrt());
        let expected_view = Mat4::new(
            -1.0 / r2, 1.0 / r2, 0.0, 0.0,
            -1.0 / r6, -1.0 / r6, 2.0 / r6, 0.0,
            1.0 / r3, 1.0 / r3, 1.0 / r3, -(12.0f32).sqrt(),
            0.0, 0.0, 0.0, 1.0,
        );
        assert_relative_eq!(ubo.view_matrix(), expected_view, epsilon = EPSILON);

        let origin_eye = ubo.view_matrix() * crate::foundation::math::Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin_eye.z, -(12.0f32).sqrt(), epsilon = EPSILON);

        let f = 1.0 / (deg_to_rad(FOV_Y_DEGREES) * 0.5).tan();
        let proj = ubo.proj_matrix();
        assert_relative_eq!(proj[(0, 0)], f / (800.0 / 600.0), epsilon = EPSILON);
        assert_relative_eq!(proj[(1, 1)], -f, epsilon = EPSILON);
        assert_relative_eq!(proj[(2, 2)], Z_FAR / (Z_NEAR - Z_FAR), epsilon = EPSILON);
        assert_relative_eq!(proj[(2, 3)], Z_NEAR * Z_FAR / (Z_NEAR - Z_FAR), epsilon = EPSILON);
        assert_relative_eq!(proj[(3, 2)], -1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_model_rotates_thirty_degrees_per_second() {
        let ubo = UniformBufferObject::compute(3.0, extent(800, 600));
        let expected = rotation_z(deg_to_rad(90.0));
        assert_relative_eq!(ubo.model_matrix(), expected, epsilon = EPSILON);

        // +X maps to +Y after a quarter turn
        let x = ubo.model_matrix() * crate::foundation::math::Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(x.y, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_aspect_follows_extent() {
        let wide = UniformBufferObject::compute(0.0, extent(1600, 400));
        let tall = UniformBufferObject::compute(0.0, extent(400, 1600));
        assert_relative_eq!(wide.proj_matrix()[(0, 0)] * 16.0, tall.proj_matrix()[(0, 0)], epsilon = EPSILON);
    }
}
