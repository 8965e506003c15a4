//! Vulkan device context
//!
//! Owns the instance (with the optional validation messenger), the window
//! surface, the selected physical device and the logical device with its
//! graphics and present queues. Everything here is created once at startup
//! and destroyed last.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{c_char, CStr, CString};

use crate::core::config::RendererConfig;
use crate::render::vulkan::{VulkanError, VulkanResult, Window};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, with validation when requested and available
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {}", e)))?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"ChaletEngine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.get_required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;

        let mut extension_names = required_extensions
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {}", e)))?;

        let enable_validation = config.validation_enabled() && Self::validation_layer_available(&entry)?;
        if enable_validation {
            extension_names.push(DebugUtils::name().to_owned());
        }

        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|ext| ext.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug_utils = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    // Diagnostics only; rendering proceeds without the messenger
                    log::warn!("Debug messenger unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        log::debug!("Vulkan instance created (validation: {})", debug_utils.is_some());

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
        let found = layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER
        });
        if !found {
            log::warn!("{:?} requested but not installed, continuing without validation", VALIDATION_LAYER);
        }
        Ok(found)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = &self.debug_utils {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Presentation surface with RAII cleanup
pub struct Surface {
    loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create the window's surface
    pub fn new(instance: &VulkanInstance, window: &mut Window) -> VulkanResult<Self> {
        let loader = SurfaceLoader::new(instance.entry(), instance.instance());
        let surface = window.create_vulkan_surface(instance.instance().handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;
        Ok(Self { loader, surface })
    }

    /// Surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn loader(&self) -> &SurfaceLoader {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Graphics and present queue family indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family with graphics capability and a nonzero queue count
    pub graphics: u32,
    /// First family that can present to the surface
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Pick the first graphics family and the first present family independently
    ///
    /// `supports_present` is asked about each family index in order until one
    /// answers yes. Returns `None` when either role has no family.
    pub fn select<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> VulkanResult<Option<Self>>
    where
        F: FnMut(u32) -> VulkanResult<bool>,
    {
        let graphics = families
            .iter()
            .position(|family| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS));

        let mut present = None;
        for index in 0..families.len() as u32 {
            if supports_present(index)? {
                present = Some(index);
                break;
            }
        }

        Ok(match (graphics, present) {
            (Some(graphics), Some(present)) => Some(Self {
                graphics: graphics as u32,
                present,
            }),
            _ => None,
        })
    }

    /// Distinct family indices, one queue is created per entry
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Sharing mode and family list for resources used by both queues
    pub fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.graphics == self.present {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, vec![self.graphics, self.present])
        }
    }
}

/// Whether the device class and feature set meet the renderer's needs
pub fn meets_feature_requirements(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
) -> bool {
    properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
        && features.sampler_anisotropy == vk::TRUE
        && features.tessellation_shader == vk::TRUE
}

/// Whether every required extension name appears in `available`
pub fn supports_extensions(available: &[vk::ExtensionProperties], required: &[&CStr]) -> bool {
    required.iter().all(|required| {
        available.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == *required
        })
    })
}

/// Highest sample count usable for both color and depth attachments
pub fn max_usable_sample_count(
    color: vk::SampleCountFlags,
    depth: vk::SampleCountFlags,
) -> vk::SampleCountFlags {
    let counts = color & depth;
    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&count| counts.contains(count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Selected queue families
    pub queue_families: QueueFamilyIndices,
    /// Maximum sample count for multisampled color and depth
    pub msaa_samples: vk::SampleCountFlags,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device meeting every requirement
    pub fn select_suitable_device(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        if devices.is_empty() {
            log::error!("No Vulkan physical devices found");
        }

        for device in devices {
            if let Some(device_info) = Self::evaluate_device(instance, device, surface)? {
                log::info!(
                    "Selected GPU: {} (MSAA {:?})",
                    device_info.name(),
                    device_info.msaa_samples
                );
                return Ok(device_info);
            }
        }

        Err(VulkanError::NoSuitableDevice)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: &Surface,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

        if !meets_feature_requirements(&properties, &features) {
            log::debug!("Skipping {}: device type or features insufficient", name);
            return Ok(None);
        }

        let extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        if !supports_extensions(&extensions, &[SwapchainLoader::name()]) {
            log::debug!("Skipping {}: VK_KHR_swapchain not supported", name);
            return Ok(None);
        }

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_families = QueueFamilyIndices::select(&families, |index| unsafe {
            surface.loader()
                .get_physical_device_surface_support(device, index, surface.handle())
                .map_err(VulkanError::Api)
        })?;
        let Some(queue_families) = queue_families else {
            log::debug!("Skipping {}: missing graphics or present queue family", name);
            return Ok(None);
        };

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let msaa_samples = max_usable_sample_count(
            properties.limits.framebuffer_color_sample_counts,
            properties.limits.framebuffer_depth_sample_counts,
        );

        Ok(Some(Self {
            device,
            properties,
            memory_properties,
            queue_families,
            msaa_samples,
        }))
    }

    /// Human-readable device name
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the logical device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device_info.queue_families;
        let priorities = [1.0];

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance.create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Logical device created (graphics family {}, present family {})",
            families.graphics,
            families.present
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Device context: instance, surface, physical and logical device
///
/// Fields drop in declaration order: device, then surface, then instance.
pub struct DeviceContext {
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: Surface,
    instance: VulkanInstance,
}

impl DeviceContext {
    /// Create the full device context for a window
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;
        let surface = Surface::new(&instance, window)?;
        let physical_device = PhysicalDeviceInfo::select_suitable_device(instance.instance(), &surface)?;
        let device = LogicalDevice::new(instance.instance(), &physical_device)?;

        Ok(Self {
            device,
            physical_device,
            surface,
            instance,
        })
    }

    /// Raw logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Raw instance
    pub fn instance(&self) -> &Instance {
        self.instance.instance()
    }

    /// Selected physical device information
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Presentation surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Selected queue families
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families
    }

    /// Maximum usable MSAA sample count
    pub fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.physical_device.msaa_samples
    }

    /// Format properties of the selected physical device
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance()
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    /// First candidate format supporting `features` with `tiling`
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> VulkanResult<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| tiling_features(&self.format_properties(format), tiling).contains(features))
            .ok_or(VulkanError::UnsupportedFormat {
                format: vk::Format::UNDEFINED,
                tiling,
                features,
            })
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device().device_wait_idle().map_err(VulkanError::Api) }
    }
}

/// Features a format supports for the given tiling mode
pub fn tiling_features(properties: &vk::FormatProperties, tiling: vk::ImageTiling) -> vk::FormatFeatureFlags {
    if tiling == vk::ImageTiling::LINEAR {
        properties.linear_tiling_features
    } else {
        properties.optimal_tiling_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, &src) in props.extension_name.iter_mut().zip(name.to_bytes_with_nul()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn test_queue_families_pick_first_of_each_independently() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 0),
            family(vk::QueueFlags::GRAPHICS, 2),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let indices = QueueFamilyIndices::select(&families, |i| Ok(i == 0 || i == 3))
            .unwrap()
            .unwrap();

        // Family 1 has graphics but no queues
        assert_eq!(indices.graphics, 2);
        assert_eq!(indices.present, 0);
        assert_eq!(indices.unique(), vec![2, 0]);
        assert_eq!(indices.sharing(), (vk::SharingMode::CONCURRENT, vec![2, 0]));
    }

    #[test]
    fn test_shared_family_is_exclusive() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let indices = QueueFamilyIndices::select(&families, |_| Ok(true)).unwrap().unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 0 });
        assert_eq!(indices.unique(), vec![0]);
        assert_eq!(indices.sharing(), (vk::SharingMode::EXCLUSIVE, Vec::new()));
    }

    #[test]
    fn test_missing_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        assert!(QueueFamilyIndices::select(&families, |_| Ok(false)).unwrap().is_none());
    }

    #[test]
    fn test_present_query_error_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let result = QueueFamilyIndices::select(&families, |_| Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR)));
        assert!(matches!(result, Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))));
    }

    #[test]
    fn test_feature_requirements() {
        let mut properties = vk::PhysicalDeviceProperties {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            ..Default::default()
        };
        let mut features = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: vk::TRUE,
            tessellation_shader: vk::TRUE,
            ..Default::default()
        };
        assert!(meets_feature_requirements(&properties, &features));

        features.tessellation_shader = vk::FALSE;
        assert!(!meets_feature_requirements(&properties, &features));

        features.tessellation_shader = vk::TRUE;
        properties.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        assert!(!meets_feature_requirements(&properties, &features));
    }

    #[test]
    fn test_extension_support() {
        let available = [extension(c"VK_KHR_maintenance1"), extension(SwapchainLoader::name())];
        assert!(supports_extensions(&available, &[SwapchainLoader::name()]));
        assert!(!supports_extensions(&available[..1], &[SwapchainLoader::name()]));
    }

    #[test]
    fn test_max_usable_sample_count_uses_common_bits() {
        let color = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_8;
        let depth = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_4;
        assert_eq!(max_usable_sample_count(color, depth), vk::SampleCountFlags::TYPE_2);

        let all = vk::SampleCountFlags::from_raw(0x7F);
        assert_eq!(max_usable_sample_count(all, all), vk::SampleCountFlags::TYPE_64);
        assert_eq!(
            max_usable_sample_count(vk::SampleCountFlags::TYPE_1, all),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn test_tiling_features_selects_by_tiling() {
        let properties = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::TRANSFER_SRC,
            optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert_eq!(
            tiling_features(&properties, vk::ImageTiling::OPTIMAL),
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
        );
        assert_eq!(
            tiling_features(&properties, vk::ImageTiling::LINEAR),
            vk::FormatFeatureFlags::TRANSFER_SRC
        );
    }
}
