//! Model renderer: owns every GPU object and drives the frame loop
//!
//! State is split by lifetime. [`DeviceLifetimeState`] is created once and
//! survives swapchain recreation; [`SurfaceDependentState`] is dropped and
//! rebuilt as a unit whenever the swapchain is invalidated. Per-image
//! uniform buffers and descriptor sets live with the device state but are
//! rebuilt wholesale if a recreation changes the image count.

use ash::vk;
use std::path::PathBuf;

use crate::assets::{self, ImageData};
use crate::core::config::ApplicationConfig;
use crate::foundation::time::Clock;
use crate::render::vulkan::attachments::find_depth_format;
use crate::render::vulkan::descriptor_set::write_model_set;
use crate::render::vulkan::{
    AcquireOutcome, CommandBuffers, CommandPool, DescriptorPool, DescriptorSetLayout, DeviceContext,
    FrameCounter, FrameSyncSet, Framebuffers, GpuBuffer, GraphicsPipeline, RecreationTrigger,
    RenderPass, RenderTargets, SubmitOutcome, Swapchain, SwapchainStatus, Texture, TransferContext,
    UniformBufferObject, UniformBuffers, VulkanError, VulkanResult, Window,
};
use crate::render::vulkan::swapchain::present_trigger;

/// Clear color for the multisampled target
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Uniform buffers and descriptor sets, one of each per swapchain image
struct PerImageBindings {
    descriptor_sets: Vec<vk::DescriptorSet>,
    descriptor_pool: DescriptorPool,
    uniform_buffers: UniformBuffers,
}

impl PerImageBindings {
    fn new(
        context: &DeviceContext,
        layout: &DescriptorSetLayout,
        texture: &Texture,
        image_count: usize,
    ) -> VulkanResult<Self> {
        let set_count = u32::try_from(image_count).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("{} swapchain images", image_count),
        })?;

        let uniform_buffers = UniformBuffers::new(
            context.device(),
            &context.physical_device().memory_properties,
            image_count,
        )?;
        let descriptor_pool = DescriptorPool::new(context.device().clone(), set_count)?;
        let descriptor_sets = descriptor_pool.allocate_sets(layout)?;

        for (&set, buffer) in descriptor_sets.iter().zip(uniform_buffers.handles()) {
            write_model_set(
                context.device(),
                set,
                buffer,
                UniformBuffers::range(),
                texture.view(),
                texture.sampler(),
            );
        }

        log::debug!("Per-image bindings created for {} images", image_count);

        Ok(Self {
            descriptor_sets,
            descriptor_pool,
            uniform_buffers,
        })
    }

    fn len(&self) -> usize {
        self.descriptor_pool.max_sets() as usize
    }
}

/// Objects that live from startup to teardown
struct DeviceLifetimeState {
    bindings: Option<PerImageBindings>,
    descriptor_set_layout: DescriptorSetLayout,
    texture: Texture,
    index_buffer: GpuBuffer,
    vertex_buffer: GpuBuffer,
    index_count: u32,
    frame_sync: FrameSyncSet,
    command_pool: CommandPool,
    depth_format: vk::Format,
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
}

impl DeviceLifetimeState {
    fn new(context: &DeviceContext, config: &ApplicationConfig) -> VulkanResult<Self> {
        let command_pool = CommandPool::new(context.device().clone(), context.queue_families().graphics)?;
        let transfer = TransferContext::new(context, &command_pool);

        let mesh = assets::load_model(&config.assets)
            .map_err(|e| VulkanError::file_io(config.assets.model_cache_path(), e))?;
        if mesh.indices.is_empty() || !mesh.indices_in_bounds() {
            return Err(VulkanError::file_io(
                config.assets.model_cache_path(),
                "model has no triangles or indices out of range",
            ));
        }
        log::info!(
            "Model loaded: {} vertices, {} triangles",
            mesh.vertices.len(),
            mesh.triangle_count()
        );

        let texture_path = config.assets.texture_path();
        let pixels = ImageData::from_file(&texture_path)
            .map_err(|e| VulkanError::file_io(&texture_path, e))?;

        let vertex_buffer = transfer.upload_buffer(&mesh.vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = transfer.upload_buffer(&mesh.indices, vk::BufferUsageFlags::INDEX_BUFFER)?;
        let index_count = u32::try_from(mesh.indices.len()).map_err(|_| {
            VulkanError::file_io(config.assets.model_cache_path(), "too many indices for one draw")
        })?;
        let texture = Texture::from_image_data(context, &transfer, &pixels)?;
        log::info!(
            "Texture uploaded: {}x{}, {} mip levels",
            texture.image().extent().width,
            texture.image().extent().height,
            texture.image().mip_levels()
        );

        let descriptor_set_layout = DescriptorSetLayout::new_model(context.device().clone())?;
        let frame_sync = FrameSyncSet::new(context.device())?;
        let depth_format = find_depth_format(context)?;

        Ok(Self {
            bindings: None,
            descriptor_set_layout,
            texture,
            index_buffer,
            vertex_buffer,
            index_count,
            frame_sync,
            command_pool,
            depth_format,
            vertex_shader: PathBuf::from(&config.renderer.shaders.vertex_shader_path),
            fragment_shader: PathBuf::from(&config.renderer.shaders.fragment_shader_path),
        })
    }

    /// Make sure there is exactly one binding set per swapchain image
    fn ensure_bindings(&mut self, context: &DeviceContext, image_count: usize) -> VulkanResult<()> {
        let stale = self.bindings.as_ref().map_or(true, |b| b.len() != image_count);
        if stale {
            if let Some(old) = &self.bindings {
                log::info!("Swapchain image count changed {} -> {}", old.len(), image_count);
            }
            self.bindings = None;
            self.bindings = Some(PerImageBindings::new(
                context,
                &self.descriptor_set_layout,
                &self.texture,
                image_count,
            )?);
        }
        Ok(())
    }
}

/// Objects rebuilt on every swapchain recreation
///
/// Fields drop in declaration order. The swapchain's image views drop
/// together with the swapchain, after the color and depth targets.
struct SurfaceDependentState {
    framebuffers: Framebuffers,
    command_buffers: CommandBuffers,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    targets: RenderTargets,
    swapchain: Swapchain,
}

impl SurfaceDependentState {
    fn new(
        context: &DeviceContext,
        device_state: &mut DeviceLifetimeState,
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<Self> {
        let device = context.device();
        let swapchain = Swapchain::new(context, framebuffer_size)?;
        let extent = swapchain.extent();
        let color_format = swapchain.format().format;
        let samples = context.msaa_samples();

        device_state.ensure_bindings(context, swapchain.image_count())?;
        let device_state = &*device_state;

        let render_pass = RenderPass::new(device.clone(), color_format, device_state.depth_format, samples)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            &device_state.vertex_shader,
            &device_state.fragment_shader,
            device_state.descriptor_set_layout.handle(),
            extent,
            samples,
        )?;

        let transfer = TransferContext::new(context, &device_state.command_pool);
        let targets = RenderTargets::new(context, &transfer, extent, color_format, device_state.depth_format)?;
        let framebuffers = Framebuffers::new(device.clone(), render_pass.handle(), &swapchain, &targets)?;
        let command_buffers = CommandBuffers::allocate(&device_state.command_pool, swapchain.image_count())?;

        let state = Self {
            framebuffers,
            command_buffers,
            pipeline,
            render_pass,
            targets,
            swapchain,
        };
        state.record_command_buffers(device_state)?;
        Ok(state)
    }

    /// Record the static draw for every swapchain image
    fn record_command_buffers(&self, device_state: &DeviceLifetimeState) -> VulkanResult<()> {
        let bindings = device_state.bindings.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "recording before per-image bindings exist".to_string(),
        })?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.swapchain.extent(),
        };

        for (index, &descriptor_set) in bindings.descriptor_sets.iter().enumerate() {
            let framebuffer = self.framebuffers.get(index).ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for image {}", index),
            })?;

            let mut recorder = self.command_buffers.recorder(index)?;
            recorder.begin(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)?;
            {
                let mut pass = recorder.begin_render_pass(
                    self.render_pass.handle(),
                    framebuffer,
                    render_area,
                    &clear_values,
                )?;
                pass.bind_pipeline(self.pipeline.handle());
                pass.bind_vertex_buffer(device_state.vertex_buffer.handle());
                pass.bind_index_buffer(device_state.index_buffer.handle());
                pass.bind_descriptor_set(self.pipeline.layout(), descriptor_set);
                pass.draw_indexed(device_state.index_count);
            }
            recorder.end()?;
        }

        log::debug!("Recorded {} command buffers", self.command_buffers.len());
        Ok(())
    }
}

/// Renders one textured model with two frames in flight
pub struct ModelRenderer {
    surface_state: Option<SurfaceDependentState>,
    device_state: DeviceLifetimeState,
    context: DeviceContext,
    status: SwapchainStatus,
    frames: FrameCounter,
    clock: Clock,
}

impl ModelRenderer {
    /// Build the full renderer for `window`
    ///
    /// Any failure aborts; whatever was already created is released in
    /// reverse order.
    pub fn new(window: &mut Window, config: &ApplicationConfig) -> VulkanResult<Self> {
        let context = DeviceContext::new(window, &config.renderer)?;
        let mut device_state = DeviceLifetimeState::new(&context, config)?;
        let framebuffer_size = window.wait_for_nonzero_framebuffer();
        let surface_state = SurfaceDependentState::new(&context, &mut device_state, framebuffer_size)?;

        log::info!("Renderer initialized");

        Ok(Self {
            surface_state: Some(surface_state),
            device_state,
            context,
            status: SwapchainStatus::new(),
            frames: FrameCounter::new(),
            clock: Clock::new(),
        })
    }

    /// Draw and present one frame
    ///
    /// Out-of-date and suboptimal swapchains are rebuilt here. Acquire,
    /// submit and present failures are logged and the frame is dropped.
    pub fn draw_frame(&mut self, window: &mut Window) -> VulkanResult<()> {
        if !self.status.is_active() || self.surface_state.is_none() {
            return self.recreate_swapchain(window);
        }

        let slot = self.frames.current();
        let sync = self.device_state.frame_sync.get(slot);
        sync.in_flight.wait()?;

        let Some(state) = self.surface_state.as_ref() else {
            return Ok(());
        };

        let image_index = match AcquireOutcome::from_result(
            state.swapchain.acquire_next_image(sync.image_available.handle()),
        ) {
            AcquireOutcome::Ready(index) => index,
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date on acquire");
                self.status.invalidate(RecreationTrigger::OutOfDate)?;
                return self.recreate_swapchain(window);
            }
            AcquireOutcome::Failed(e) => {
                log::error!("Failed to acquire swapchain image ({:?}), frame dropped", e);
                return Ok(());
            }
        };

        // Only reset once work is certain to be submitted with this fence
        sync.in_flight.reset()?;

        let image = image_index as usize;
        let ubo = UniformBufferObject::compute(self.clock.elapsed_secs(), state.swapchain.extent());
        self.device_state
            .bindings
            .as_ref()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "drawing before per-image bindings exist".to_string(),
            })?
            .uniform_buffers
            .update(image, &ubo)?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [state.command_buffers.get(image)?];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let submitted = SubmitOutcome::from_result(unsafe {
            self.context.device().queue_submit(
                self.context.graphics_queue(),
                &[submit_info.build()],
                sync.in_flight.handle(),
            )
        });
        if let SubmitOutcome::Dropped(e) = submitted {
            log::error!("Queue submit failed ({:?}), frame dropped", e);
            self.context.wait_idle()?;
            self.device_state.frame_sync.get_mut(slot).recover_dropped_frame()?;
            return Ok(());
        }

        let present_result = state.swapchain.present(
            self.context.present_queue(),
            image_index,
            sync.render_finished.handle(),
        );
        let resized = window.take_framebuffer_resized();

        self.frames.advance();

        match present_trigger(present_result, resized) {
            Ok(None) => Ok(()),
            Ok(Some(trigger)) => {
                log::warn!("Swapchain invalidated on present ({:?})", trigger);
                self.status.invalidate(trigger)?;
                self.recreate_swapchain(window)
            }
            Err(e) => {
                log::error!("{}, frame dropped", e);
                Ok(())
            }
        }
    }

    /// Rebuild every surface-dependent object
    ///
    /// Blocks while the window is minimized. Returns without rebuilding if
    /// the window is closed while waiting.
    pub fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        if self.status.is_active() {
            self.status.invalidate(RecreationTrigger::Resized)?;
        }
        let trigger = self.status.begin_rebuild()?;

        let framebuffer_size = window.wait_for_nonzero_framebuffer();
        if framebuffer_size.0 == 0 || framebuffer_size.1 == 0 {
            self.status.abort_rebuild(trigger);
            return Ok(());
        }

        if let Err(e) = self.context.wait_idle() {
            self.status.abort_rebuild(trigger);
            return Err(e);
        }
        self.surface_state = None;

        match SurfaceDependentState::new(&self.context, &mut self.device_state, framebuffer_size) {
            Ok(state) => {
                log::info!(
                    "Swapchain recreated ({:?}): {}x{}, {} images, {:?}, depth {:?}",
                    trigger,
                    state.swapchain.extent().width,
                    state.swapchain.extent().height,
                    state.swapchain.image_count(),
                    state.swapchain.present_mode(),
                    state.targets.depth.format()
                );
                self.surface_state = Some(state);
                self.status.finish_rebuild()
            }
            Err(e) => {
                self.status.abort_rebuild(trigger);
                Err(e)
            }
        }
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Current swapchain extent, if the swapchain exists
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.surface_state.as_ref().map(|s| s.swapchain.extent())
    }
}

impl Drop for ModelRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait failed during teardown: {}", e);
        }
        // Fields then drop surface state, device state, context
    }
}
