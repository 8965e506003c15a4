//! # Chalet Engine
//!
//! Vulkan renderer core that draws one textured, multisampled model.
//!
//! ## Features
//!
//! - **Device Context**: adapter selection, logical device and queues
//! - **Swapchain Management**: format/present-mode negotiation and recreation
//! - **Resource Transfer**: staged uploads, layout transitions, mipmap generation
//! - **Pipeline & Descriptors**: MSAA render pass, graphics pipeline, per-image bindings
//! - **Frame Orchestration**: two frames in flight with fence/semaphore pairs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chalet_engine::core::config::ApplicationConfig;
//! use chalet_engine::render::vulkan::{ModelRenderer, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut window = Window::new(
//!         &config.renderer.window_title,
//!         config.renderer.window_width,
//!         config.renderer.window_height,
//!     )?;
//!     let mut renderer = ModelRenderer::new(&mut window, &config)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&mut window)?;
//!     }
//!
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod assets;
pub mod render;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::config::{ApplicationConfig, AssetConfig, RendererConfig, ShaderConfig};
    pub use crate::config::{Config, ConfigError};
    pub use crate::render::mesh::{Mesh, Vertex};
    pub use crate::render::vulkan::{ModelRenderer, VulkanError, VulkanResult, Window};
}
