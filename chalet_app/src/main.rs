//! Chalet viewer
//!
//! Loads `chalet.toml` (or defaults), opens a window and renders the model
//! until the window is closed.

use chalet_engine::config::Config;
use chalet_engine::core::config::ApplicationConfig;
use chalet_engine::foundation::{logging, time::Timer};
use chalet_engine::render::vulkan::{ModelRenderer, Window};
use std::time::Duration;
use thiserror::Error;

const CONFIG_PATH: &str = "chalet.toml";
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Startup and run-loop failures
#[derive(Error, Debug)]
enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] chalet_engine::config::ConfigError),
    #[error("window: {0}")]
    Window(#[from] chalet_engine::render::vulkan::WindowError),
    #[error("renderer: {0}")]
    Vulkan(#[from] chalet_engine::render::vulkan::VulkanError),
}

fn run(config: &ApplicationConfig) -> Result<(), AppError> {
    let mut window = Window::new(
        &config.renderer.window_title,
        config.renderer.window_width,
        config.renderer.window_height,
    )?;
    let mut renderer = ModelRenderer::new(&mut window, config)?;
    if let Some(extent) = renderer.extent() {
        log::info!("Rendering at {}x{}", extent.width, extent.height);
    }
    let mut timer = Timer::new();

    while !window.should_close() {
        window.poll_events();
        renderer.draw_frame(&mut window)?;

        timer.update();
        if let Some(fps) = timer.fps_report(FPS_REPORT_INTERVAL) {
            log::info!("{:.1} fps ({} frames)", fps, timer.frame_count());
        }
    }

    renderer.wait_idle()?;
    log::info!("Shutting down");
    Ok(())
}

fn main() {
    let config = match ApplicationConfig::load_or_default(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            logging::init();
            log::error!("Failed to load {}: {}", CONFIG_PATH, e);
            std::process::exit(1);
        }
    };
    logging::init_with_level(&config.engine.log_level);

    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
