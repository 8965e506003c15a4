//! # Unified Configuration System
//!
//! Configuration for the renderer, the model/texture assets it consumes and
//! engine-wide behavior such as logging.
//!
//! ## Configuration Categories
//!
//! - **Renderer Config**: window, validation layers, shader bytecode paths
//! - **Engine Config**: log level
//! - **Asset Config**: model source, binary model cache, texture
//!
//! The frame-in-flight count is not configurable; see
//! [`crate::render::vulkan::MAX_FRAMES_IN_FLIGHT`].

use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError};

/// # Shader Configuration
///
/// Paths to the precompiled SPIR-V blobs for the vertex and fragment stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the common shader locations so the application can be started
    /// from the workspace root or from a crate directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "resources/",
            "target/shaders/",
            "../resources/",
            "./",
        ];

        let find = |file: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{dir}{file}"))
                .find(|candidate| Path::new(candidate).exists())
        };

        Self {
            vertex_shader_path: find(base_vertex).unwrap_or_else(|| format!("resources/{base_vertex}")),
            fragment_shader_path: find(base_fragment).unwrap_or_else(|| format!("resources/{base_fragment}")),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex_shader_path));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment_shader_path));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("vert.spv", "frag.spv")
    }
}

/// # Renderer Configuration
///
/// Window and Vulkan instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Window title
    pub window_title: String,
    /// Initial window width in screen coordinates
    pub window_width: u32,
    /// Initial window height in screen coordinates
    pub window_height: u32,
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Whether to enable Vulkan validation layers (`None` follows the build type)
    pub enable_validation: Option<bool>,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            window_title: "Vulkan Example".to_string(),
            window_width: 800,
            window_height: 600,
            shaders: ShaderConfig::default(),
            enable_validation: None,
        }
    }

    /// Set the window title and size
    pub fn with_window(mut self, title: impl Into<String>, width: u32, height: u32) -> Self {
        self.window_title = title.into();
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.window_width == 0 || self.window_height == 0 {
            return Err(format!(
                "Window size must be nonzero, got {}x{}",
                self.window_width, self.window_height
            ));
        }

        self.shaders.validate()?;

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Chalet Viewer")
    }
}

/// # Engine Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level filter passed to `env_logger` (overridden by `RUST_LOG`)
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Asset Configuration
///
/// File names are resolved relative to `assets_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Base directory for assets
    pub assets_dir: String,
    /// Text OBJ model used to produce the binary cache
    pub model_source: String,
    /// Binary model cache consumed by the renderer
    pub model_cache: String,
    /// Texture image sampled by the fragment shader
    pub texture: String,
    /// Parse `model_source` and write the cache when the cache file is missing
    pub bake_missing_cache: bool,
}

impl AssetConfig {
    /// Create a new asset configuration
    pub fn new() -> Self {
        Self {
            assets_dir: "resources".to_string(),
            model_source: "chalet.obj".to_string(),
            model_cache: "chalet.bin".to_string(),
            texture: "chalet.jpg".to_string(),
            bake_missing_cache: true,
        }
    }

    /// Set assets directory
    pub fn with_assets_dir(mut self, dir: impl Into<String>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    /// Configure fallback baking of the model cache
    pub fn with_cache_baking(mut self, enabled: bool) -> Self {
        self.bake_missing_cache = enabled;
        self
    }

    /// Full path of the OBJ model
    pub fn model_source_path(&self) -> PathBuf {
        Path::new(&self.assets_dir).join(&self.model_source)
    }

    /// Full path of the binary model cache
    pub fn model_cache_path(&self) -> PathBuf {
        Path::new(&self.assets_dir).join(&self.model_cache)
    }

    /// Full path of the texture image
    pub fn texture_path(&self) -> PathBuf {
        Path::new(&self.assets_dir).join(&self.texture)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model_cache.is_empty() {
            return Err("Model cache file name cannot be empty".to_string());
        }
        if self.texture.is_empty() {
            return Err("Texture file name cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration applications load and hand to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
    /// Asset system configuration
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            engine: EngineConfig::default(),
            renderer: RendererConfig::new(app_name),
            assets: AssetConfig::default(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate().map_err(ConfigError::Invalid)?;
        self.assets.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chalet_config_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults_match_viewer_window() {
        let config = ApplicationConfig::default();
        assert_eq!(config.renderer.window_title, "Vulkan Example");
        assert_eq!(config.renderer.window_width, 800);
        assert_eq!(config.renderer.window_height, 600);
        assert_eq!(config.assets.model_cache_path(), Path::new("resources").join("chalet.bin"));
        assert_eq!(config.assets.texture_path(), Path::new("resources").join("chalet.jpg"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let shaders = ShaderConfig::new("missing/vert.spv", "missing/frag.spv");

        let unnamed = RendererConfig::new("").with_shaders(shaders.clone());
        assert!(unnamed.validate().unwrap_err().contains("name"));

        let zero_sized = RendererConfig::new("viewer")
            .with_window("t", 0, 600)
            .with_shaders(shaders.clone());
        assert!(zero_sized.validate().unwrap_err().contains("nonzero"));

        let missing_shaders = RendererConfig::new("viewer").with_shaders(shaders);
        assert!(missing_shaders.validate().unwrap_err().contains("Vertex shader"));
    }

    #[test]
    fn test_validation_override() {
        let config = RendererConfig::new("viewer").with_validation(false);
        assert!(!config.validation_enabled());
        let config = config.with_validation(true);
        assert!(config.validation_enabled());
    }

    #[test]
    fn test_toml_and_ron_round_trip() {
        let mut config = ApplicationConfig::new("round trip");
        config.engine = EngineConfig::new().with_log_level("debug");
        config.assets = AssetConfig::new().with_assets_dir("assets").with_cache_baking(false);

        for ext in ["toml", "ron"] {
            let path = temp_path(&format!("round_trip.{ext}"));
            config.save_to_file(&path).unwrap();
            let loaded = ApplicationConfig::load_from_file(&path).unwrap();
            std::fs::remove_file(&path).unwrap();

            assert_eq!(loaded.renderer.application_name, "round trip");
            assert_eq!(loaded.engine.log_level, "debug");
            assert_eq!(loaded.assets.assets_dir, "assets");
            assert!(!loaded.assets.bake_missing_cache);
        }
    }

    #[test]
    fn test_load_or_default_without_file() {
        let path = temp_path("absent.toml");
        let config = ApplicationConfig::load_or_default(&path).unwrap();
        assert_eq!(config.renderer.application_name, "Chalet Viewer");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_path("partial.toml");
        std::fs::write(&path, "[renderer]\nwindow_width = 1024\n\n[assets]\ntexture = \"other.png\"\n").unwrap();
        let config = ApplicationConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.renderer.window_width, 1024);
        assert_eq!(config.renderer.window_height, 600);
        assert_eq!(config.assets.texture, "other.png");
        assert_eq!(config.assets.model_cache, "chalet.bin");
        assert_eq!(config.engine.log_level, "info");
    }
}
