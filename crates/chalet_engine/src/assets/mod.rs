//! Asset loading: OBJ models, the binary model cache and texture images

pub mod obj_loader;
pub mod model_cache;
pub mod image_loader;

pub use obj_loader::{ObjError, ObjLoader};
pub use model_cache::ModelCacheError;
pub use image_loader::{ImageData, ImageLoadError};

use crate::core::config::AssetConfig;
use crate::render::Mesh;
use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// OBJ parsing failed
    #[error("OBJ error: {0}")]
    Obj(#[from] ObjError),
    /// Binary cache read or write failed
    #[error("Model cache error: {0}")]
    Cache(#[from] ModelCacheError),
    /// Texture decoding failed
    #[error("Image error: {0}")]
    Image(#[from] ImageLoadError),
}

/// Load the model the renderer draws
///
/// Reads the binary cache. When the cache is missing and
/// `bake_missing_cache` is set, parses the OBJ source instead and writes
/// the cache for the next run.
pub fn load_model(config: &AssetConfig) -> Result<Mesh, AssetError> {
    let cache_path = config.model_cache_path();
    if cache_path.exists() || !config.bake_missing_cache {
        return Ok(model_cache::read(&cache_path)?);
    }

    log::warn!(
        "Model cache {} missing, parsing {}",
        cache_path.display(),
        config.model_source_path().display()
    );
    let mesh = ObjLoader::load_obj(config.model_source_path())?;
    if let Err(e) = model_cache::write(&cache_path, &mesh) {
        // Non-fatal: the parsed mesh is still returned
        log::warn!("Failed to write model cache {}: {}", cache_path.display(), e);
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chalet_assets_{}_{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_model_bakes_missing_cache() {
        let dir = temp_dir("bake");
        std::fs::write(dir.join("chalet.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let config = AssetConfig::new().with_assets_dir(dir.to_string_lossy());

        let baked = load_model(&config).unwrap();
        assert!(config.model_cache_path().exists());

        // Second load comes from the cache and matches
        let cached = load_model(&config).unwrap();
        assert_eq!(baked, cached);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_model_without_baking_requires_cache() {
        let dir = temp_dir("no_bake");
        let config = AssetConfig::new()
            .with_assets_dir(dir.to_string_lossy())
            .with_cache_baking(false);

        let err = load_model(&config).unwrap_err();
        assert!(matches!(err, AssetError::Cache(ModelCacheError::Io(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
