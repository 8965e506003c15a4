//! Texture decoding
//!
//! Any PNG or JPEG is expanded to tightly packed RGBA8, the layout the
//! texture upload copies byte-for-byte into an `R8G8B8A8` image.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bytes per decoded pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Texture decoding errors
#[derive(Error, Debug)]
pub enum ImageLoadError {
    /// The file could not be opened or decoded
    #[error("Failed to decode {path}: {source}")]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },
    /// In-memory bytes could not be decoded
    #[error("Failed to decode image bytes: {0}")]
    DecodeBytes(#[source] image::ImageError),
    /// Decoded image has no pixels
    #[error("Image has zero extent ({width}x{height})")]
    Empty {
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
    },
}

/// RGBA8 pixels ready for staging
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Row-major RGBA bytes, `width * height * 4` long
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImageData {
    /// Decode a texture file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| ImageLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let pixels = Self::from_rgba(decoded.to_rgba8())?;
        log::info!("Texture {} decoded: {}x{}", path.display(), pixels.width, pixels.height);
        Ok(pixels)
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        let decoded = image::load_from_memory(bytes).map_err(ImageLoadError::DecodeBytes)?;
        Self::from_rgba(decoded.to_rgba8())
    }

    fn from_rgba(rgba: image::RgbaImage) -> Result<Self, ImageLoadError> {
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageLoadError::Empty { width, height });
        }
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Staging size in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// The larger of width and height, which bounds the mip chain
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(image: &image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut encoded = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut encoded), format)
            .unwrap();
        encoded
    }

    #[test]
    fn test_rgb_png_gains_opaque_alpha() {
        let source = image::RgbImage::from_pixel(3, 5, image::Rgb([10, 20, 30]));
        let bytes = encode(&image::DynamicImage::ImageRgb8(source), image::ImageFormat::Png);

        let pixels = ImageData::from_bytes(&bytes).unwrap();
        assert_eq!((pixels.width, pixels.height), (3, 5));
        assert_eq!(pixels.byte_len(), 3 * 5 * BYTES_PER_PIXEL);
        assert_eq!(pixels.max_dimension(), 5);
        assert_eq!(&pixels.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_jpeg_decodes() {
        let source = image::RgbImage::from_pixel(16, 8, image::Rgb([128, 128, 128]));
        let bytes = encode(&image::DynamicImage::ImageRgb8(source), image::ImageFormat::Jpeg);

        let pixels = ImageData::from_bytes(&bytes).unwrap();
        assert_eq!((pixels.width, pixels.height), (16, 8));
        assert_eq!(pixels.byte_len(), 16 * 8 * BYTES_PER_PIXEL);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let err = ImageData::from_bytes(&[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, ImageLoadError::DecodeBytes(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ImageData::from_file("does/not/exist.jpg").unwrap_err();
        match err {
            ImageLoadError::Decode { path, .. } => assert_eq!(path, Path::new("does/not/exist.jpg")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
