//! Binary model cache
//!
//! Layout, in native byte order (little-endian on every supported target):
//!
//! ```text
//! u32 vertex_count
//! u32 index_count
//! vertex_count * Vertex   (position 3xf32, tex_coord 2xf32, color 3xf32)
//! index_count  * u32
//! ```
//!
//! There is no magic number and no version field. A cache written with a
//! different vertex layout cannot be detected and will load as garbage; the
//! only structural check is that the payload is as long as the counts claim.

use crate::render::{Mesh, Vertex};
use bytemuck::Zeroable;
use std::mem::size_of;
use std::path::Path;
use thiserror::Error;

const HEADER_SIZE: usize = 2 * size_of::<u32>();

/// Model cache errors
#[derive(Error, Debug)]
pub enum ModelCacheError {
    /// Underlying read or write failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is shorter than its header declares
    #[error("Model cache truncated: expected {expected} bytes, found {actual}")]
    Truncated {
        /// Bytes required by the header counts
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },
    /// Counts too large to address
    #[error("Model cache too large: {vertex_count} vertices, {index_count} indices")]
    TooLarge {
        /// Vertex count from the header
        vertex_count: usize,
        /// Index count from the header
        index_count: usize,
    },
}

/// Serialize a mesh into the cache layout
pub fn encode(mesh: &Mesh) -> Result<Vec<u8>, ModelCacheError> {
    let too_large = || ModelCacheError::TooLarge {
        vertex_count: mesh.vertices.len(),
        index_count: mesh.indices.len(),
    };
    let vertex_count = u32::try_from(mesh.vertices.len()).map_err(|_| too_large())?;
    let index_count = u32::try_from(mesh.indices.len()).map_err(|_| too_large())?;

    let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
    let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);

    let mut bytes = Vec::with_capacity(HEADER_SIZE + vertex_bytes.len() + index_bytes.len());
    bytes.extend_from_slice(&vertex_count.to_ne_bytes());
    bytes.extend_from_slice(&index_count.to_ne_bytes());
    bytes.extend_from_slice(vertex_bytes);
    bytes.extend_from_slice(index_bytes);
    Ok(bytes)
}

/// Deserialize a mesh from the cache layout
///
/// Bytes past the declared payload are ignored.
pub fn decode(bytes: &[u8]) -> Result<Mesh, ModelCacheError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ModelCacheError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let vertex_count = read_u32(&bytes[0..4]) as usize;
    let index_count = read_u32(&bytes[4..8]) as usize;

    let too_large = || ModelCacheError::TooLarge { vertex_count, index_count };
    let vertex_size = vertex_count.checked_mul(size_of::<Vertex>()).ok_or_else(too_large)?;
    let index_size = index_count.checked_mul(size_of::<u32>()).ok_or_else(too_large)?;
    let expected = HEADER_SIZE
        .checked_add(vertex_size)
        .and_then(|n| n.checked_add(index_size))
        .ok_or_else(too_large)?;

    if bytes.len() < expected {
        return Err(ModelCacheError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let vertex_end = HEADER_SIZE + vertex_size;

    // Copy into aligned storage; the file buffer has no alignment guarantee
    let mut vertices = vec![Vertex::zeroed(); vertex_count];
    bytemuck::cast_slice_mut::<Vertex, u8>(&mut vertices).copy_from_slice(&bytes[HEADER_SIZE..vertex_end]);
    let mut indices = vec![0u32; index_count];
    bytemuck::cast_slice_mut::<u32, u8>(&mut indices).copy_from_slice(&bytes[vertex_end..expected]);

    Ok(Mesh::new(vertices, indices))
}

/// Write a mesh to a cache file
pub fn write<P: AsRef<Path>>(path: P, mesh: &Mesh) -> Result<(), ModelCacheError> {
    let path = path.as_ref();
    std::fs::write(path, encode(mesh)?)?;
    log::info!(
        "Wrote model cache {} ({} vertices, {} indices)",
        path.display(),
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(())
}

/// Read a mesh from a cache file
pub fn read<P: AsRef<Path>>(path: P) -> Result<Mesh, ModelCacheError> {
    let path = path.as_ref();
    let mesh = decode(&std::fs::read(path)?)?;
    log::debug!(
        "Read model cache {} ({} vertices, {} indices)",
        path.display(),
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(mesh)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_ne_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mesh() -> Mesh {
        Mesh::new(
            vec![
                Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0], Vertex::WHITE),
                Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0], Vertex::WHITE),
                Vertex::new([0.5, 0.5, 0.25], [0.0, 1.0], [0.2, 0.4, 0.6]),
            ],
            vec![0, 1, 2, 2, 1, 0],
        )
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("chalet_cache_{}.bin", std::process::id()));
        let mesh = sample_mesh();

        write(&path, &mesh).unwrap();
        let loaded = read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, mesh);
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&sample_mesh()).unwrap();
        assert_eq!(read_u32(&bytes[0..4]), 3);
        assert_eq!(read_u32(&bytes[4..8]), 6);
        assert_eq!(bytes.len(), 8 + 3 * 32 + 6 * 4);
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let bytes = encode(&sample_mesh()).unwrap();
        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            ModelCacheError::Truncated { expected, actual } if expected == bytes.len() && actual == bytes.len() - 1
        ));

        assert!(matches!(decode(&[1, 0]), Err(ModelCacheError::Truncated { expected: 8, actual: 2 })));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut bytes = encode(&sample_mesh()).unwrap();
        bytes.extend_from_slice(&[0xAB; 7]);
        assert_eq!(decode(&bytes).unwrap(), sample_mesh());
    }

    #[test]
    fn test_empty_mesh() {
        let bytes = encode(&Mesh::default()).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(&bytes).unwrap(), Mesh::default());
    }
}
