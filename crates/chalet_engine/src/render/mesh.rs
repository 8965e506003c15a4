//! Mesh representation for the rendered model
//!
//! Pure data: the Vulkan vertex input description lives in
//! [`crate::render::vulkan::vertex_layout`].

/// Vertex as stored in the vertex buffer and in the binary model cache
///
/// Field order and `#[repr(C)]` fix the 32-byte layout both consumers rely on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Texture coordinate with V already flipped for Vulkan's top-left origin
    pub tex_coord: [f32; 2],
    /// Per-vertex color multiplied with the texture sample
    pub color: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Color assigned to every vertex produced from an OBJ file
    pub const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

    /// Create a new vertex
    pub fn new(position: [f32; 3], tex_coord: [f32; 2], color: [f32; 3]) -> Self {
        Self {
            position,
            tex_coord,
            color,
        }
    }

    /// Key of the attributes that identify a unique vertex
    ///
    /// Components compare by value, so `-0.0` and `0.0` share a key. Color
    /// is not part of the key since every loaded vertex is white.
    pub fn dedup_key(&self) -> [u32; 5] {
        [
            key_bits(self.position[0]),
            key_bits(self.position[1]),
            key_bits(self.position[2]),
            key_bits(self.tex_coord[0]),
            key_bits(self.tex_coord[1]),
        ]
    }
}

fn key_bits(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Deduplicated vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of triangles described by the index list
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether every index points at an existing vertex
    pub fn indices_in_bounds(&self) -> bool {
        let count = self.vertices.len();
        self.indices.iter().all(|&index| (index as usize) < count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_is_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::offset_of!(Vertex, tex_coord), 12);
        assert_eq!(std::mem::offset_of!(Vertex, color), 20);
    }

    #[test]
    fn test_dedup_key_ignores_color() {
        let a = Vertex::new([1.0, 2.0, 3.0], [0.5, 0.25], Vertex::WHITE);
        let b = Vertex::new([1.0, 2.0, 3.0], [0.5, 0.25], [0.0, 0.0, 0.0]);
        let c = Vertex::new([1.0, 2.0, 3.0], [0.5, 0.5], Vertex::WHITE);
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_dedup_key_merges_signed_zero() {
        let positive = Vertex::new([0.0, 1.0, 0.0], [0.0, 0.5], Vertex::WHITE);
        let negative = Vertex::new([-0.0, 1.0, 0.0], [-0.0, 0.5], Vertex::WHITE);
        assert_eq!(positive.dedup_key(), negative.dedup_key());
    }

    #[test]
    fn test_indices_in_bounds() {
        let vertex = Vertex::new([0.0; 3], [0.0; 2], Vertex::WHITE);
        let mesh = Mesh::new(vec![vertex; 3], vec![0, 1, 2]);
        assert!(mesh.indices_in_bounds());
        assert_eq!(mesh.triangle_count(), 1);

        let broken = Mesh::new(vec![vertex; 2], vec![0, 1, 2]);
        assert!(!broken.indices_in_bounds());
    }
}
