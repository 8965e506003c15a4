//! Rendering: backend-agnostic mesh data and the Vulkan backend

pub mod mesh;
pub mod vulkan;

pub use mesh::{Mesh, Vertex};
