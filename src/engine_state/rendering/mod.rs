//! Geometry production for the voxel world.
//!
//! This module contains everything between a chunk's visibility masks and the data a
//! renderer uploads: the vertex format, the per-type face geometry table and mesh
//! assembly. Draw submission itself is left to the consumer of the chunk events.

pub mod meshing;
mod vertex;

// Re-export commonly used types
pub use vertex::Vertex;
