//! Mesh data for voxel rendering.
//!
//! # Architecture
//! - [`MeshBuffer`]: Flat vertex/index buffers of one chunk plus the per-voxel emitted ranges
//! - [`InstancedMesh`]: Per-type transform lists for instanced rendering
//! - [`GeometryTable`]: Precomputed unit-cube faces for each voxel type

mod face;
mod mesh;

pub use face::{
    unit_face, FaceVertices, GeometryTable, FACE_INDICES, INDICES_PER_FACE, VERTICES_PER_FACE,
};
pub use mesh::*;
