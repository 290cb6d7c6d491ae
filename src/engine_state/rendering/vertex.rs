//! Vertex data structures for chunk meshes.
//!
//! This module defines the vertex format emitted by mesh assembly. The layout is plain
//! old data so that consumers can upload a chunk's vertex slice to the GPU directly with
//! `bytemuck::cast_slice`.

use cgmath::{Point3, Vector3};

/// A vertex of a chunk mesh.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Material Index: u32 (4 bytes)
///
/// Total size: 36 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in chunk-local space (or model space inside a geometry table)
    position: [f32; 3],
    /// Outward unit normal of the face this vertex belongs to
    normal: [f32; 3],
    /// UV texture coordinates (normalized 0.0-1.0)
    tex_coords: [f32; 2],
    /// Opaque material index handed through to the renderer
    material_index: u32,
}

impl Vertex {
    /// Creates a new vertex.
    ///
    /// # Arguments
    /// * `pos` - The position of the vertex
    /// * `normal` - The face normal
    /// * `u` - U texture coordinate
    /// * `v` - V texture coordinate
    /// * `material_index` - Material of the face
    ///
    /// # Returns
    /// A new `Vertex` instance
    pub fn new(pos: Point3<f32>, normal: Vector3<f32>, u: f32, v: f32, material_index: u32) -> Self {
        Vertex {
            position: [pos.x, pos.y, pos.z],
            normal: [normal.x, normal.y, normal.z],
            tex_coords: [u, v],
            material_index,
        }
    }

    /// The vertex position.
    pub fn position(&self) -> Point3<f32> {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }

    /// The face normal.
    pub fn normal(&self) -> Vector3<f32> {
        Vector3::new(self.normal[0], self.normal[1], self.normal[2])
    }

    /// The texture coordinates.
    pub fn tex_coords(&self) -> [f32; 2] {
        self.tex_coords
    }

    /// The material index.
    pub fn material_index(&self) -> u32 {
        self.material_index
    }

    /// Returns a copy of this vertex moved by `offset`.
    pub fn translated(&self, offset: Vector3<f32>) -> Self {
        Vertex {
            position: [
                self.position[0] + offset.x,
                self.position[1] + offset.y,
                self.position[2] + offset.z,
            ],
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        let vertex = Vertex::new(Point3::new(1.0, 2.0, 3.0), Vector3::unit_y(), 0.0, 1.0, 7);
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 36);
    }

    #[test]
    fn test_translation_keeps_attributes() {
        let vertex = Vertex::new(Point3::new(0.0, 1.0, 0.0), Vector3::unit_y(), 1.0, 0.0, 4);
        let moved = vertex.translated(Vector3::new(2.0, 3.0, 4.0));
        assert_eq!(moved.position(), Point3::new(2.0, 4.0, 4.0));
        assert_eq!(moved.normal(), vertex.normal());
        assert_eq!(moved.tex_coords(), [1.0, 0.0]);
        assert_eq!(moved.material_index(), 4);
    }
}
