//! Mesh data structures for chunk rendering.
//!
//! A [`MeshBuffer`] is one flat vertex/index buffer per chunk. Alongside the geometry it
//! keeps one [`EmittedRange`] per voxel, indexed by the voxel flattening formula, so a
//! single voxel's faces can be located and replaced without rebuilding the chunk.

use std::collections::BTreeMap;

use cgmath::{Matrix4, Vector3};

use crate::engine_state::rendering::Vertex;
use crate::engine_state::voxels::block::VoxelId;

use super::face::{FACE_INDICES, INDICES_PER_FACE, VERTICES_PER_FACE};

/// The slice of a [`MeshBuffer`]'s vertices emitted by one voxel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EmittedRange {
    /// First vertex written for the voxel. For voxels that emit nothing this is the
    /// position their faces would be inserted at.
    pub vertex_start: u32,
    /// Number of faces the voxel emitted (0..=6)
    pub face_count: u8,
}

impl EmittedRange {
    /// One past the last vertex of the range.
    pub fn vertex_end(&self) -> u32 {
        self.vertex_start + self.face_count as u32 * VERTICES_PER_FACE as u32
    }
}

/// Vertex and index buffers of one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffer {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    ranges: Vec<EmittedRange>,
}

impl MeshBuffer {
    /// Creates an empty buffer sized for `voxel_count` voxels and `face_count` faces.
    pub fn with_capacity(voxel_count: usize, face_count: usize) -> Self {
        MeshBuffer {
            vertices: Vec::with_capacity(face_count * VERTICES_PER_FACE),
            indices: Vec::with_capacity(face_count * INDICES_PER_FACE),
            ranges: Vec::with_capacity(voxel_count),
        }
    }

    /// All vertices, in emission order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All indices, six per face.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The per-voxel emitted ranges.
    pub fn ranges(&self) -> &[EmittedRange] {
        &self.ranges
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of faces.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_FACE
    }

    /// Whether the buffer holds no geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices emitted by the voxel at `index`.
    pub fn voxel_vertices(&self, index: usize) -> &[Vertex] {
        match self.ranges.get(index) {
            Some(range) => &self.vertices[range.vertex_start as usize..range.vertex_end() as usize],
            None => &[],
        }
    }

    /// Appends the geometry of the next voxel in flat order.
    ///
    /// Voxels must be pushed in ascending index order, including those that emit nothing,
    /// so that the range table lines up with the voxel array.
    pub fn push_voxel(&mut self, vertices: &[Vertex]) {
        let faces = vertices.len() / VERTICES_PER_FACE;
        self.ranges.push(EmittedRange {
            vertex_start: self.vertices.len() as u32,
            face_count: faces as u8,
        });
        self.vertices.extend_from_slice(vertices);
        self.sync_indices();
    }

    /// Replaces the geometry emitted by the voxel at `index`.
    ///
    /// Vertices of later voxels move by the size difference and the index list grows or
    /// shrinks accordingly, so the result equals a buffer assembled from scratch.
    pub fn replace_voxel(&mut self, index: usize, vertices: Vec<Vertex>) {
        let Some(range) = self.ranges.get(index).copied() else {
            return;
        };
        let new_faces = vertices.len() / VERTICES_PER_FACE;
        let delta = (new_faces as i64 - range.face_count as i64) * VERTICES_PER_FACE as i64;

        self.vertices
            .splice(range.vertex_start as usize..range.vertex_end() as usize, vertices);
        self.ranges[index].face_count = new_faces as u8;

        if delta != 0 {
            for later in &mut self.ranges[index + 1..] {
                later.vertex_start = (later.vertex_start as i64 + delta) as u32;
            }
        }
        self.sync_indices();
    }

    /// Brings the index list in line with the face count.
    ///
    /// Face `k` always uses indices `FACE_INDICES + 4k`, so only the tail changes.
    fn sync_indices(&mut self) {
        let faces = self.face_count();
        let current = self.indices.len() / INDICES_PER_FACE;
        if faces < current {
            self.indices.truncate(faces * INDICES_PER_FACE);
            return;
        }
        for face in current..faces {
            let base = (face * VERTICES_PER_FACE) as u32;
            self.indices
                .extend(FACE_INDICES.iter().map(|index| index + base));
        }
    }
}

/// Per-type transform lists for instanced rendering.
///
/// Each transform places a unit cube at a voxel's world position. Types and their
/// transforms are kept in ascending id and flat-index order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstancedMesh {
    instances: BTreeMap<VoxelId, Vec<Matrix4<f32>>>,
}

impl InstancedMesh {
    /// Creates an empty instance map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one voxel instance of type `id` at a world translation.
    pub fn push(&mut self, id: VoxelId, translation: Vector3<f32>) {
        self.instances
            .entry(id)
            .or_default()
            .push(Matrix4::from_translation(translation));
    }

    /// Transforms of one voxel type.
    pub fn transforms(&self, id: VoxelId) -> &[Matrix4<f32>] {
        self.instances.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over `(type, transforms)` in ascending type order.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelId, &[Matrix4<f32>])> {
        self.instances
            .iter()
            .map(|(id, transforms)| (*id, transforms.as_slice()))
    }

    /// Total number of instances over all types.
    pub fn instance_count(&self) -> usize {
        self.instances.values().map(Vec::len).sum()
    }

    /// Whether no instance was emitted.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    fn quad(marker: f32) -> Vec<Vertex> {
        (0..VERTICES_PER_FACE)
            .map(|_| Vertex::new(Point3::new(marker, 0.0, 0.0), Vector3::unit_y(), 0.0, 0.0, 0))
            .collect()
    }

    #[test]
    fn test_push_tracks_ranges_and_indices() {
        let mut buffer = MeshBuffer::with_capacity(3, 3);
        buffer.push_voxel(&quad(0.0));
        buffer.push_voxel(&[]);
        buffer.push_voxel(&[quad(2.0), quad(2.0)].concat());

        assert_eq!(buffer.vertex_count(), 12);
        assert_eq!(buffer.index_count(), 18);
        assert_eq!(
            buffer.ranges(),
            &[
                EmittedRange { vertex_start: 0, face_count: 1 },
                EmittedRange { vertex_start: 4, face_count: 0 },
                EmittedRange { vertex_start: 4, face_count: 2 },
            ]
        );
        assert_eq!(&buffer.indices()[6..12], &[6, 4, 5, 6, 5, 7]);
    }

    #[test]
    fn test_replace_matches_fresh_buffer() {
        let mut patched = MeshBuffer::default();
        patched.push_voxel(&quad(0.0));
        patched.push_voxel(&[]);
        patched.push_voxel(&quad(2.0));

        patched.replace_voxel(1, [quad(1.0), quad(1.0)].concat());
        patched.replace_voxel(0, Vec::new());

        let mut fresh = MeshBuffer::default();
        fresh.push_voxel(&[]);
        fresh.push_voxel(&[quad(1.0), quad(1.0)].concat());
        fresh.push_voxel(&quad(2.0));

        assert_eq!(patched, fresh);
        assert_eq!(patched.voxel_vertices(2)[0].position().x, 2.0);
    }

    #[test]
    fn test_instances_group_by_type() {
        let mut mesh = InstancedMesh::new();
        mesh.push(2, Vector3::new(0.0, 0.0, 0.0));
        mesh.push(1, Vector3::new(1.0, 0.0, 0.0));
        mesh.push(2, Vector3::new(2.0, 0.0, 0.0));

        assert_eq!(mesh.instance_count(), 3);
        assert_eq!(mesh.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(mesh.transforms(2)[1].w.x, 2.0);
        assert!(mesh.transforms(9).is_empty());
    }
}
