//! Mesh assembly for voxel chunks.
//!
//! This module turns a chunk's voxel ids and face visibility masks into renderable
//! geometry. Two output shapes are supported:
//! 1. `MeshMode::Combined`: one vertex/index buffer per chunk
//! 2. `MeshMode::Instanced`: one transform list per voxel type
//!
//! # Emission Order
//! Voxels are visited in flat-index order and, per voxel, faces in the fixed mask bit
//! order [TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK]. The output is therefore a pure function
//! of its inputs, which keeps meshes reproducible and lets edits patch a buffer in place.
//!
//! # Sizing
//! For combined meshes the buffer sizes always satisfy
//! `vertices == Σ popcount(mask) * 4` and `indices == vertices / 4 * 6`.

use std::sync::Arc;

use cgmath::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::GenerationError;
use crate::engine_state::rendering::Vertex;
use crate::engine_state::voxels::{
    block::{block_side::FaceMask, VoxelId, AIR},
    chunk::{chunk_iteration::ChunkBlockIterator, ChunkSize, VoxelChunk},
};

mod mesh;

pub use mesh::*;

/// Shape of the geometry produced for each chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshMode {
    /// One vertex/index buffer per chunk
    #[default]
    Combined,
    /// One transform list per voxel type
    Instanced,
}

/// Geometry attached to a Ready chunk.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkGeometry {
    /// Combined vertex/index buffer
    Buffer(MeshBuffer),
    /// Transform lists per voxel type
    Instanced(InstancedMesh),
}

impl ChunkGeometry {
    /// The combined buffer, if this geometry is one.
    pub fn as_buffer(&self) -> Option<&MeshBuffer> {
        match self {
            ChunkGeometry::Buffer(buffer) => Some(buffer),
            ChunkGeometry::Instanced(_) => None,
        }
    }

    /// The instance lists, if this geometry is instanced.
    pub fn as_instanced(&self) -> Option<&InstancedMesh> {
        match self {
            ChunkGeometry::Instanced(instances) => Some(instances),
            ChunkGeometry::Buffer(_) => None,
        }
    }

    /// Which mode produced this geometry.
    pub fn mode(&self) -> MeshMode {
        match self {
            ChunkGeometry::Buffer(_) => MeshMode::Combined,
            ChunkGeometry::Instanced(_) => MeshMode::Instanced,
        }
    }

    /// Whether nothing would be drawn.
    pub fn is_empty(&self) -> bool {
        match self {
            ChunkGeometry::Buffer(buffer) => buffer.is_empty(),
            ChunkGeometry::Instanced(instances) => instances.is_empty(),
        }
    }
}

/// Builds chunk geometry from voxel ids and visibility masks.
///
/// The assembler is immutable and shared between the pipeline workers and the
/// coordinating thread that applies edits.
#[derive(Clone, Debug)]
pub struct MeshAssembler {
    table: Arc<GeometryTable>,
    mode: MeshMode,
}

impl MeshAssembler {
    /// Creates an assembler over a geometry table.
    pub fn new(table: Arc<GeometryTable>, mode: MeshMode) -> Self {
        MeshAssembler { table, mode }
    }

    /// The output mode.
    pub fn mode(&self) -> MeshMode {
        self.mode
    }

    /// The geometry table faces are looked up in.
    pub fn table(&self) -> &GeometryTable {
        &self.table
    }

    /// Builds a combined vertex/index buffer.
    ///
    /// # Arguments
    /// * `voxels` - Dense voxel array of the chunk
    /// * `masks` - Face visibility mask per voxel
    /// * `size` - Dimensions of the chunk
    ///
    /// # Returns
    /// The buffer, or a `GenerationError` if the arrays do not match the chunk volume or
    /// a visible voxel has no geometry
    pub fn assemble(
        &self,
        voxels: &[VoxelId],
        masks: &[FaceMask],
        size: ChunkSize,
    ) -> Result<MeshBuffer, GenerationError> {
        check_volume(voxels.len(), size)?;
        check_volume(masks.len(), size)?;

        let face_count = voxels
            .iter()
            .zip(masks)
            .filter(|(id, _)| **id != AIR)
            .map(|(_, mask)| mask.face_count() as usize)
            .sum();
        let mut buffer = MeshBuffer::with_capacity(voxels.len(), face_count);
        let mut scratch = Vec::with_capacity(6 * VERTICES_PER_FACE);

        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let index = size.index(x, y, z);
                    scratch.clear();
                    self.emit_voxel(voxels[index], masks[index], Point3::new(x, y, z), &mut scratch)?;
                    buffer.push_voxel(&scratch);
                }
            }
        }

        Ok(buffer)
    }

    /// Groups the world translation of every visible voxel by type.
    ///
    /// Voxels whose mask is empty are fully hidden and produce no instance.
    pub fn assemble_instanced(
        &self,
        voxels: &[VoxelId],
        masks: &[FaceMask],
        size: ChunkSize,
        origin: Point3<i32>,
    ) -> Result<InstancedMesh, GenerationError> {
        check_volume(voxels.len(), size)?;
        check_volume(masks.len(), size)?;

        let mut instances = InstancedMesh::new();
        for voxel in ChunkBlockIterator::new(voxels, size) {
            if masks[voxel.index].is_empty() {
                continue;
            }
            if !self.table.contains(voxel.id) {
                return Err(GenerationError::UnknownVoxelType(voxel.id));
            }
            let translation = Vector3::new(
                (origin.x + voxel.position.x as i32) as f32,
                (origin.y + voxel.position.y as i32) as f32,
                (origin.z + voxel.position.z as i32) as f32,
            );
            instances.push(voxel.id, translation);
        }

        Ok(instances)
    }

    /// Builds geometry for a chunk in the configured mode.
    pub fn build(&self, chunk: &VoxelChunk) -> Result<ChunkGeometry, GenerationError> {
        match self.mode {
            MeshMode::Combined => self
                .assemble(chunk.voxels(), chunk.masks(), chunk.size())
                .map(ChunkGeometry::Buffer),
            MeshMode::Instanced => self
                .assemble_instanced(chunk.voxels(), chunk.masks(), chunk.size(), chunk.origin())
                .map(ChunkGeometry::Instanced),
        }
    }

    /// Updates a chunk's geometry after the voxels at `affected` changed their id or mask.
    ///
    /// Combined buffers are patched in place through their emitted-range table. Instanced
    /// geometry, or a chunk without geometry, is rebuilt.
    pub fn patch(&self, chunk: &mut VoxelChunk, affected: &[usize]) -> Result<(), GenerationError> {
        let patchable = matches!(
            chunk.geometry().map(|geometry| geometry.as_ref()),
            Some(ChunkGeometry::Buffer(_))
        );
        if !patchable {
            let geometry = self.build(chunk)?;
            chunk.set_geometry(geometry);
            return Ok(());
        }

        let size = chunk.size();
        let mut replacements = Vec::with_capacity(affected.len());
        for &index in affected {
            let (Some(id), Some(mask)) = (chunk.get(index), chunk.masks().get(index).copied()) else {
                continue;
            };
            let mut vertices = Vec::new();
            self.emit_voxel(id, mask, size.position(index), &mut vertices)?;
            replacements.push((index, vertices));
        }

        if let Some(geometry) = chunk.geometry_mut() {
            if let ChunkGeometry::Buffer(buffer) = Arc::make_mut(geometry) {
                for (index, vertices) in replacements {
                    buffer.replace_voxel(index, vertices);
                }
            }
        }
        Ok(())
    }

    /// Appends the visible faces of one voxel, translated to its local position.
    fn emit_voxel(
        &self,
        id: VoxelId,
        mask: FaceMask,
        pos: Point3<usize>,
        out: &mut Vec<Vertex>,
    ) -> Result<(), GenerationError> {
        if id == AIR || mask.is_empty() {
            return Ok(());
        }
        let offset = Vector3::new(pos.x as f32, pos.y as f32, pos.z as f32);
        for side in mask.sides() {
            let face = self
                .table
                .face(id, side)
                .ok_or(GenerationError::UnknownVoxelType(id))?;
            out.extend(face.iter().map(|vertex| vertex.translated(offset)));
        }
        Ok(())
    }
}

fn check_volume(len: usize, size: ChunkSize) -> Result<(), GenerationError> {
    if len != size.volume() {
        return Err(GenerationError::VolumeMismatch {
            expected: size.volume(),
            actual: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::{block_side::BlockSide, VoxelTypeDefinition, VoxelTypeTable};
    use crate::engine_state::voxels::chunk::ChunkCoordinate;
    use crate::engine_state::voxels::visibility::VisibilityComputer;

    const STONE: VoxelId = 2;
    const DIRT: VoxelId = 3;

    fn assembler(mode: MeshMode) -> MeshAssembler {
        let types = VoxelTypeTable::new([
            VoxelTypeDefinition::uniform(STONE, "stone", 1),
            VoxelTypeDefinition::uniform(DIRT, "dirt", 2),
        ])
        .unwrap();
        MeshAssembler::new(Arc::new(GeometryTable::from_types(&types)), mode)
    }

    fn terrain(size: ChunkSize) -> Vec<VoxelId> {
        let mut voxels = vec![AIR; size.volume()];
        for z in 0..size.z {
            for x in 0..size.x {
                let height = (x * 7 + z * 3) % size.y;
                for y in 0..=height {
                    voxels[size.index(x, y, z)] = if y == height { DIRT } else { STONE };
                }
            }
        }
        voxels
    }

    #[test]
    fn test_single_voxel_emits_one_cube() {
        let size = ChunkSize::new(4, 4, 4);
        let mut voxels = vec![AIR; size.volume()];
        voxels[size.index(1, 1, 1)] = STONE;
        let masks = VisibilityComputer::compute(&voxels, size);

        let buffer = assembler(MeshMode::Combined).assemble(&voxels, &masks, size).unwrap();

        assert_eq!(buffer.vertex_count(), 24);
        assert_eq!(buffer.index_count(), 36);
        assert_eq!(buffer.ranges()[21], EmittedRange { vertex_start: 0, face_count: 6 });
        assert!(buffer
            .vertices()
            .iter()
            .all(|vertex| (1.0..=2.0).contains(&vertex.position().x)));
        // TOP is emitted first.
        assert_eq!(buffer.vertices()[0].normal(), BlockSide::TOP.normal());
    }

    #[test]
    fn test_buffer_sizing_rule() {
        let size = ChunkSize::new(6, 8, 5);
        let voxels = terrain(size);
        let masks = VisibilityComputer::compute(&voxels, size);

        let buffer = assembler(MeshMode::Combined).assemble(&voxels, &masks, size).unwrap();
        let faces: usize = masks.iter().map(|mask| mask.face_count() as usize).sum();

        assert_eq!(buffer.vertex_count(), faces * 4);
        assert_eq!(buffer.index_count(), buffer.vertex_count() / 4 * 6);
        assert_eq!(buffer.ranges().len(), size.volume());
    }

    #[test]
    fn test_arbitrary_masks_obey_sizing_rule() {
        let size = ChunkSize::new(3, 3, 3);
        let voxels = vec![STONE; size.volume()];
        let masks: Vec<FaceMask> = (0..size.volume())
            .map(|index| FaceMask::from_bits((index * 37 % 64) as u8))
            .collect();

        let buffer = assembler(MeshMode::Combined).assemble(&voxels, &masks, size).unwrap();
        let faces: usize = masks.iter().map(|mask| mask.face_count() as usize).sum();

        assert_eq!(buffer.vertex_count(), faces * 4);
        assert_eq!(buffer.index_count(), faces * 6);
    }

    #[test]
    fn test_assembly_is_reproducible() {
        let size = ChunkSize::new(5, 6, 5);
        let voxels = terrain(size);
        let masks = VisibilityComputer::compute(&voxels, size);
        let assembler = assembler(MeshMode::Combined);

        assert_eq!(
            assembler.assemble(&voxels, &masks, size).unwrap(),
            assembler.assemble(&voxels, &masks, size).unwrap()
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let size = ChunkSize::new(1, 1, 1);
        let masks = VisibilityComputer::compute(&[42], size);
        assert_eq!(
            assembler(MeshMode::Combined).assemble(&[42], &masks, size),
            Err(GenerationError::UnknownVoxelType(42))
        );
    }

    #[test]
    fn test_instanced_groups_visible_voxels() {
        let size = ChunkSize::new(3, 3, 3);
        let mut voxels = vec![STONE; size.volume()];
        voxels[size.index(0, 2, 0)] = DIRT;
        let masks = VisibilityComputer::compute(&voxels, size);
        let origin = ChunkCoordinate::new(1, -1).origin(size);

        let instances = assembler(MeshMode::Instanced)
            .assemble_instanced(&voxels, &masks, size, origin)
            .unwrap();

        // Every voxel but the hidden centre touches the boundary.
        assert_eq!(instances.instance_count(), 26);
        assert_eq!(instances.transforms(DIRT).len(), 1);
        let placed = instances.transforms(DIRT)[0].w;
        assert_eq!((placed.x, placed.y, placed.z), (3.0, 2.0, -3.0));
    }

    #[test]
    fn test_patch_equals_rebuild() {
        let size = ChunkSize::new(4, 6, 4);
        let assembler = assembler(MeshMode::Combined);
        let mut chunk = VoxelChunk::new(ChunkCoordinate::new(0, 0), size);
        chunk.fill(terrain(size)).unwrap();
        chunk
            .set_masks(VisibilityComputer::compute(chunk.voxels(), size))
            .unwrap();
        let geometry = assembler.build(&chunk).unwrap();
        chunk.set_geometry(geometry);
        let shared = chunk.geometry().cloned();

        for (pos, id) in [
            (Point3::new(2, 5, 2), STONE),
            (Point3::new(0, 0, 0), AIR),
            (Point3::new(1, 1, 3), AIR),
            (Point3::new(1, 1, 3), DIRT),
        ] {
            chunk.set(size.index(pos.x, pos.y, pos.z), id);
            let (voxels, masks) = chunk.voxels_and_masks_mut();
            let affected = VisibilityComputer::recompute_around(voxels, masks, size, pos, |id| id != AIR);
            assembler.patch(&mut chunk, &affected).unwrap();

            let rebuilt = assembler.build(&chunk).unwrap();
            assert_eq!(chunk.geometry().map(|geometry| geometry.as_ref()), Some(&rebuilt));
        }

        // Consumers holding the old geometry keep their copy.
        assert_ne!(shared.as_deref(), chunk.geometry().map(|geometry| geometry.as_ref()));
    }
}
