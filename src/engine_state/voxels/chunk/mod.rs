//! # Chunk Module
//!
//! This module provides the `VoxelChunk` struct and the coordinate types used to
//! address chunks and the voxels inside them.
//!
//! ## Storage
//!
//! A chunk owns a dense array of `sizeX * sizeY * sizeZ` voxel ids. Every access goes
//! through the same flattening formula:
//!
//! ```text
//! index = x + y * sizeX + z * sizeX * sizeY
//! ```
//!
//! The array is allocated once when the chunk is created and is never resized. The
//! face visibility masks use the same layout, one mask per voxel.
//!
//! ## Ownership
//!
//! While a chunk is Generating or Meshing it is owned by the worker that builds it.
//! Once Ready it lives in the chunk registry and is only mutated by edits issued from
//! the coordinating thread.

use std::sync::Arc;

use cgmath::Point3;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::core::{ConfigurationError, GenerationError};
use crate::engine_state::rendering::meshing::ChunkGeometry;

use super::block::{block_side::FaceMask, VoxelId, AIR};

pub mod chunk_iteration;

/// Dimensions of every chunk in the world, in voxels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSize {
    /// Width along X
    pub x: usize,
    /// Height along Y (the world is one chunk tall)
    pub y: usize,
    /// Depth along Z
    pub z: usize,
}

impl ChunkSize {
    /// Creates a new chunk size.
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total number of voxels in a chunk.
    ///
    /// Cannot overflow for sizes that passed [`ChunkSize::validate`].
    pub const fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Total number of voxels, or `None` if it does not fit in `usize`.
    pub fn checked_volume(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    /// Number of voxel columns in a chunk.
    pub const fn column_count(&self) -> usize {
        self.x * self.z
    }

    /// Flattens a local position into an array index.
    ///
    /// The caller guarantees the position is in bounds.
    #[inline]
    pub const fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.x + z * self.x * self.y
    }

    /// Inverse of [`ChunkSize::index`].
    #[inline]
    pub fn position(&self, index: usize) -> Point3<usize> {
        let plane = self.x * self.y;
        Point3::new(index % self.x, (index % plane) / self.x, index / plane)
    }

    /// Flattens a signed local position, returning `None` when it lies outside the chunk.
    #[inline]
    pub fn checked_index(&self, pos: Point3<i32>) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.z < 0 {
            return None;
        }
        let (x, y, z) = (pos.x as usize, pos.y as usize, pos.z as usize);
        if x >= self.x || y >= self.y || z >= self.z {
            return None;
        }
        Some(self.index(x, y, z))
    }

    /// Rejects zero-sized dimensions, dimensions beyond `i32::MAX` and volumes that
    /// overflow `usize`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let in_range = |dimension: usize| (1..=i32::MAX as usize).contains(&dimension);
        let valid = in_range(self.x)
            && in_range(self.y)
            && in_range(self.z)
            && self.checked_volume().is_some();
        if !valid {
            return Err(ConfigurationError::InvalidChunkSize {
                x: self.x,
                y: self.y,
                z: self.z,
            });
        }
        Ok(())
    }
}

/// Address of a vertical chunk column in the unbounded world grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoordinate {
    /// Column index along X
    pub x: i32,
    /// Column index along Z
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World-space voxel position of the chunk's minimum corner.
    pub fn origin(&self, size: ChunkSize) -> Point3<i32> {
        Point3::new(self.x * size.x as i32, 0, self.z * size.z as i32)
    }

    /// Chunk containing a continuous world-space position (e.g. an observer).
    pub fn from_world_position(pos: Point3<f32>, size: ChunkSize) -> Self {
        Self {
            x: (pos.x / size.x as f32).floor() as i32,
            z: (pos.z / size.z as f32).floor() as i32,
        }
    }

    /// Splits a world voxel position into the owning chunk and the chunk-local position.
    ///
    /// The local Y is passed through unchanged; callers check it against the chunk height.
    pub fn split_world_voxel(pos: Point3<i32>, size: ChunkSize) -> (Self, Point3<i32>) {
        let (sx, sz) = (size.x as i32, size.z as i32);
        let coord = Self::new(pos.x.div_euclid(sx), pos.z.div_euclid(sz));
        let local = Point3::new(pos.x.rem_euclid(sx), pos.y, pos.z.rem_euclid(sz));
        (coord, local)
    }

    /// Chebyshev distance between two chunk columns.
    pub fn distance(&self, other: &ChunkCoordinate) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// Whether this coordinate lies in the square window of half-width `radius` around `center`.
    pub fn is_within(&self, center: &ChunkCoordinate, radius: i32) -> bool {
        self.distance(center) <= radius
    }

    /// All coordinates of the square window `[center - radius, center + radius]`,
    /// ordered nearest ring first and row-major inside each ring.
    pub fn window(center: ChunkCoordinate, radius: i32) -> Vec<ChunkCoordinate> {
        let side = (2 * radius.max(0) + 1) as usize;
        let mut coordinates = Vec::with_capacity(side * side);
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                coordinates.push(ChunkCoordinate::new(center.x + dx, center.z + dz));
            }
        }
        coordinates.sort_by_key(|coord| coord.distance(&center));
        coordinates
    }
}

/// Lifecycle of a chunk coordinate.
///
/// `Unloaded -> Queued -> Generating -> Meshing -> Ready -> Unloading -> (removed)`,
/// with `Failed` reachable from Generating and Meshing.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ChunkState {
    /// Not known to the streamer
    Unloaded = 0,
    /// Waiting in the load queue
    Queued = 1,
    /// A worker is synthesising terrain
    Generating = 2,
    /// A worker (or an edit) is computing visibility and geometry
    Meshing = 3,
    /// Voxels and geometry are complete and may be consumed
    Ready = 4,
    /// Leaving the world; resources are being released
    Unloading = 5,
    /// The pipeline failed; terminal until explicitly requested again
    Failed = 6,
}

/// A fixed-size column of voxels together with its derived visibility and geometry.
#[derive(Debug, Clone)]
pub struct VoxelChunk {
    coord: ChunkCoordinate,
    size: ChunkSize,
    voxels: Vec<VoxelId>,
    masks: Vec<FaceMask>,
    geometry: Option<Arc<ChunkGeometry>>,
    state: ChunkState,
}

impl VoxelChunk {
    /// Creates an all-air chunk in the Unloaded state.
    pub fn new(coord: ChunkCoordinate, size: ChunkSize) -> Self {
        Self {
            coord,
            size,
            voxels: vec![AIR; size.volume()],
            masks: vec![FaceMask::NONE; size.volume()],
            geometry: None,
            state: ChunkState::Unloaded,
        }
    }

    /// The chunk's column coordinate.
    pub fn coord(&self) -> ChunkCoordinate {
        self.coord
    }

    /// The chunk's dimensions.
    pub fn size(&self) -> ChunkSize {
        self.size
    }

    /// World-space origin, `(coord.x * sizeX, 0, coord.z * sizeZ)`.
    pub fn origin(&self) -> Point3<i32> {
        self.coord.origin(self.size)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Moves the chunk to a new lifecycle state.
    pub fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    /// The dense voxel array.
    pub fn voxels(&self) -> &[VoxelId] {
        &self.voxels
    }

    /// Voxel at a flat index.
    pub fn get(&self, index: usize) -> Option<VoxelId> {
        self.voxels.get(index).copied()
    }

    /// Voxel at a local position.
    pub fn get_at(&self, pos: Point3<i32>) -> Option<VoxelId> {
        self.size.checked_index(pos).map(|index| self.voxels[index])
    }

    /// Replaces the voxel at a flat index, returning the previous id.
    pub fn set(&mut self, index: usize, id: VoxelId) -> Option<VoxelId> {
        self.voxels
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, id))
    }

    /// Replaces the voxel at a local position, returning the previous id.
    pub fn set_at(&mut self, pos: Point3<i32>, id: VoxelId) -> Option<VoxelId> {
        let index = self.size.checked_index(pos)?;
        self.set(index, id)
    }

    /// Overwrites the whole voxel array with generated content.
    ///
    /// The new content must have exactly the chunk volume so the array length never changes.
    pub fn fill(&mut self, voxels: Vec<VoxelId>) -> Result<(), GenerationError> {
        if voxels.len() != self.size.volume() {
            return Err(GenerationError::VolumeMismatch {
                expected: self.size.volume(),
                actual: voxels.len(),
            });
        }
        self.voxels = voxels;
        Ok(())
    }

    /// Per-voxel face visibility masks.
    pub fn masks(&self) -> &[FaceMask] {
        &self.masks
    }

    /// Mutable access to the masks, used by incremental edits.
    pub fn masks_mut(&mut self) -> &mut [FaceMask] {
        &mut self.masks
    }

    /// Voxels and masks borrowed together, the latter mutably.
    pub fn voxels_and_masks_mut(&mut self) -> (&[VoxelId], &mut [FaceMask]) {
        (&self.voxels, &mut self.masks)
    }

    /// Replaces all masks; the length must match the chunk volume.
    pub fn set_masks(&mut self, masks: Vec<FaceMask>) -> Result<(), GenerationError> {
        if masks.len() != self.size.volume() {
            return Err(GenerationError::VolumeMismatch {
                expected: self.size.volume(),
                actual: masks.len(),
            });
        }
        self.masks = masks;
        Ok(())
    }

    /// Assembled geometry, present once the chunk has been meshed.
    pub fn geometry(&self) -> Option<&Arc<ChunkGeometry>> {
        self.geometry.as_ref()
    }

    /// Mutable handle to the geometry slot.
    pub fn geometry_mut(&mut self) -> &mut Option<Arc<ChunkGeometry>> {
        &mut self.geometry
    }

    /// Stores freshly assembled geometry and returns the shared handle to it.
    pub fn set_geometry(&mut self, geometry: ChunkGeometry) -> Arc<ChunkGeometry> {
        let geometry = Arc::new(geometry);
        self.geometry = Some(geometry.clone());
        geometry
    }

    /// Copy of the voxel array for external persistence.
    pub fn snapshot(&self) -> Vec<VoxelId> {
        self.voxels.clone()
    }

    /// Number of non-air voxels.
    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|id| **id != AIR).count()
    }
}
