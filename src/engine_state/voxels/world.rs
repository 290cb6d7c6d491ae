//! # World Module
//!
//! This module provides the `ChunkRegistry`, the map from chunk coordinates to the
//! chunks that are currently loaded.
//!
//! ## Architecture
//!
//! The world uses sparse storage: only chunks inside the observer's window are kept in
//! memory, which allows effectively unbounded worlds in X and Z. A chunk only enters the
//! registry once it is Ready; chunks still being built are owned by their worker.
//!
//! The streamer keeps the registry inside an `MtResource`, so other threads can read
//! loaded chunks while the coordinating thread inserts and removes them in short
//! critical sections.

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Point3;

use crate::engine_state::rendering::meshing::ChunkGeometry;
use crate::engine_state::voxels::block::VoxelId;
use crate::engine_state::voxels::chunk::{ChunkCoordinate, ChunkSize, VoxelChunk};

/// The set of Ready chunks, keyed by coordinate.
#[derive(Debug)]
pub struct ChunkRegistry {
    /// A mapping from chunk coordinates to chunk data.
    chunks: HashMap<ChunkCoordinate, VoxelChunk>,
    /// Dimensions shared by every chunk in the registry
    size: ChunkSize,
}

impl ChunkRegistry {
    /// Creates a new, empty registry for chunks of the given size.
    pub fn new(size: ChunkSize) -> Self {
        ChunkRegistry {
            chunks: HashMap::new(),
            size,
        }
    }

    /// Dimensions of the chunks in this registry.
    pub fn chunk_size(&self) -> ChunkSize {
        self.size
    }

    /// Adds a chunk, returning any chunk previously stored at the same coordinate.
    pub fn insert(&mut self, chunk: VoxelChunk) -> Option<VoxelChunk> {
        self.chunks.insert(chunk.coord(), chunk)
    }

    /// Removes and returns the chunk at `coord`.
    pub fn remove(&mut self, coord: &ChunkCoordinate) -> Option<VoxelChunk> {
        self.chunks.remove(coord)
    }

    /// Retrieves the chunk at `coord`.
    pub fn get(&self, coord: &ChunkCoordinate) -> Option<&VoxelChunk> {
        self.chunks.get(coord)
    }

    /// Retrieves the chunk at `coord` for editing.
    pub fn get_mut(&mut self, coord: &ChunkCoordinate) -> Option<&mut VoxelChunk> {
        self.chunks.get_mut(coord)
    }

    /// Whether a chunk is loaded at `coord`.
    pub fn contains(&self, coord: &ChunkCoordinate) -> bool {
        self.chunks.contains_key(coord)
    }

    /// Coordinates of every loaded chunk, sorted.
    pub fn coordinates(&self) -> Vec<ChunkCoordinate> {
        let mut coordinates: Vec<ChunkCoordinate> = self.chunks.keys().copied().collect();
        coordinates.sort();
        coordinates
    }

    /// Shared handle to the geometry of a loaded chunk.
    pub fn geometry(&self, coord: &ChunkCoordinate) -> Option<Arc<ChunkGeometry>> {
        self.chunks.get(coord).and_then(|chunk| chunk.geometry().cloned())
    }

    /// Voxel at a world position, if its chunk is loaded.
    pub fn voxel_at(&self, world: Point3<i32>) -> Option<VoxelId> {
        let (coord, local) = ChunkCoordinate::split_world_voxel(world, self.size);
        self.chunks.get(&coord)?.get_at(local)
    }

    /// Removes every chunk whose coordinate fails `keep`, returning the removed chunks.
    pub fn drain_where<F>(&mut self, mut remove: F) -> Vec<VoxelChunk>
    where
        F: FnMut(&ChunkCoordinate) -> bool,
    {
        let doomed: Vec<ChunkCoordinate> = self
            .chunks
            .keys()
            .filter(|coord| remove(coord))
            .copied()
            .collect();
        doomed
            .iter()
            .filter_map(|coord| self.chunks.remove(coord))
            .collect()
    }

    /// Number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
