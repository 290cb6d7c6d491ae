//! # Chunk Iteration Module
//!
//! This module provides an iterator over the non-air voxels of a dense voxel array.
//!
//! Voxels are visited in flat-index order (x fastest, then y, then z), which is the
//! insertion order mesh assembly relies on for reproducible output.

use cgmath::Point3;

use crate::engine_state::voxels::block::{VoxelId, AIR};

use super::ChunkSize;

/// A non-air voxel yielded by [`ChunkBlockIterator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SolidVoxel {
    /// Flat index into the voxel array
    pub index: usize,
    /// Chunk-local position
    pub position: Point3<usize>,
    /// The voxel's type
    pub id: VoxelId,
}

/// An iterator over all non-air voxels of a chunk-shaped array.
///
/// The position is tracked incrementally alongside the flat index, so no division is
/// needed per voxel.
pub struct ChunkBlockIterator<'a> {
    /// The voxel array being traversed
    voxels: &'a [VoxelId],
    /// Dimensions used to wrap the position counters
    size: ChunkSize,
    /// Next flat index to inspect
    current_offset: usize,
    /// Current X position within the chunk
    local_x: usize,
    /// Current Y position within the chunk
    local_y: usize,
    /// Current Z position within the chunk
    local_z: usize,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates a new iterator positioned before the first voxel.
    pub fn new(voxels: &'a [VoxelId], size: ChunkSize) -> Self {
        ChunkBlockIterator {
            voxels,
            size,
            current_offset: 0,
            local_x: 0,
            local_y: 0,
            local_z: 0,
        }
    }

    /// Moves the position counters one voxel forward.
    fn advance(&mut self) {
        self.current_offset += 1;
        self.local_x += 1;

        // Handle end of row
        if self.local_x == self.size.x {
            self.local_x = 0;
            self.local_y += 1;

            // Handle end of plane
            if self.local_y == self.size.y {
                self.local_y = 0;
                self.local_z += 1;
            }
        }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = SolidVoxel;

    fn next(&mut self) -> Option<SolidVoxel> {
        while let Some(&id) = self.voxels.get(self.current_offset) {
            let index = self.current_offset;
            let position = Point3::new(self.local_x, self.local_y, self.local_z);
            self.advance();

            if id != AIR {
                return Some(SolidVoxel {
                    index,
                    position,
                    id,
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_air_and_tracks_positions() {
        let size = ChunkSize::new(3, 2, 2);
        let mut voxels = vec![AIR; size.volume()];
        voxels[size.index(2, 0, 0)] = 4;
        voxels[size.index(0, 1, 0)] = 5;
        voxels[size.index(1, 1, 1)] = 6;

        let found: Vec<SolidVoxel> = ChunkBlockIterator::new(&voxels, size).collect();

        assert_eq!(found.len(), 3);
        for voxel in &found {
            assert_eq!(size.position(voxel.index), voxel.position);
            assert_eq!(voxels[voxel.index], voxel.id);
        }
        assert_eq!(found[1].position, Point3::new(0, 1, 0));
        assert_eq!(found[2].id, 6);
    }

    #[test]
    fn test_empty_chunk_yields_nothing() {
        let size = ChunkSize::new(4, 4, 4);
        let voxels = vec![AIR; size.volume()];
        assert_eq!(ChunkBlockIterator::new(&voxels, size).count(), 0);
    }
}
