//! # Visibility Module
//!
//! Computes the per-voxel face visibility masks of a chunk.
//!
//! A face is exposed when the neighbour it looks at lies outside the chunk or does not
//! occlude it. Chunk boundaries are always treated as exposed, so seams between loaded
//! chunks emit both faces.

use bitvec::vec::BitVec;
use cgmath::Point3;

use crate::engine_state::voxels::block::{block_side::BlockSide, block_side::FaceMask, VoxelId, AIR};
use crate::engine_state::voxels::chunk::ChunkSize;

/// Stateless face visibility computation over dense voxel arrays.
pub struct VisibilityComputer;

impl VisibilityComputer {
    /// Computes masks where only air exposes a neighbouring face.
    ///
    /// # Arguments
    /// * `voxels` - Dense voxel array laid out with the chunk flattening formula
    /// * `size` - Dimensions of the chunk
    ///
    /// # Returns
    /// One mask per voxel; air voxels always get an empty mask
    pub fn compute(voxels: &[VoxelId], size: ChunkSize) -> Vec<FaceMask> {
        Self::compute_with(voxels, size, |id| id != AIR)
    }

    /// Computes masks where any voxel for which `is_opaque` returns `false` exposes
    /// its neighbours' faces.
    pub fn compute_with<F>(voxels: &[VoxelId], size: ChunkSize, is_opaque: F) -> Vec<FaceMask>
    where
        F: Fn(VoxelId) -> bool,
    {
        let opaque: BitVec = voxels.iter().map(|id| *id != AIR && is_opaque(*id)).collect();
        let mut masks = vec![FaceMask::NONE; voxels.len()];

        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let index = size.index(x, y, z);
                    if voxels[index] == AIR {
                        continue;
                    }
                    masks[index] = Self::mask_of(size, Point3::new(x, y, z), |neighbor| {
                        opaque[neighbor]
                    });
                }
            }
        }

        masks
    }

    /// Mask of the single voxel at `pos`, looking its neighbours up directly.
    pub fn compute_at<F>(voxels: &[VoxelId], size: ChunkSize, pos: Point3<usize>, is_opaque: F) -> FaceMask
    where
        F: Fn(VoxelId) -> bool,
    {
        if voxels[size.index(pos.x, pos.y, pos.z)] == AIR {
            return FaceMask::NONE;
        }
        Self::mask_of(size, pos, |neighbor| {
            let id = voxels[neighbor];
            id != AIR && is_opaque(id)
        })
    }

    /// Recomputes the masks of the voxel at `pos` and its in-chunk neighbours after that
    /// voxel changed.
    ///
    /// # Returns
    /// The flat indices whose masks were recomputed, in ascending order
    pub fn recompute_around<F>(
        voxels: &[VoxelId],
        masks: &mut [FaceMask],
        size: ChunkSize,
        pos: Point3<usize>,
        is_opaque: F,
    ) -> Vec<usize>
    where
        F: Fn(VoxelId) -> bool,
    {
        let mut affected = vec![(size.index(pos.x, pos.y, pos.z), pos)];
        for side in BlockSide::all() {
            if let Some(neighbor) = Self::neighbor(size, pos, side) {
                affected.push((size.index(neighbor.x, neighbor.y, neighbor.z), neighbor));
            }
        }
        affected.sort_unstable_by_key(|(index, _)| *index);

        for (index, position) in &affected {
            masks[*index] = Self::compute_at(voxels, size, *position, &is_opaque);
        }

        affected.into_iter().map(|(index, _)| index).collect()
    }

    /// In-chunk neighbour of `pos` across `side`, or `None` at the chunk boundary.
    pub fn neighbor(size: ChunkSize, pos: Point3<usize>, side: BlockSide) -> Option<Point3<usize>> {
        let offset = side.neighbor_offset();
        let target = Point3::new(
            pos.x as i64 + offset.x as i64,
            pos.y as i64 + offset.y as i64,
            pos.z as i64 + offset.z as i64,
        );
        let in_bounds = (0..size.x as i64).contains(&target.x)
            && (0..size.y as i64).contains(&target.y)
            && (0..size.z as i64).contains(&target.z);
        in_bounds.then(|| Point3::new(target.x as usize, target.y as usize, target.z as usize))
    }

    fn mask_of<F>(size: ChunkSize, pos: Point3<usize>, occludes: F) -> FaceMask
    where
        F: Fn(usize) -> bool,
    {
        let mut mask = FaceMask::NONE;
        for side in BlockSide::all() {
            let exposed = match Self::neighbor(size, pos, side) {
                Some(neighbor) => !occludes(size.index(neighbor.x, neighbor.y, neighbor.z)),
                None => true,
            };
            if exposed {
                mask.insert(side);
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: VoxelId = 2;
    const GLASS: VoxelId = 9;

    #[test]
    fn test_single_voxel_exposes_all_faces() {
        let size = ChunkSize::new(4, 4, 4);
        let mut voxels = vec![AIR; size.volume()];
        voxels[size.index(1, 1, 1)] = STONE;

        let masks = VisibilityComputer::compute(&voxels, size);

        assert_eq!(masks.len(), voxels.len());
        assert_eq!(masks[21], FaceMask::ALL);
        assert_eq!(masks[21].bits(), 63);
        assert_eq!(masks.iter().filter(|mask| !mask.is_empty()).count(), 1);
    }

    #[test]
    fn test_enclosed_voxel_is_hidden() {
        let size = ChunkSize::new(3, 3, 3);
        let voxels = vec![STONE; size.volume()];
        let masks = VisibilityComputer::compute(&voxels, size);

        assert_eq!(masks[size.index(1, 1, 1)], FaceMask::NONE);
        // Corners touch three chunk boundaries.
        assert_eq!(masks[size.index(0, 0, 0)].face_count(), 3);
        assert!(masks[size.index(0, 0, 0)].contains(BlockSide::BOTTOM));
        assert!(masks[size.index(0, 0, 0)].contains(BlockSide::LEFT));
        assert!(masks[size.index(0, 0, 0)].contains(BlockSide::BACK));
    }

    #[test]
    fn test_boundary_is_exposed() {
        let size = ChunkSize::new(1, 1, 1);
        let masks = VisibilityComputer::compute(&[STONE], size);
        assert_eq!(masks[0], FaceMask::ALL);
    }

    #[test]
    fn test_transparent_neighbours_expose_faces() {
        let size = ChunkSize::new(3, 1, 1);
        let voxels = vec![STONE, GLASS, STONE];

        let air_only = VisibilityComputer::compute(&voxels, size);
        assert!(!air_only[0].contains(BlockSide::RIGHT));

        let with_glass = VisibilityComputer::compute_with(&voxels, size, |id| id != GLASS);
        assert!(with_glass[0].contains(BlockSide::RIGHT));
        assert!(with_glass[2].contains(BlockSide::LEFT));
        // Glass itself is still hidden behind stone.
        assert!(!with_glass[1].contains(BlockSide::LEFT));
        assert!(!with_glass[1].contains(BlockSide::RIGHT));
    }

    #[test]
    fn test_recompute_around_matches_full_pass() {
        let size = ChunkSize::new(4, 4, 4);
        let mut voxels = vec![STONE; size.volume()];
        let mut masks = VisibilityComputer::compute(&voxels, size);
        let pos = Point3::new(1, 2, 1);

        voxels[size.index(pos.x, pos.y, pos.z)] = AIR;
        let affected = VisibilityComputer::recompute_around(&voxels, &mut masks, size, pos, |id| id != AIR);

        assert_eq!(affected.len(), 7);
        assert!(affected.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(masks, VisibilityComputer::compute(&voxels, size));
    }

    #[test]
    fn test_place_then_destroy_restores_masks() {
        let size = ChunkSize::new(4, 4, 4);
        let mut voxels = vec![AIR; size.volume()];
        for x in 0..4 {
            for z in 0..4 {
                voxels[size.index(x, 0, z)] = STONE;
            }
        }
        let mut masks = VisibilityComputer::compute(&voxels, size);
        let before = masks.clone();
        let pos = Point3::new(2, 1, 2);
        let index = size.index(pos.x, pos.y, pos.z);
        let opaque = |id: VoxelId| id != AIR;

        voxels[index] = STONE;
        VisibilityComputer::recompute_around(&voxels, &mut masks, size, pos, opaque);
        assert!(!masks[size.index(2, 0, 2)].contains(BlockSide::TOP));

        voxels[index] = AIR;
        VisibilityComputer::recompute_around(&voxels, &mut masks, size, pos, opaque);
        assert_eq!(masks, before);
    }

    #[test]
    fn test_neighbor_respects_bounds() {
        let size = ChunkSize::new(2, 2, 2);
        let origin = Point3::new(0, 0, 0);
        assert_eq!(VisibilityComputer::neighbor(size, origin, BlockSide::LEFT), None);
        assert_eq!(
            VisibilityComputer::neighbor(size, origin, BlockSide::FRONT),
            Some(Point3::new(0, 0, 1))
        );
    }
}
