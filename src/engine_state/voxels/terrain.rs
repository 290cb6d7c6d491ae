//! # Terrain Module
//!
//! Turns two noise fields into the voxel contents of a chunk.
//!
//! Generation runs in two phases over world-space coordinates:
//!
//! 1. a height map with one column height per `(x, z)`, sampled from the height field;
//! 2. a cave-occupancy volume sampled from the cave field and binarised by its threshold.
//!
//! The assignment pass then walks every column from its height down to the floor:
//!
//! * `y == 0` becomes bedrock
//! * the top three layers become topsoil where the cave volume is occupied
//! * everything else becomes stone where occupied and air where carved out
//!
//! Voxels above the column height are never visited and stay air.

use bitvec::vec::BitVec;
use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::core::{ConfigurationError, GenerationError};
use crate::engine_state::voxels::block::{VoxelId, VoxelTypeTable, AIR};
use crate::engine_state::voxels::chunk::ChunkSize;
use crate::engine_state::voxels::noise_field::{NoiseField, NoiseProfile};

/// Number of layers below the surface that receive the topsoil voxel.
pub const TOPSOIL_DEPTH: i32 = 3;

/// Voxel ids the generator writes for each terrain role.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPalette {
    /// Bottom layer of every column
    pub bedrock: VoxelId,
    /// The top `TOPSOIL_DEPTH` voxels of a column
    pub topsoil: VoxelId,
    /// Everything between bedrock and topsoil
    pub stone: VoxelId,
}

impl Default for TerrainPalette {
    fn default() -> Self {
        Self {
            bedrock: 1,
            topsoil: 3,
            stone: 2,
        }
    }
}

impl TerrainPalette {
    /// Checks that every role names a defined, non-air voxel type.
    pub fn validate(&self, table: &VoxelTypeTable) -> Result<(), ConfigurationError> {
        for (role, id) in [
            ("bedrock", self.bedrock),
            ("topsoil", self.topsoil),
            ("stone", self.stone),
        ] {
            if id == AIR || table.get(id).is_none() {
                return Err(ConfigurationError::UndefinedPaletteVoxel { role, id });
            }
        }
        Ok(())
    }
}

/// Deterministic terrain synthesis for chunk columns.
///
/// A generator is immutable after construction and is shared between all workers
/// behind an `Arc`.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    height: NoiseField,
    cave: NoiseField,
    palette: TerrainPalette,
}

impl TerrainGenerator {
    /// Creates a generator from a world seed and the two noise profiles.
    ///
    /// # Arguments
    /// * `seed` - World seed; the cave field is derived from `seed + 1`
    /// * `height_profile` - Profile of the surface height field
    /// * `cave_profile` - Profile of the cave occupancy field
    /// * `palette` - Voxel ids written for each terrain role
    ///
    /// # Returns
    /// The generator, or a `ConfigurationError` if either profile is malformed
    pub fn new(
        seed: u32,
        height_profile: NoiseProfile,
        cave_profile: NoiseProfile,
        palette: TerrainPalette,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            height: NoiseField::new(seed, height_profile, "height")?,
            cave: NoiseField::new(seed.wrapping_add(1), cave_profile, "cave")?,
            palette,
        })
    }

    /// The palette written by this generator.
    pub fn palette(&self) -> TerrainPalette {
        self.palette
    }

    /// Column height at a world column, clamped to the chunk's vertical range.
    pub fn column_height(&self, world_x: i32, world_z: i32, size: ChunkSize) -> i32 {
        let ceiling = size.y as i32 - 1;
        self.height.height(world_x, world_z).clamp(0, ceiling)
    }

    /// Phase one: the height of every column of a chunk, indexed `x + z * sizeX`.
    pub fn height_map(&self, origin: Point3<i32>, size: ChunkSize) -> Vec<i32> {
        let mut heights = Vec::with_capacity(size.column_count());
        for z in 0..size.z {
            for x in 0..size.x {
                heights.push(self.column_height(
                    origin.x + x as i32,
                    origin.z + z as i32,
                    size,
                ));
            }
        }
        heights
    }

    /// Phase two: cave occupancy of every voxel at or below its column height.
    ///
    /// The bit layout matches the voxel flattening formula. Voxels above the column
    /// height are left unset because the assignment pass never reads them.
    pub fn cave_occupancy(&self, origin: Point3<i32>, size: ChunkSize, heights: &[i32]) -> BitVec {
        let mut occupied = BitVec::repeat(false, size.volume());
        for z in 0..size.z {
            for x in 0..size.x {
                let height = heights[x + z * size.x];
                for y in 0..=height as usize {
                    let world = Point3::new(origin.x + x as i32, y as i32, origin.z + z as i32);
                    if self.cave.is_occupied(world.x, world.y, world.z) {
                        occupied.set(size.index(x, y, z), true);
                    }
                }
            }
        }
        occupied
    }

    /// Generates the dense voxel array of the chunk whose minimum corner is `origin`.
    pub fn generate(&self, origin: Point3<i32>, size: ChunkSize) -> Vec<VoxelId> {
        let heights = self.height_map(origin, size);
        let occupied = self.cave_occupancy(origin, size, &heights);
        let mut voxels = vec![AIR; size.volume()];

        for z in 0..size.z {
            for x in 0..size.x {
                let height = heights[x + z * size.x];
                for y in (0..=height).rev() {
                    let index = size.index(x, y as usize, z);
                    let cave_occupied = occupied[index];

                    voxels[index] = if y == 0 {
                        self.palette.bedrock
                    } else if height - y < TOPSOIL_DEPTH && cave_occupied {
                        self.palette.topsoil
                    } else if cave_occupied {
                        self.palette.stone
                    } else {
                        AIR
                    };
                }
            }
        }

        voxels
    }
}

/// Produces the voxel contents of a chunk from its world origin.
///
/// The pipeline workers only see this trait, so hosts can stream pre-built or
/// persisted chunks through the same load queue as generated terrain.
pub trait ChunkSource: Send + Sync {
    /// Returns exactly `size.volume()` voxel ids laid out with the chunk flattening formula.
    fn generate_chunk(
        &self,
        origin: Point3<i32>,
        size: ChunkSize,
    ) -> Result<Vec<VoxelId>, GenerationError>;
}

impl ChunkSource for TerrainGenerator {
    fn generate_chunk(
        &self,
        origin: Point3<i32>,
        size: ChunkSize,
    ) -> Result<Vec<VoxelId>, GenerationError> {
        Ok(self.generate(origin, size))
    }
}
