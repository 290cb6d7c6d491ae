//! # World Configuration
//!
//! Everything the host supplies about a world: chunk dimensions, streaming radius,
//! seed, noise profiles, voxel types and worker count.
//!
//! Configurations are plain serde values. They can be built in code, starting from
//! `WorldConfig::default()`, or loaded from JSON. Missing fields fall back to their defaults:
//!
//! ```
//! use voxel_world::WorldConfig;
//!
//! let config = WorldConfig::from_json_str(r#"{ "seed": 7, "render_distance": 1 }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.chunk_size.y, 64);
//! ```

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::{ConfigurationError, Error};
use crate::engine_state::rendering::meshing::MeshMode;
use crate::engine_state::voxels::{
    block::{block_side::BlockSide, VoxelTypeDefinition, VoxelTypeTable},
    chunk::ChunkSize,
    noise_field::NoiseProfile,
    terrain::TerrainPalette,
};

/// Default number of chunk workers, and so the default concurrency limit.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1;

/// Parameters of a streamed voxel world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Dimensions of every chunk
    pub chunk_size: ChunkSize,
    /// Half-width, in chunks, of the square window kept loaded around the observer
    pub render_distance: i32,
    /// World seed shared by every noise field
    pub seed: u32,
    /// Surface height field
    pub height_profile: NoiseProfile,
    /// Cave occupancy field
    pub cave_profile: NoiseProfile,
    /// Every voxel type besides air
    pub voxel_types: VoxelTypeTable,
    /// Voxel ids the terrain generator writes
    pub palette: TerrainPalette,
    /// Maximum number of chunks in the Generating or Meshing state at once
    pub concurrency_limit: usize,
    /// Shape of the geometry produced per chunk
    pub mesh_mode: MeshMode,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let mut grass = VoxelTypeDefinition::uniform(3, "grass", 2);
        grass.face_materials[BlockSide::TOP as usize] = 3;
        grass.face_materials[BlockSide::BOTTOM as usize] = 4;

        let voxel_types = VoxelTypeTable::new([
            VoxelTypeDefinition::uniform(1, "bedrock", 0),
            VoxelTypeDefinition::uniform(2, "stone", 1),
            grass,
        ])
        .unwrap_or_default();

        Self {
            chunk_size: ChunkSize::new(16, 64, 16),
            render_distance: 2,
            seed: 0,
            height_profile: NoiseProfile::default_height(),
            cave_profile: NoiseProfile::default_cave(),
            voxel_types,
            palette: TerrainPalette::default(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            mesh_mode: MeshMode::Combined,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: WorldConfig = serde_json::from_str(json)
            .map_err(|error| ConfigurationError::Malformed(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&json)?)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string_pretty(self)
            .map_err(|error| ConfigurationError::Malformed(error.to_string()))
    }

    /// Checks every parameter before any work is scheduled.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let result = self.check();
        if let Err(error) = &result {
            warn!("Rejected world configuration: {error}");
        }
        result
    }

    fn check(&self) -> Result<(), ConfigurationError> {
        self.chunk_size.validate()?;
        if self.render_distance < 0 {
            return Err(ConfigurationError::NegativeRenderDistance(self.render_distance));
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigurationError::ZeroConcurrency);
        }
        self.height_profile.validate("height")?;
        self.cave_profile.validate("cave")?;
        self.palette.validate(&self.voxel_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.voxel_types.len(), 3);
        assert_eq!(config.concurrency_limit, 1);
    }

    #[test]
    fn test_json_round_trip_preserves_config() {
        let mut config = WorldConfig::default();
        config.seed = 99;
        config.mesh_mode = MeshMode::Instanced;

        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"instanced\""));
        assert_eq!(WorldConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert_eq!(
            WorldConfig::from_json_str(r#"{ "chunk_size": { "x": 0, "y": 4, "z": 4 } }"#),
            Err(ConfigurationError::InvalidChunkSize { x: 0, y: 4, z: 4 })
        );
        assert_eq!(
            WorldConfig::from_json_str(r#"{ "concurrency_limit": 0 }"#),
            Err(ConfigurationError::ZeroConcurrency)
        );
        assert_eq!(
            WorldConfig::from_json_str(r#"{ "render_distance": -1 }"#),
            Err(ConfigurationError::NegativeRenderDistance(-1))
        );
        assert!(matches!(
            WorldConfig::from_json_str("{ not json"),
            Err(ConfigurationError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_bad_voxel_tables() {
        let json = r#"{ "voxel_types": [
            { "id": 0, "name": "air", "face_materials": [0, 0, 0, 0, 0, 0] }
        ] }"#;
        assert!(matches!(
            WorldConfig::from_json_str(json),
            Err(ConfigurationError::Malformed(_))
        ));

        let json = r#"{ "voxel_types": [
            { "id": 1, "name": "bedrock", "face_materials": [0, 0, 0, 0, 0, 0] }
        ] }"#;
        assert_eq!(
            WorldConfig::from_json_str(json),
            Err(ConfigurationError::UndefinedPaletteVoxel {
                role: "topsoil",
                id: 3
            })
        );
    }

    #[test]
    fn test_rejects_bad_profiles() {
        let mut config = WorldConfig::default();
        config.cave_profile.octaves = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidOctaves {
                profile: "cave",
                octaves: 0
            })
        );
    }
}
