//! # Block Module
//!
//! Voxel identifiers and the voxel-type table.
//!
//! The core never interprets a voxel id beyond "is it air" and "is it solid";
//! materials are opaque indices handed through to the renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::ConfigurationError;

pub mod block_side;

/// The underlying integer type used to represent voxel types in memory.
pub type VoxelId = u16;

/// Voxel id reserved for empty space.
pub const AIR: VoxelId = 0;

/// Definition of one voxel type as supplied by the host's asset layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelTypeDefinition {
    /// Identifier stored in the voxel arrays. Must not be [`AIR`].
    pub id: VoxelId,
    /// Human readable name, only used for logging.
    pub name: String,
    /// Material index for each face, in [`block_side::BlockSide`] order
    /// [TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK].
    pub face_materials: [u32; 6],
    /// Whether the voxel hides the faces of its neighbours.
    #[serde(default = "default_solid")]
    pub solid: bool,
}

fn default_solid() -> bool {
    true
}

impl VoxelTypeDefinition {
    /// Creates a solid voxel type using the same material on every face.
    pub fn uniform(id: VoxelId, name: &str, material: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            face_materials: [material; 6],
            solid: true,
        }
    }
}

/// Lookup table from voxel id to its definition.
///
/// Backed by an ordered map so that iteration (and anything built from it) is
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<VoxelTypeDefinition>", into = "Vec<VoxelTypeDefinition>")]
pub struct VoxelTypeTable {
    types: BTreeMap<VoxelId, VoxelTypeDefinition>,
}

impl VoxelTypeTable {
    /// Builds a table, rejecting redefinitions of air and duplicate ids.
    pub fn new(
        definitions: impl IntoIterator<Item = VoxelTypeDefinition>,
    ) -> Result<Self, ConfigurationError> {
        let mut types = BTreeMap::new();
        for definition in definitions {
            if definition.id == AIR {
                return Err(ConfigurationError::AirRedefined(definition.id));
            }
            let id = definition.id;
            if types.insert(id, definition).is_some() {
                return Err(ConfigurationError::DuplicateVoxelType(id));
            }
        }
        Ok(Self { types })
    }

    /// Looks up a voxel type.
    pub fn get(&self, id: VoxelId) -> Option<&VoxelTypeDefinition> {
        self.types.get(&id)
    }

    /// Whether `id` is defined (air is always implicitly defined).
    pub fn contains(&self, id: VoxelId) -> bool {
        id == AIR || self.types.contains_key(&id)
    }

    /// Whether a voxel of this id occludes the faces of its neighbours.
    ///
    /// Air and unknown ids never occlude.
    pub fn is_opaque(&self, id: VoxelId) -> bool {
        self.types.get(&id).is_some_and(|definition| definition.solid)
    }

    /// Iterates over all definitions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &VoxelTypeDefinition> {
        self.types.values()
    }

    /// Number of defined (non-air) types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type besides air is defined.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TryFrom<Vec<VoxelTypeDefinition>> for VoxelTypeTable {
    type Error = ConfigurationError;

    fn try_from(definitions: Vec<VoxelTypeDefinition>) -> Result<Self, Self::Error> {
        VoxelTypeTable::new(definitions)
    }
}

impl From<VoxelTypeTable> for Vec<VoxelTypeDefinition> {
    fn from(table: VoxelTypeTable) -> Self {
        table.types.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rejects_air_and_duplicates() {
        let air = VoxelTypeDefinition::uniform(AIR, "air", 0);
        assert_eq!(
            VoxelTypeTable::new([air]),
            Err(ConfigurationError::AirRedefined(AIR))
        );

        let stone = VoxelTypeDefinition::uniform(2, "stone", 1);
        assert_eq!(
            VoxelTypeTable::new([stone.clone(), stone]),
            Err(ConfigurationError::DuplicateVoxelType(2))
        );
    }

    #[test]
    fn test_opacity() {
        let mut glass = VoxelTypeDefinition::uniform(5, "glass", 3);
        glass.solid = false;
        let table =
            VoxelTypeTable::new([VoxelTypeDefinition::uniform(2, "stone", 1), glass]).unwrap();

        assert!(table.is_opaque(2));
        assert!(!table.is_opaque(5));
        assert!(!table.is_opaque(AIR));
        assert!(!table.is_opaque(42));
        assert!(table.contains(AIR));
        assert!(!table.contains(42));
    }
}
