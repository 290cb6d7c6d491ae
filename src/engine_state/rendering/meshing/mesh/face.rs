use std::collections::BTreeMap;

use cgmath::{Point3, Vector3};

use crate::engine_state::rendering::Vertex;
use crate::engine_state::voxels::block::{block_side::BlockSide, VoxelId, VoxelTypeTable};

/// Index pattern of one face, relative to its four vertices.
///
/// Both triangles wind counter-clockwise when seen from outside the voxel.
pub const FACE_INDICES: [u32; 6] = [2, 0, 1, 2, 1, 3];

/// Vertices emitted per face.
pub const VERTICES_PER_FACE: usize = 4;

/// Indices emitted per face.
pub const INDICES_PER_FACE: usize = FACE_INDICES.len();

/// The four vertices of one face of the unit cube `[0, 1]^3`.
pub type FaceVertices = [Vertex; VERTICES_PER_FACE];

/// Corner and spanning edges of a unit face.
///
/// Returns `(base, u, w)` where the face covers `base + s*u + t*w` and `w × u` is the
/// outward normal.
fn face_frame(side: BlockSide) -> (Point3<f32>, Vector3<f32>, Vector3<f32>) {
    let (x, y, z) = (Vector3::unit_x(), Vector3::unit_y(), Vector3::unit_z());
    match side {
        BlockSide::TOP => (Point3::new(0.0, 1.0, 0.0), x, z),
        BlockSide::BOTTOM => (Point3::new(0.0, 0.0, 0.0), z, x),
        BlockSide::LEFT => (Point3::new(0.0, 0.0, 0.0), y, z),
        BlockSide::RIGHT => (Point3::new(1.0, 0.0, 0.0), z, y),
        BlockSide::FRONT => (Point3::new(0.0, 0.0, 1.0), y, x),
        BlockSide::BACK => (Point3::new(0.0, 0.0, 0.0), x, y),
    }
}

/// Builds the unit-cube geometry of one face.
///
/// # Arguments
/// * `side` - Which face of the cube to build
/// * `material_index` - Material written into every vertex
///
/// # Returns
/// Four vertices ordered `base, base+w, base+u, base+u+w` with uvs
/// `(0,0), (0,1), (1,0), (1,1)`, matching [`FACE_INDICES`].
pub fn unit_face(side: BlockSide, material_index: u32) -> FaceVertices {
    let (base, u, w) = face_frame(side);
    let normal = side.normal();
    [
        Vertex::new(base, normal, 0.0, 0.0, material_index),
        Vertex::new(base + w, normal, 0.0, 1.0, material_index),
        Vertex::new(base + u, normal, 1.0, 0.0, material_index),
        Vertex::new(base + u + w, normal, 1.0, 1.0, material_index),
    ]
}

/// Precomputed unit-cube face geometry for every voxel type.
///
/// Built once from the voxel-type table and shared read-only by every mesh assembly.
#[derive(Clone, Debug, Default)]
pub struct GeometryTable {
    faces: BTreeMap<VoxelId, [FaceVertices; 6]>,
}

impl GeometryTable {
    /// Builds the six faces of every defined voxel type, using each type's per-face
    /// material indices.
    pub fn from_types(types: &VoxelTypeTable) -> Self {
        let faces = types
            .iter()
            .map(|definition| {
                let faces = BlockSide::all()
                    .map(|side| unit_face(side, definition.face_materials[side as usize]));
                (definition.id, faces)
            })
            .collect();
        GeometryTable { faces }
    }

    /// Face geometry of a voxel type, or `None` if the type is unknown.
    pub fn face(&self, id: VoxelId, side: BlockSide) -> Option<&FaceVertices> {
        self.faces.get(&id).map(|faces| &faces[side as usize])
    }

    /// Whether geometry exists for `id`.
    pub fn contains(&self, id: VoxelId) -> bool {
        self.faces.contains_key(&id)
    }

    /// Number of voxel types with geometry.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether the table holds no geometry at all.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::VoxelTypeDefinition;
    use cgmath::InnerSpace;

    #[test]
    fn test_triangles_face_outward() {
        for side in BlockSide::all() {
            let face = unit_face(side, 0);
            for triangle in FACE_INDICES.chunks(3) {
                let a = face[triangle[0] as usize].position();
                let b = face[triangle[1] as usize].position();
                let c = face[triangle[2] as usize].position();
                let winding = (b - a).cross(c - a);
                assert_eq!(winding.normalize(), side.normal(), "{side:?}");
            }
        }
    }

    #[test]
    fn test_faces_lie_on_cube_surface() {
        for side in BlockSide::all() {
            let normal = side.normal();
            // The plane coordinate along the normal is 1 for positive faces, 0 otherwise.
            let expected = if normal.x + normal.y + normal.z > 0.0 { 1.0 } else { 0.0 };
            for vertex in unit_face(side, 0) {
                let position = vertex.position();
                let along = position.x * normal.x.abs()
                    + position.y * normal.y.abs()
                    + position.z * normal.z.abs();
                assert_eq!(along, expected, "{side:?}");
                assert_eq!(vertex.normal(), normal);
            }
        }
    }

    #[test]
    fn test_table_uses_per_face_materials() {
        let mut grass = VoxelTypeDefinition::uniform(3, "grass", 10);
        grass.face_materials[BlockSide::TOP as usize] = 11;
        let table = GeometryTable::from_types(&VoxelTypeTable::new([grass]).unwrap());

        assert_eq!(table.len(), 1);
        assert_eq!(table.face(3, BlockSide::TOP).unwrap()[0].material_index(), 11);
        assert_eq!(table.face(3, BlockSide::BOTTOM).unwrap()[3].material_index(), 10);
        assert!(table.face(4, BlockSide::TOP).is_none());
    }
}
