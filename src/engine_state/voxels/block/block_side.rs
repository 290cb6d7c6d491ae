//! # Block Side Module
//!
//! This module defines the six faces of a voxel and the per-voxel face visibility mask.
//!
//! The face order is fixed and shared by visibility computation, mesh assembly and the
//! mask bit layout: [TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK].

use cgmath::Vector3;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Represents the six possible faces of a voxel block.
///
/// Each variant's discriminant is also its bit position inside a [`FaceMask`], so the
/// declaration order must not change.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive, Serialize, Deserialize)]
pub enum BlockSide {
    /// The top face (facing positive Y)
    TOP = 0,

    /// The bottom face (facing negative Y)
    BOTTOM = 1,

    /// The left face (facing negative X)
    LEFT = 2,

    /// The right face (facing positive X)
    RIGHT = 3,

    /// The front face (facing positive Z)
    FRONT = 4,

    /// The back face (facing negative Z)
    BACK = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in mask bit order.
    ///
    /// The order is: [TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK]
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::TOP,
            BlockSide::BOTTOM,
            BlockSide::LEFT,
            BlockSide::RIGHT,
            BlockSide::FRONT,
            BlockSide::BACK,
        ]
    }

    /// Converts a bit position (0..6) back into a side.
    pub fn from_bit(bit: u8) -> Option<BlockSide> {
        BlockSide::from_u8(bit)
    }

    /// Offset to the neighbouring voxel this face looks at.
    pub fn neighbor_offset(self) -> Vector3<i32> {
        match self {
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
        }
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> Vector3<f32> {
        let offset = self.neighbor_offset();
        Vector3::new(offset.x as f32, offset.y as f32, offset.z as f32)
    }

    /// The single-bit mask for this side.
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A 6-bit face visibility mask for one voxel.
///
/// A set bit means the corresponding face is exposed and must be emitted into the mesh.
#[repr(transparent)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable,
)]
pub struct FaceMask(u8);

impl FaceMask {
    /// No face exposed.
    pub const NONE: FaceMask = FaceMask(0);
    /// All six faces exposed (`0b111111`).
    pub const ALL: FaceMask = FaceMask(0b11_1111);

    /// Builds a mask from raw bits; bits above the sixth are discarded.
    pub const fn from_bits(bits: u8) -> Self {
        FaceMask(bits & Self::ALL.0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the given face is exposed.
    pub const fn contains(self, side: BlockSide) -> bool {
        self.0 & side.bit() != 0
    }

    /// Marks the given face as exposed.
    pub fn insert(&mut self, side: BlockSide) {
        self.0 |= side.bit();
    }

    /// Number of exposed faces (the popcount).
    pub const fn face_count(self) -> u32 {
        self.0.count_ones()
    }

    /// `true` when no face is exposed.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the exposed faces in the fixed bit order.
    pub fn sides(self) -> impl Iterator<Item = BlockSide> {
        BlockSide::all()
            .into_iter()
            .filter(move |side| self.contains(*side))
    }
}
