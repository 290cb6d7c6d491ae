//! # Voxel World Core
//!
//! This module contains the data side of the voxel world: how voxels are identified,
//! how terrain is synthesised, how chunks store voxels and how face visibility is
//! derived from them.
//!
//! ## Architecture
//!
//! * **Block**: Voxel ids, the voxel-type table and face directions
//! * **Chunk**: Fixed-size dense voxel arrays and their coordinates
//! * **Noise field / Terrain**: Seeded fractal noise and the column/cave rules built on it
//! * **Visibility**: Per-voxel exposed-face masks
//! * **World**: The registry of Ready chunks
//! * **Tasks**: The per-chunk pipeline run on worker threads
//!
//! ## Data Flow
//!
//! 1. The streamer hands an empty chunk to a `ChunkGenerationTask`
//! 2. The task fills it from the terrain generator and computes its visibility masks
//! 3. The mesh assembler turns voxels and masks into geometry
//! 4. The Ready chunk moves into the registry
//!
//! ## Thread Safety
//!
//! * A chunk is owned by exactly one worker until it is Ready
//! * Noise fields and the generator are immutable after construction and shared freely
//! * The registry is read from any thread and written only by the coordinating thread

pub mod block;
pub mod chunk;
pub mod noise_field;
pub mod tasks;
pub mod terrain;
pub mod visibility;
pub mod world;
