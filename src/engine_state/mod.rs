//! # Engine State Module
//!
//! Everything that makes up a running voxel world.
//!
//! ## Key Components
//!
//! * `config` - World parameters and their validation
//! * `events` - Chunk and voxel notifications with an explicit subscription lifecycle
//! * `load_queue` - Pending and in-flight chunk bookkeeping
//! * `streamer` - The `ChunkStreamer`, which ties the other components together
//! * `task_management` - The bounded worker pool
//! * `voxels` - Voxel data, terrain synthesis, chunks and visibility
//! * `rendering` - Vertex format and mesh assembly
//!
//! ## Architecture
//!
//! The streamer is the only coordinator. It owns the registry, the queue, the pool and
//! the event bus, so there is no process-wide state and several worlds can coexist in
//! one process.

pub mod config;
pub mod events;
pub mod load_queue;
pub mod rendering;
pub mod streamer;
pub mod task_management;
pub mod voxels;
