//! # Voxel Task System
//!
//! Tasks that build chunks off the coordinating thread.

pub mod chunk_generation_task;

pub use chunk_generation_task::{ChunkGenerationTask, PipelineContext, PipelineOutcome};
