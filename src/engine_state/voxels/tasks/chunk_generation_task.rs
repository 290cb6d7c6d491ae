//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, which runs the whole pipeline for one
//! chunk on a worker thread:
//!
//! 1. fill the voxel array from the chunk source (state Generating)
//! 2. compute the face visibility masks (state Meshing)
//! 3. assemble the geometry
//!
//! The task owns the chunk for its whole run and always hands it back (or reports why it
//! could not) through a `PipelineOutcome`, so the voxel buffer is never shared with the
//! coordinating thread while a worker writes it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, error};
use web_time::Instant;

use crate::core::GenerationError;
use crate::engine_state::{
    rendering::meshing::{ChunkGeometry, MeshAssembler},
    task_management::task::{CancellationToken, Task},
    voxels::{
        block::VoxelTypeTable,
        chunk::{ChunkCoordinate, ChunkState, VoxelChunk},
        terrain::ChunkSource,
        visibility::VisibilityComputer,
    },
};

/// What a pipeline run produced.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Generation and meshing completed; `geometry` is the chunk's own geometry handle
    Ready {
        /// The finished chunk
        chunk: VoxelChunk,
        /// Shared handle to its geometry
        geometry: Arc<ChunkGeometry>,
    },
    /// The chunk's token was cancelled between phases; the chunk is handed back unfinished
    Cancelled(VoxelChunk),
    /// The pipeline failed; the partially built chunk has been released
    Failed {
        /// The chunk that failed
        coord: ChunkCoordinate,
        /// Why it failed
        error: GenerationError,
    },
}

impl PipelineOutcome {
    /// Coordinate of the chunk this outcome belongs to.
    pub fn coord(&self) -> ChunkCoordinate {
        match self {
            PipelineOutcome::Ready { chunk, .. } | PipelineOutcome::Cancelled(chunk) => chunk.coord(),
            PipelineOutcome::Failed { coord, .. } => *coord,
        }
    }
}

/// Shared, read-only collaborators of every pipeline run.
#[derive(Clone)]
pub struct PipelineContext {
    /// Producer of voxel arrays
    pub source: Arc<dyn ChunkSource>,
    /// Opacity and definitions of every voxel id
    pub voxel_types: Arc<VoxelTypeTable>,
    /// Geometry builder in the configured mode
    pub assembler: Arc<MeshAssembler>,
}

/// A task that generates and meshes one chunk.
pub struct ChunkGenerationTask {
    /// The chunk being built, owned by the task until it returns
    chunk: VoxelChunk,
    /// Source, type table and assembler
    context: PipelineContext,
    /// Cancelled when the chunk leaves the window or the streamer shuts down
    cancel: CancellationToken,
    /// Current pipeline stage, readable from the coordinating thread
    stage: Arc<AtomicU8>,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `chunk` - An empty chunk at the coordinate to build
    /// * `context` - Shared pipeline collaborators
    /// * `cancel` - Token polled between phases
    /// * `stage` - Slot the task publishes its `ChunkState` into
    ///
    /// # Returns
    /// A new `ChunkGenerationTask` instance
    pub fn new(
        chunk: VoxelChunk,
        context: PipelineContext,
        cancel: CancellationToken,
        stage: Arc<AtomicU8>,
    ) -> Self {
        ChunkGenerationTask {
            chunk,
            context,
            cancel,
            stage,
        }
    }

    fn enter(&mut self, state: ChunkState) {
        self.chunk.set_state(state);
        self.stage.store(state as u8, Ordering::Release);
    }

    fn run(mut self) -> Result<PipelineOutcome, GenerationError> {
        let coord = self.chunk.coord();
        if self.cancel.is_cancelled() {
            debug!("Chunk {coord:?} cancelled before generation");
            return Ok(PipelineOutcome::Cancelled(self.chunk));
        }

        let started = Instant::now();
        self.enter(ChunkState::Generating);
        let voxels = self
            .context
            .source
            .generate_chunk(self.chunk.origin(), self.chunk.size())?;
        self.chunk.fill(voxels)?;
        let generated = started.elapsed();

        if self.cancel.is_cancelled() {
            debug!("Chunk {coord:?} cancelled after generation");
            return Ok(PipelineOutcome::Cancelled(self.chunk));
        }

        self.enter(ChunkState::Meshing);
        let types = &self.context.voxel_types;
        let masks = VisibilityComputer::compute_with(self.chunk.voxels(), self.chunk.size(), |id| {
            types.is_opaque(id)
        });
        self.chunk.set_masks(masks)?;
        let geometry = self.context.assembler.build(&self.chunk)?;
        let geometry = self.chunk.set_geometry(geometry);

        debug!(
            "Chunk {coord:?} built in {:?} (generation {:?}, {} solid voxels)",
            started.elapsed(),
            generated,
            self.chunk.solid_count()
        );
        Ok(PipelineOutcome::Ready {
            chunk: self.chunk,
            geometry,
        })
    }
}

impl Task for ChunkGenerationTask {
    type Output = PipelineOutcome;

    /// Runs the pipeline, converting errors and panics into `PipelineOutcome::Failed`.
    fn process(self: Box<Self>) -> PipelineOutcome {
        let coord = self.chunk.coord();
        let result = panic::catch_unwind(AssertUnwindSafe(move || self.run()))
            .unwrap_or_else(|payload| Err(GenerationError::WorkerPanic(panic_message(payload))));

        result.unwrap_or_else(|error| {
            error!("Chunk {coord:?} failed: {error}");
            PipelineOutcome::Failed { coord, error }
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}
