//! Error types for the voxel world core.
//!
//! The taxonomy follows the lifecycle of a request:
//! configuration problems are rejected before anything is scheduled, generation
//! failures stay scoped to a single chunk, and rejected edits leave the world untouched.

use thiserror::Error;

use crate::engine_state::voxels::block::VoxelId;

/// Invalid world, chunk or noise parameters.
///
/// Raised synchronously by [`crate::WorldConfig::validate`] and the constructors that
/// depend on it. Never produced once a chunk has been scheduled.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A chunk dimension is zero or does not fit the world coordinate range
    #[error("chunk dimensions must be positive and fit in i32, got {x}x{y}x{z}")]
    InvalidChunkSize {
        /// Width of the rejected size
        x: usize,
        /// Height of the rejected size
        y: usize,
        /// Depth of the rejected size
        z: usize,
    },

    /// A noise profile asks for no octaves
    #[error("noise profile `{profile}`: octave count must be positive, got {octaves}")]
    InvalidOctaves {
        /// Name of the offending profile
        profile: &'static str,
        /// The rejected octave count
        octaves: i32,
    },

    /// A noise profile parameter is not finite or out of range
    #[error("noise profile `{profile}`: `{field}` must be finite and positive, got {value}")]
    InvalidProfileValue {
        /// Name of the offending profile
        profile: &'static str,
        /// The rejected parameter
        field: &'static str,
        /// Its value
        value: f64,
    },

    /// An occupancy threshold with `min > max` or non-finite bounds
    #[error("noise profile `{profile}`: threshold range {min}..={max} is inverted")]
    InvertedThreshold {
        /// Name of the offending profile
        profile: &'static str,
        /// Lower bound as configured
        min: f64,
        /// Upper bound as configured
        max: f64,
    },

    /// No worker threads were requested
    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,

    /// The loaded window has a negative radius
    #[error("render distance must not be negative, got {0}")]
    NegativeRenderDistance(i32),

    /// A voxel type tries to redefine air
    #[error("voxel id {0} is reserved for air and cannot be redefined")]
    AirRedefined(VoxelId),

    /// Two voxel types share an id
    #[error("voxel id {0} is defined more than once")]
    DuplicateVoxelType(VoxelId),

    /// The terrain palette names a voxel type that does not exist
    #[error("terrain palette entry `{role}` refers to undefined voxel id {id}")]
    UndefinedPaletteVoxel {
        /// Palette role, such as `stone`
        role: &'static str,
        /// The undefined id
        id: VoxelId,
    },

    /// The configuration file could not be parsed
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// A failure inside a chunk pipeline worker.
///
/// The chunk that produced it is marked Failed; nothing else is affected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// A voxel or mask array does not match the chunk volume
    #[error("voxel buffer has {actual} entries, expected {expected}")]
    VolumeMismatch {
        /// The chunk volume
        expected: usize,
        /// Length of the array received
        actual: usize,
    },

    /// A visible voxel has no entry in the geometry table
    #[error("voxel id {0} has no geometry")]
    UnknownVoxelType(VoxelId),

    /// The pipeline panicked; carries the panic message
    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

/// Reasons an edit was ignored.
///
/// Rejected edits never mutate the world; callers may safely discard this value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EditRejected {
    /// The target chunk is neither Ready nor on its way
    #[error("chunk is not loaded")]
    ChunkNotLoaded,

    /// The target chunk is queued or still being built
    #[error("chunk is not ready for edits")]
    ChunkNotReady,

    /// The position lies below or above the chunk
    #[error("position lies outside the chunk's vertical bounds")]
    OutOfBounds,

    /// The new voxel id is not in the type table
    #[error("voxel id {0} is not defined")]
    UnknownVoxelType(VoxelId),

    /// Geometry could not be updated, so the voxel was restored
    #[error("chunk geometry could not be updated; the edit was undone")]
    MeshingFailed,
}

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameters
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(std::io::Error),

    /// Reading or writing a configuration file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
