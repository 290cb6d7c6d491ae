#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! The data and scheduling core of a chunked voxel world: seeded terrain synthesis,
//! per-voxel face visibility, mesh assembly and observer-driven chunk streaming.
//!
//! ## Key Modules
//!
//! * `core` - Shared primitives and the error taxonomy
//! * `engine_state` - Configuration, the chunk streamer, the worker pool, voxel data and
//!   mesh assembly
//!
//! ## Architecture
//!
//! A `ChunkStreamer` owns everything a world needs. It queues the chunks around an
//! observer, builds each one on a bounded pool of worker threads
//! (terrain, then visibility, then geometry) and reports the results through
//! subscribed callbacks. Rendering, collision and persistence stay with the consumer.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use voxel_world::{ChunkCoordinate, ChunkState, ChunkStreamer, WorldConfig};
//!
//! let mut config = WorldConfig::default();
//! config.render_distance = 0;
//!
//! let mut streamer = ChunkStreamer::new(config).unwrap();
//! streamer.on_observer_chunk_changed(ChunkCoordinate::new(0, 0));
//! assert!(streamer.wait_until_idle(Duration::from_secs(30)));
//! assert_eq!(streamer.chunk_state(ChunkCoordinate::new(0, 0)), ChunkState::Ready);
//! ```

use std::time::Duration;

use cgmath::Point3;
use log::{info, warn};
use web_time::Instant;

pub mod core;
pub mod engine_state;

pub use crate::core::{ConfigurationError, EditRejected, Error, GenerationError, MtResource};
pub use engine_state::{
    config::WorldConfig,
    events::{ChunkEvent, EventBus, SubscriptionId},
    rendering::{
        meshing::{ChunkGeometry, GeometryTable, InstancedMesh, MeshAssembler, MeshBuffer, MeshMode},
        Vertex,
    },
    streamer::{ChunkStreamer, StreamerStats},
    voxels::{
        block::{
            block_side::{BlockSide, FaceMask},
            VoxelId, VoxelTypeDefinition, VoxelTypeTable, AIR,
        },
        chunk::{ChunkCoordinate, ChunkSize, ChunkState, VoxelChunk},
        noise_field::{NoiseField, NoiseProfile, ThresholdRange},
        terrain::{ChunkSource, TerrainGenerator, TerrainPalette},
        visibility::VisibilityComputer,
    },
};

/// Number of observer moves made by the headless driver.
const OBSERVER_STEPS: usize = 8;

/// Longest wait for the window to finish loading after each move.
const STEP_TIMEOUT: Duration = Duration::from_secs(60);

/// Installs the `env_logger` backend, writing to stdout.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Calling this more than once
/// is harmless.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG");
    if log_builder.try_init().is_ok() {
        info!("Logger initialized");
    }
}

/// Runs the headless driver.
///
/// Loads a `WorldConfig` from the JSON file named by the first command-line argument
/// (defaults otherwise), walks an observer along +X, digs one voxel and logs streaming
/// statistics after every step.
pub fn run() -> Result<(), Error> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading world configuration from {path}");
            WorldConfig::from_path(path)?
        }
        None => WorldConfig::default(),
    };
    let size = config.chunk_size;
    let mut streamer = ChunkStreamer::new(config)?;

    let ready = MtResource::new(0usize);
    let counter = ready.clone();
    streamer.subscribe(move |event| {
        if let ChunkEvent::ChunkReady { .. } = event {
            *counter.get_mut() += 1;
        }
    });

    for step in 0..OBSERVER_STEPS {
        let started = Instant::now();
        let position = Point3::new(step as f32 * size.x as f32 * 0.5, 0.0, 0.0);
        streamer.update_observer(position);
        let idle = streamer.wait_until_idle(STEP_TIMEOUT);
        let stats = streamer.stats();
        info!(
            "Step {step}: observer in {:?}, {} loaded, {} failed, idle {idle}, took {:?}",
            streamer.observer(),
            stats.loaded,
            stats.failed,
            started.elapsed()
        );

        if step == 0 {
            dig_surface(&mut streamer, size.y);
        }
    }

    info!(
        "{} chunk(s) became ready, peak concurrency {}",
        *ready.get(),
        streamer.peak_busy()
    );
    streamer.shutdown();
    Ok(())
}

/// Removes the topmost solid voxel of the column at world (1, 1).
fn dig_surface(streamer: &mut ChunkStreamer, height: usize) {
    let surface = (0..height as i32).rev().find(|y| {
        streamer
            .voxel_at(Point3::new(1, *y, 1))
            .is_some_and(|id| id != AIR)
    });
    let Some(y) = surface else {
        warn!("No surface voxel found to dig");
        return;
    };
    match streamer.destroy_voxel(Point3::new(1, y, 1)) {
        Ok(old) => info!("Dug voxel {old} at (1, {y}, 1)"),
        Err(reason) => warn!("Dig at (1, {y}, 1) rejected: {reason}"),
    }
}
