//! # Chunk Streamer
//!
//! The `ChunkStreamer` keeps the chunks around an observer loaded. It owns the chunk
//! registry, the load queue, the worker pool and the event bus, and is driven by a single
//! coordinating thread.
//!
//! ## Lifecycle of a coordinate
//!
//! `Unloaded -> Queued -> Generating -> Meshing -> Ready -> Unloading -> (removed)`, with
//! `Failed` reachable from Generating and Meshing.
//!
//! * `request_load` appends a coordinate to the FIFO load queue, at most once
//! * admission dispatches queued coordinates while fewer than `concurrency_limit` chunks
//!   are in flight
//! * `update` collects finished pipelines, publishes their events and admits more work
//! * `on_observer_chunk_changed` unloads everything outside the new window before it
//!   requests what is missing inside it
//!
//! ## Ownership
//!
//! A chunk belongs to its worker until the pipeline returns, then moves into the registry.
//! Unloading an in-flight chunk only cancels its token; the voxel buffer is released when
//! the worker hands the chunk back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cgmath::Point3;
use log::{debug, error, info, trace, warn};
use web_time::Instant;

use crate::core::{EditRejected, Error, GenerationError, MtResource};
use crate::engine_state::{
    config::WorldConfig,
    events::{ChunkEvent, EventBus, SubscriptionId},
    load_queue::{InFlight, LoadQueue},
    rendering::meshing::{ChunkGeometry, GeometryTable, MeshAssembler},
    task_management::{task::CancellationToken, TaskManager},
    voxels::{
        block::{VoxelId, AIR},
        chunk::{ChunkCoordinate, ChunkState, VoxelChunk},
        tasks::{ChunkGenerationTask, PipelineContext, PipelineOutcome},
        terrain::{ChunkSource, TerrainGenerator},
        visibility::VisibilityComputer,
        world::ChunkRegistry,
    },
};

/// Longest single wait for a worker inside the cooperative wait loops.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long `shutdown` waits for in-flight workers to hand their chunks back.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Point-in-time counters of a streamer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamerStats {
    /// Ready chunks in the registry
    pub loaded: usize,
    /// Coordinates waiting for a worker
    pub queued: usize,
    /// Coordinates handed to a worker
    pub in_flight: usize,
    /// Coordinates whose pipeline failed
    pub failed: usize,
    /// Highest number of workers ever running at once
    pub peak_busy: usize,
}

/// Streams chunks in and out around an observer.
pub struct ChunkStreamer {
    config: WorldConfig,
    context: PipelineContext,
    registry: MtResource<ChunkRegistry>,
    queue: LoadQueue,
    failed: HashMap<ChunkCoordinate, GenerationError>,
    task_manager: TaskManager<PipelineOutcome>,
    events: EventBus,
    observer: Option<ChunkCoordinate>,
    root_token: CancellationToken,
    is_shut_down: bool,
}

impl ChunkStreamer {
    /// Creates a streamer that generates terrain from the configured noise profiles.
    ///
    /// # Returns
    /// The streamer, or an error if the configuration is invalid or the workers could not
    /// be spawned
    pub fn new(config: WorldConfig) -> Result<Self, Error> {
        config.validate()?;
        let generator = TerrainGenerator::new(
            config.seed,
            config.height_profile.clone(),
            config.cave_profile.clone(),
            config.palette,
        )?;
        Self::with_source(config, Arc::new(generator))
    }

    /// Creates a streamer that fills chunks from a custom source.
    ///
    /// # Arguments
    /// * `config` - World parameters; the noise profiles are ignored by custom sources
    /// * `source` - Producer of the voxel array of each chunk
    pub fn with_source(config: WorldConfig, source: Arc<dyn ChunkSource>) -> Result<Self, Error> {
        config.validate()?;

        let voxel_types = Arc::new(config.voxel_types.clone());
        let table = Arc::new(GeometryTable::from_types(&voxel_types));
        let context = PipelineContext {
            source,
            voxel_types,
            assembler: Arc::new(MeshAssembler::new(table, config.mesh_mode)),
        };
        let task_manager = TaskManager::new(config.concurrency_limit, "chunk-worker")?;

        info!(
            "Chunk streamer ready: {}x{}x{} chunks, render distance {}, {:?} meshing",
            config.chunk_size.x,
            config.chunk_size.y,
            config.chunk_size.z,
            config.render_distance,
            config.mesh_mode
        );

        Ok(Self {
            registry: MtResource::new(ChunkRegistry::new(config.chunk_size)),
            config,
            context,
            queue: LoadQueue::new(),
            failed: HashMap::new(),
            task_manager,
            events: EventBus::new(),
            observer: None,
            root_token: CancellationToken::new(),
            is_shut_down: false,
        })
    }

    /// The configuration this streamer was built from.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Shared handle to the registry of Ready chunks, for readers on other threads.
    pub fn registry(&self) -> MtResource<ChunkRegistry> {
        self.registry.clone()
    }

    /// The chunk the observer is currently in, once it has been set.
    pub fn observer(&self) -> Option<ChunkCoordinate> {
        self.observer
    }

    /// Current lifecycle state of a coordinate.
    pub fn chunk_state(&self, coord: ChunkCoordinate) -> ChunkState {
        if let Some(chunk) = self.registry.get().get(&coord) {
            return chunk.state();
        }
        if let Some(handle) = self.queue.in_flight(&coord) {
            return handle.state();
        }
        if self.queue.is_pending(&coord) {
            return ChunkState::Queued;
        }
        if self.failed.contains_key(&coord) {
            return ChunkState::Failed;
        }
        ChunkState::Unloaded
    }

    /// Why the pipeline of a Failed coordinate failed.
    pub fn failure(&self, coord: ChunkCoordinate) -> Option<&GenerationError> {
        self.failed.get(&coord)
    }

    /// Asks for a chunk to be loaded.
    ///
    /// Coordinates that are already Queued, Generating, Meshing, Ready or Unloading are
    /// left alone. A Failed coordinate is forgotten and queued again.
    ///
    /// # Returns
    /// `true` if the coordinate was queued
    pub fn request_load(&mut self, coord: ChunkCoordinate) -> bool {
        if self.is_shut_down {
            return false;
        }
        match self.chunk_state(coord) {
            ChunkState::Unloaded => {}
            ChunkState::Failed => {
                debug!("Retrying failed chunk {coord:?}");
                self.failed.remove(&coord);
            }
            _ => return false,
        }
        let queued = self.queue.enqueue(coord);
        self.admit();
        queued
    }

    /// Dispatches queued coordinates while a worker is free.
    fn admit(&mut self) {
        while self.task_manager.has_capacity() {
            let Some(coord) = self.queue.pop_next() else {
                break;
            };

            let handle = InFlight::new(self.root_token.child());
            let mut chunk = VoxelChunk::new(coord, self.config.chunk_size);
            chunk.set_state(ChunkState::Queued);
            let task = ChunkGenerationTask::new(
                chunk,
                self.context.clone(),
                handle.cancel.clone(),
                handle.stage.clone(),
            );

            match self.task_manager.publish_task(Box::new(task)) {
                Ok(()) => self.queue.start(coord, handle),
                Err(_) => {
                    warn!("No worker accepted chunk {coord:?}, keeping it queued");
                    self.queue.requeue_front(coord);
                    break;
                }
            }
        }
    }

    /// Collects finished pipelines without blocking and admits more work.
    ///
    /// # Returns
    /// The number of pipelines collected
    pub fn update(&mut self) -> usize {
        let outcomes = self.task_manager.try_completed();
        let collected = outcomes.len();
        for outcome in outcomes {
            self.handle_outcome(outcome);
        }
        self.admit();
        collected
    }

    fn handle_outcome(&mut self, outcome: PipelineOutcome) {
        let coord = outcome.coord();
        let cancelled = self
            .queue
            .finish(&coord)
            .map_or(true, |handle| handle.cancel.is_cancelled());

        if cancelled || matches!(outcome, PipelineOutcome::Cancelled(_)) {
            debug!("Discarding cancelled chunk {coord:?}");
            if !self.is_shut_down && self.in_window(&coord) {
                self.queue.enqueue(coord);
            }
            return;
        }

        match outcome {
            PipelineOutcome::Ready { mut chunk, geometry } => {
                chunk.set_state(ChunkState::Ready);
                self.registry.get_mut().insert(chunk);
                self.events.publish(ChunkEvent::ChunkReady { coord, geometry });
            }
            PipelineOutcome::Failed { error, .. } => {
                self.failed.insert(coord, error.clone());
                self.events.publish(ChunkEvent::ChunkFailed {
                    coord,
                    reason: error,
                });
            }
            PipelineOutcome::Cancelled(_) => {}
        }
    }

    fn in_window(&self, coord: &ChunkCoordinate) -> bool {
        self.observer
            .is_some_and(|center| coord.is_within(&center, self.config.render_distance))
    }

    /// Moves the observer to a world-space position.
    ///
    /// # Returns
    /// `true` if the observer entered a different chunk and the window was recomputed
    pub fn update_observer(&mut self, position: Point3<f32>) -> bool {
        let coord = ChunkCoordinate::from_world_position(position, self.config.chunk_size);
        if self.observer == Some(coord) {
            return false;
        }
        self.on_observer_chunk_changed(coord);
        true
    }

    /// Recomputes the loaded window around `center`.
    ///
    /// Ready chunks outside the window are unloaded, queued coordinates outside it are
    /// dropped and in-flight ones cancelled. Only then is every missing coordinate inside
    /// the window requested, nearest ring first.
    pub fn on_observer_chunk_changed(&mut self, center: ChunkCoordinate) {
        if self.is_shut_down {
            return;
        }
        self.observer = Some(center);
        let radius = self.config.render_distance;
        let outside = |coord: &ChunkCoordinate| !coord.is_within(&center, radius);

        let unloaded = self.registry.get_mut().drain_where(outside);
        for mut chunk in unloaded {
            chunk.set_state(ChunkState::Unloading);
            trace!("Unloading chunk {:?}", chunk.coord());
            self.events.publish(ChunkEvent::ChunkUnloaded {
                coord: chunk.coord(),
            });
        }

        let dropped = self.queue.retain_pending(|coord| !outside(coord));
        let mut cancelled = 0;
        for coord in self.queue.in_flight_coordinates() {
            if outside(&coord) && self.queue.cancel(&coord) {
                cancelled += 1;
            }
        }
        self.failed.retain(|coord, _| !outside(coord));
        if dropped + cancelled > 0 {
            debug!("Window moved to {center:?}: dropped {dropped} queued, cancelled {cancelled} in-flight chunk(s)");
        }

        for coord in ChunkCoordinate::window(center, radius) {
            if self.chunk_state(coord) == ChunkState::Unloaded {
                self.queue.enqueue(coord);
            }
        }
        self.admit();
    }

    /// Sets the voxel at a world position and re-meshes its chunk.
    ///
    /// # Returns
    /// The previous voxel id, or why the edit was ignored. A rejected edit leaves the world
    /// untouched.
    pub fn apply_edit(&mut self, position: Point3<i32>, id: VoxelId) -> Result<VoxelId, EditRejected> {
        let result = self.edit(position, id);
        if let Err(reason) = &result {
            debug!("Edit at {position:?} rejected: {reason}");
        }
        result
    }

    fn edit(&mut self, position: Point3<i32>, id: VoxelId) -> Result<VoxelId, EditRejected> {
        let size = self.config.chunk_size;
        if position.y < 0 || position.y >= size.y as i32 {
            return Err(EditRejected::OutOfBounds);
        }
        if !self.context.voxel_types.contains(id) {
            return Err(EditRejected::UnknownVoxelType(id));
        }

        let (coord, local) = ChunkCoordinate::split_world_voxel(position, size);
        let mut registry = self.registry.get_mut();
        let Some(chunk) = registry.get_mut(&coord) else {
            return Err(if self.queue.contains(&coord) {
                EditRejected::ChunkNotReady
            } else {
                EditRejected::ChunkNotLoaded
            });
        };
        if chunk.state() != ChunkState::Ready {
            return Err(EditRejected::ChunkNotReady);
        }
        let Some(index) = size.checked_index(local) else {
            return Err(EditRejected::OutOfBounds);
        };
        let Some(old) = chunk.set(index, id) else {
            return Err(EditRejected::OutOfBounds);
        };
        if old == id {
            return Ok(old);
        }

        chunk.set_state(ChunkState::Meshing);
        let remeshed = remesh_edit(&self.context, chunk, index, old);
        chunk.set_state(ChunkState::Ready);
        if let Err(error) = remeshed {
            error!("Re-meshing chunk {coord:?} failed, edit undone: {error}");
            return Err(EditRejected::MeshingFailed);
        }
        let geometry = chunk.geometry().cloned();
        drop(registry);

        if let Some(geometry) = geometry {
            self.events
                .publish(ChunkEvent::ChunkRemeshed { coord, geometry });
        }
        self.events.publish(ChunkEvent::VoxelEdited {
            position,
            old,
            new: id,
        });
        Ok(old)
    }

    /// Places a voxel, replacing whatever was there.
    pub fn place_voxel(&mut self, position: Point3<i32>, id: VoxelId) -> Result<VoxelId, EditRejected> {
        self.apply_edit(position, id)
    }

    /// Replaces the voxel at `position` with air.
    pub fn destroy_voxel(&mut self, position: Point3<i32>) -> Result<VoxelId, EditRejected> {
        self.apply_edit(position, AIR)
    }

    /// Voxel at a world position, if its chunk is Ready.
    pub fn voxel_at(&self, position: Point3<i32>) -> Option<VoxelId> {
        self.registry.get().voxel_at(position)
    }

    /// Coordinates of all Ready chunks, sorted.
    pub fn loaded_coordinates(&self) -> Vec<ChunkCoordinate> {
        self.registry.get().coordinates()
    }

    /// Geometry of a Ready chunk.
    pub fn chunk_geometry(&self, coord: ChunkCoordinate) -> Option<Arc<ChunkGeometry>> {
        self.registry.get().geometry(&coord)
    }

    /// Drives the pipeline until nothing is queued or in flight.
    ///
    /// The thread suspends only inside bounded waits for the next worker result, checking
    /// for shutdown on every iteration.
    ///
    /// # Returns
    /// `true` if the streamer became idle before `timeout` elapsed
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.update();
            if self.queue.is_idle() || self.is_shut_down {
                return self.queue.is_idle();
            }
            if self.task_manager.in_flight() == 0 {
                warn!(
                    "Load queue stalled with {} pending chunk(s)",
                    self.queue.pending_len()
                );
                return false;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Some(outcome) = self.task_manager.wait_completed((deadline - now).min(POLL_INTERVAL)) {
                self.handle_outcome(outcome);
            }
        }
    }

    /// Registers a callback for every subsequent chunk event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ChunkEvent) + Send + 'static,
    {
        self.events.subscribe(callback)
    }

    /// Removes a callback registered with [`ChunkStreamer::subscribe`].
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Workers currently running a pipeline.
    pub fn busy(&self) -> usize {
        self.task_manager.busy()
    }

    /// Highest number of pipelines ever observed running at once.
    pub fn peak_busy(&self) -> usize {
        self.task_manager.peak_busy()
    }

    /// Current counters.
    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            loaded: self.registry.get().len(),
            queued: self.queue.pending_len(),
            in_flight: self.queue.in_flight_len(),
            failed: self.failed.len(),
            peak_busy: self.task_manager.peak_busy(),
        }
    }

    /// Whether `shutdown` has run.
    pub fn is_shut_down(&self) -> bool {
        self.is_shut_down
    }

    /// Cancels all work and unloads every chunk.
    ///
    /// In-flight workers are signalled and awaited so no voxel buffer outlives the call on
    /// a worker. Later calls are no-ops; dropping the streamer shuts it down too.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;
        self.root_token.cancel();

        let dropped = self.queue.pending_len();
        self.queue.clear_pending();

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while self.queue.in_flight_len() > 0 && self.task_manager.in_flight() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "{} chunk worker(s) still running at shutdown",
                    self.queue.in_flight_len()
                );
                break;
            }
            if let Some(outcome) = self.task_manager.wait_completed(POLL_INTERVAL) {
                self.handle_outcome(outcome);
            }
        }

        let unloaded = self.registry.get_mut().drain_where(|_| true);
        for chunk in &unloaded {
            self.events.publish(ChunkEvent::ChunkUnloaded {
                coord: chunk.coord(),
            });
        }
        self.failed.clear();
        self.observer = None;

        info!(
            "Chunk streamer shut down: {} chunk(s) unloaded, {dropped} queued request(s) dropped",
            unloaded.len()
        );
    }
}

impl Drop for ChunkStreamer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Refreshes masks and geometry after the voxel at `index` changed from `old`.
///
/// If the geometry cannot be updated the voxel is restored, its neighbourhood masks are
/// recomputed and the chunk keeps its previous geometry.
fn remesh_edit(
    context: &PipelineContext,
    chunk: &mut VoxelChunk,
    index: usize,
    old: VoxelId,
) -> Result<(), GenerationError> {
    let size = chunk.size();
    let position = size.position(index);
    let types = &context.voxel_types;
    let recompute = |chunk: &mut VoxelChunk| {
        let (voxels, masks) = chunk.voxels_and_masks_mut();
        VisibilityComputer::recompute_around(voxels, masks, size, position, |voxel| {
            types.is_opaque(voxel)
        })
    };

    let affected = recompute(chunk);
    if let Err(error) = context.assembler.patch(chunk, &affected) {
        chunk.set(index, old);
        recompute(chunk);
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::VoxelTypeTable;
    use crate::engine_state::voxels::chunk::ChunkSize;

    const WAIT: Duration = Duration::from_secs(10);

    fn small_config() -> WorldConfig {
        WorldConfig {
            chunk_size: ChunkSize::new(4, 8, 4),
            render_distance: 1,
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = WorldConfig {
            concurrency_limit: 0,
            ..small_config()
        };
        assert!(matches!(
            ChunkStreamer::new(config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_request_load_is_idempotent() {
        let mut streamer = ChunkStreamer::new(small_config()).unwrap();
        let coord = ChunkCoordinate::new(0, 0);

        assert!(streamer.request_load(coord));
        assert!(!streamer.request_load(coord));
        assert!(streamer.wait_until_idle(WAIT));
        assert_eq!(streamer.chunk_state(coord), ChunkState::Ready);
        assert!(!streamer.request_load(coord));
        assert_eq!(streamer.stats().loaded, 1);
    }

    #[test]
    fn test_edits_rejected_outside_ready_chunks() {
        let mut streamer = ChunkStreamer::new(small_config()).unwrap();

        assert_eq!(
            streamer.place_voxel(Point3::new(0, 1, 0), 2),
            Err(EditRejected::ChunkNotLoaded)
        );
        assert_eq!(
            streamer.place_voxel(Point3::new(0, 8, 0), 2),
            Err(EditRejected::OutOfBounds)
        );
        assert_eq!(
            streamer.place_voxel(Point3::new(0, 1, 0), 99),
            Err(EditRejected::UnknownVoxelType(99))
        );
    }

    #[test]
    fn test_shutdown_unloads_everything() {
        let mut streamer = ChunkStreamer::new(small_config()).unwrap();
        streamer.on_observer_chunk_changed(ChunkCoordinate::new(0, 0));
        assert!(streamer.wait_until_idle(WAIT));
        assert_eq!(streamer.loaded_coordinates().len(), 9);

        streamer.shutdown();

        assert!(streamer.is_shut_down());
        assert!(streamer.loaded_coordinates().is_empty());
        assert!(!streamer.request_load(ChunkCoordinate::new(0, 0)));
        assert_eq!(streamer.chunk_state(ChunkCoordinate::new(0, 0)), ChunkState::Unloaded);
    }

    struct HalfStone;

    impl ChunkSource for HalfStone {
        fn generate_chunk(
            &self,
            _origin: Point3<i32>,
            size: ChunkSize,
        ) -> Result<Vec<VoxelId>, GenerationError> {
            Ok((0..size.volume())
                .map(|index| if size.position(index).y < 4 { 2 } else { AIR })
                .collect())
        }
    }

    #[test]
    fn test_failed_remesh_undoes_edit() {
        let mut streamer = ChunkStreamer::with_source(small_config(), Arc::new(HalfStone)).unwrap();
        let coord = ChunkCoordinate::new(0, 0);
        assert!(streamer.request_load(coord));
        assert!(streamer.wait_until_idle(WAIT));

        let events = MtResource::new(0usize);
        let counter = events.clone();
        streamer.subscribe(move |_| *counter.get_mut() += 1);

        // An assembler without any faces cannot emit the new voxel.
        let empty = Arc::new(GeometryTable::from_types(&VoxelTypeTable::default()));
        streamer.context.assembler = Arc::new(MeshAssembler::new(empty, streamer.config.mesh_mode));

        let before = streamer.chunk_geometry(coord).unwrap();
        let masks_before = streamer.registry.get().get(&coord).unwrap().masks().to_vec();

        assert_eq!(
            streamer.place_voxel(Point3::new(1, 5, 1), 2),
            Err(EditRejected::MeshingFailed)
        );

        assert_eq!(streamer.voxel_at(Point3::new(1, 5, 1)), Some(AIR));
        assert!(Arc::ptr_eq(&before, &streamer.chunk_geometry(coord).unwrap()));
        let registry = streamer.registry.get();
        let chunk = registry.get(&coord).unwrap();
        assert_eq!(chunk.masks(), masks_before.as_slice());
        assert_eq!(chunk.state(), ChunkState::Ready);
        drop(registry);
        assert_eq!(*events.get(), 0);
    }
}
