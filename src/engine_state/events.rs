//! # Event Bus
//!
//! Notifications the streamer sends to its consumers: renderers, collision bakers,
//! persistence layers.
//!
//! Subscribers are plain callbacks registered on a bus owned by the streamer, so
//! there is no process-wide state. Callbacks run synchronously on the coordinating
//! thread, inside the streamer call that produced the event.

use std::fmt;
use std::sync::Arc;

use cgmath::Point3;

use crate::core::GenerationError;
use crate::engine_state::rendering::meshing::ChunkGeometry;
use crate::engine_state::voxels::{block::VoxelId, chunk::ChunkCoordinate};

/// Something that happened to a chunk or voxel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkEvent {
    /// A chunk finished generation and meshing and may now be rendered
    ChunkReady {
        /// The chunk
        coord: ChunkCoordinate,
        /// Its freshly built geometry
        geometry: Arc<ChunkGeometry>,
    },
    /// An edit changed a Ready chunk's geometry
    ChunkRemeshed {
        /// The edited chunk
        coord: ChunkCoordinate,
        /// Geometry after the edit
        geometry: Arc<ChunkGeometry>,
    },
    /// A Ready chunk left the world; its geometry must no longer be drawn
    ChunkUnloaded {
        /// The removed chunk
        coord: ChunkCoordinate,
    },
    /// The chunk's pipeline failed; it will not become Ready unless requested again
    ChunkFailed {
        /// The failed chunk
        coord: ChunkCoordinate,
        /// What went wrong
        reason: GenerationError,
    },
    /// A voxel changed through an edit
    VoxelEdited {
        /// World position of the voxel
        position: Point3<i32>,
        /// Id before the edit
        old: VoxelId,
        /// Id after the edit
        new: VoxelId,
    },
}

impl ChunkEvent {
    /// The chunk this event concerns, if it concerns exactly one.
    pub fn coord(&self) -> Option<ChunkCoordinate> {
        match self {
            ChunkEvent::ChunkReady { coord, .. }
            | ChunkEvent::ChunkRemeshed { coord, .. }
            | ChunkEvent::ChunkUnloaded { coord }
            | ChunkEvent::ChunkFailed { coord, .. } => Some(*coord),
            ChunkEvent::VoxelEdited { .. } => None,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ChunkEvent) + Send>;

/// Registry of event callbacks with an explicit lifecycle.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
}

impl EventBus {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for every subsequent event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ChunkEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscriber, _)| *subscriber != id);
        self.subscribers.len() != before
    }

    /// Delivers an event to every subscriber in registration order.
    pub fn publish(&mut self, event: ChunkEvent) {
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
