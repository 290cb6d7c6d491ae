//! # Load Queue
//!
//! Bookkeeping for chunk coordinates that have been requested but are not loaded yet.
//!
//! A coordinate is either *pending* (waiting in FIFO order for a free worker) or
//! *in flight* (handed to a worker). The queue never holds a coordinate in both, and
//! refuses to enqueue a coordinate it already knows about.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use num_traits::FromPrimitive;

use crate::engine_state::task_management::task::CancellationToken;
use crate::engine_state::voxels::chunk::{ChunkCoordinate, ChunkState};

/// Coordinating-thread handle on a chunk that a worker is building.
#[derive(Debug)]
pub struct InFlight {
    /// Token the worker polls between phases
    pub cancel: CancellationToken,
    /// Stage the worker last reported
    pub stage: Arc<AtomicU8>,
}

impl InFlight {
    /// Creates a handle whose stage starts at Generating.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            stage: Arc::new(AtomicU8::new(ChunkState::Generating as u8)),
        }
    }

    /// The chunk's current state as seen from the coordinating thread.
    ///
    /// A cancelled chunk reports Unloading until its worker hands it back.
    pub fn state(&self) -> ChunkState {
        if self.cancel.is_cancelled() {
            return ChunkState::Unloading;
        }
        ChunkState::from_u8(self.stage.load(Ordering::Acquire)).unwrap_or(ChunkState::Generating)
    }
}

/// FIFO of pending coordinates plus the set of in-flight ones.
#[derive(Debug, Default)]
pub struct LoadQueue {
    pending: VecDeque<ChunkCoordinate>,
    pending_set: HashSet<ChunkCoordinate>,
    in_flight: HashMap<ChunkCoordinate, InFlight>,
}

impl LoadQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a coordinate. Returns `false` if it is already pending or in flight.
    pub fn enqueue(&mut self, coord: ChunkCoordinate) -> bool {
        if self.contains(&coord) {
            return false;
        }
        self.pending_set.insert(coord);
        self.pending.push_back(coord);
        true
    }

    /// Puts a coordinate back at the head of the queue after a failed dispatch.
    pub fn requeue_front(&mut self, coord: ChunkCoordinate) {
        if self.contains(&coord) {
            return;
        }
        self.pending_set.insert(coord);
        self.pending.push_front(coord);
    }

    /// Removes the oldest pending coordinate.
    pub fn pop_next(&mut self) -> Option<ChunkCoordinate> {
        let coord = self.pending.pop_front()?;
        self.pending_set.remove(&coord);
        Some(coord)
    }

    /// Drops every pending coordinate for which `keep` returns `false`.
    ///
    /// # Returns
    /// How many coordinates were dropped
    pub fn retain_pending<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&ChunkCoordinate) -> bool,
    {
        let before = self.pending.len();
        let pending_set = &mut self.pending_set;
        self.pending.retain(|coord| {
            let kept = keep(coord);
            if !kept {
                pending_set.remove(coord);
            }
            kept
        });
        before - self.pending.len()
    }

    /// Records that a worker started on `coord`.
    pub fn start(&mut self, coord: ChunkCoordinate, handle: InFlight) {
        self.in_flight.insert(coord, handle);
    }

    /// Removes the in-flight record of `coord` once its worker returned.
    pub fn finish(&mut self, coord: &ChunkCoordinate) -> Option<InFlight> {
        self.in_flight.remove(coord)
    }

    /// Cancels the worker building `coord`. Returns `false` if it is not in flight.
    pub fn cancel(&mut self, coord: &ChunkCoordinate) -> bool {
        match self.in_flight.get(coord) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Coordinates currently in flight, in no particular order.
    pub fn in_flight_coordinates(&self) -> Vec<ChunkCoordinate> {
        self.in_flight.keys().copied().collect()
    }

    /// The in-flight record of `coord`.
    pub fn in_flight(&self, coord: &ChunkCoordinate) -> Option<&InFlight> {
        self.in_flight.get(coord)
    }

    /// Whether `coord` waits in the FIFO.
    pub fn is_pending(&self, coord: &ChunkCoordinate) -> bool {
        self.pending_set.contains(coord)
    }

    /// Whether `coord` is pending or in flight.
    pub fn contains(&self, coord: &ChunkCoordinate) -> bool {
        self.pending_set.contains(coord) || self.in_flight.contains_key(coord)
    }

    /// Drops every pending coordinate.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_set.clear();
    }

    /// Number of pending coordinates.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of in-flight coordinates.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether nothing is pending or in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_without_duplicates() {
        let mut queue = LoadQueue::new();
        let (a, b) = (ChunkCoordinate::new(0, 0), ChunkCoordinate::new(1, 0));

        assert!(queue.enqueue(a));
        assert!(queue.enqueue(b));
        assert!(!queue.enqueue(a));
        assert_eq!(queue.pending_len(), 2);

        assert_eq!(queue.pop_next(), Some(a));
        queue.start(a, InFlight::new(CancellationToken::new()));
        assert!(!queue.enqueue(a));
        assert!(!queue.is_pending(&a));
        assert!(queue.contains(&a));

        assert_eq!(queue.pop_next(), Some(b));
        assert_eq!(queue.pop_next(), None);
        assert!(queue.finish(&a).is_some());
        assert!(queue.is_idle());
    }

    #[test]
    fn test_retain_and_requeue() {
        let mut queue = LoadQueue::new();
        for x in 0..5 {
            queue.enqueue(ChunkCoordinate::new(x, 0));
        }

        assert_eq!(queue.retain_pending(|coord| coord.x % 2 == 0), 2);
        assert!(!queue.is_pending(&ChunkCoordinate::new(1, 0)));
        assert!(queue.enqueue(ChunkCoordinate::new(1, 0)));

        let head = queue.pop_next().unwrap();
        queue.requeue_front(head);
        assert_eq!(queue.pop_next(), Some(head));
    }

    #[test]
    fn test_cancelled_chunk_reports_unloading() {
        let mut queue = LoadQueue::new();
        let coord = ChunkCoordinate::new(3, 3);
        let handle = InFlight::new(CancellationToken::new());
        handle.stage.store(ChunkState::Meshing as u8, Ordering::Release);
        queue.start(coord, handle);

        assert_eq!(queue.in_flight(&coord).map(InFlight::state), Some(ChunkState::Meshing));
        assert!(queue.cancel(&coord));
        assert_eq!(queue.in_flight(&coord).map(InFlight::state), Some(ChunkState::Unloading));
        assert!(!queue.cancel(&ChunkCoordinate::new(0, 0)));
    }
}
