//! # Task Management System
//!
//! This module provides a small worker-thread pool for executing work off the
//! coordinating thread with a hard bound on the number of tasks in flight.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: Owns the workers, hands out tasks and collects their outputs
//! - `Task`: A unit of work consumed on a worker thread
//! - `TaskChannel`: The task sender and bookkeeping for one worker
//!
//! Each worker has a dedicated channel and accepts at most `MAX_TASKS_IN_FLIGHT` task
//! at a time, so the number of concurrently running tasks never exceeds the number of
//! workers. All workers report back through one shared result channel, which lets the
//! coordinating thread wait for "any completion" with a timeout instead of spinning.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`; a full pool hands the task back
//! 2. The manager picks a free worker channel using round-robin
//! 3. The worker consumes the task and sends its output back
//! 4. Outputs are collected on the coordinating thread with `try_completed()` or
//!    `wait_completed()`, which also frees the worker's slot
//!
//! ## Instrumentation
//! Workers record how many of them are busy at any instant and the highest value ever
//! observed (`peak_busy`). This is what proves the concurrency bound in tests.

pub mod task;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::Error;

pub use task::{CancellationToken, Task};

/// A task whose output type is `R`.
pub type BoxedTask<R> = Box<dyn Task<Output = R>>;

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 makes the worker count the concurrency limit.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

/// The coordinating thread's end of one worker.
///
/// # Fields
/// - `task_sender`: Sends tasks from the coordinating thread to the worker
/// - `num_tasks_in_flight`: Tasks handed to the worker whose output was not collected yet
/// - `worker`: Handle to the worker thread, joined on drop
struct TaskChannel<R> {
    task_sender: Option<Sender<BoxedTask<R>>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating the worker threads
/// - Distributing tasks across free workers
/// - Collecting outputs and freeing worker slots
/// - Joining the workers when dropped
///
/// It is owned and driven by a single coordinating thread.
pub struct TaskManager<R: Send + 'static> {
    channels: Vec<TaskChannel<R>>,
    result_receiver: Receiver<(usize, R)>,
    current_channel: usize,
    busy: Arc<AtomicUsize>,
    peak_busy: Arc<AtomicUsize>,
}

impl<R: Send + 'static> TaskManager<R> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads, and so the maximum number of tasks
    ///   running at once
    /// * `name` - Prefix of the worker thread names
    ///
    /// # Returns
    /// The manager, or `Error::WorkerSpawn` if a thread could not be created
    pub fn new(num_workers: usize, name: &str) -> Result<Self, Error> {
        let (result_tx, result_rx) = channel::<(usize, R)>();
        let busy = Arc::new(AtomicUsize::new(0));
        let peak_busy = Arc::new(AtomicUsize::new(0));
        let mut channels = Vec::with_capacity(num_workers);

        info!(
            "Spawning {num_workers} {name} worker(s), available parallelism: {:?}",
            thread::available_parallelism()
        );

        for channel_idx in 0..num_workers {
            let (task_tx, task_rx) = channel::<BoxedTask<R>>();
            let result_tx = result_tx.clone();
            let busy = busy.clone();
            let peak_busy = peak_busy.clone();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let now_busy = busy.fetch_add(1, Ordering::SeqCst) + 1;
                    peak_busy.fetch_max(now_busy, Ordering::SeqCst);

                    let result = task.process();

                    busy.fetch_sub(1, Ordering::SeqCst);
                    if result_tx.send((channel_idx, result)).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("{name}-{channel_idx}"))
                .spawn(task_closure)
                .map_err(Error::WorkerSpawn)?;

            channels.push(TaskChannel {
                task_sender: Some(task_tx),
                num_tasks_in_flight: 0,
                worker: Some(worker),
            });
        }

        Ok(TaskManager {
            channels,
            result_receiver: result_rx,
            current_channel: 0,
            busy,
            peak_busy,
        })
    }

    /// Finds a worker channel that can accept a new task, round-robin from the last
    /// one used.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|step| (self.current_channel + step) % count)
            .find(|idx| self.channels[*idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a task to a free worker.
    ///
    /// # Returns
    /// - `Ok(())` if a worker accepted the task
    /// - `Err(task)` if every worker is busy or the chosen worker has shut down; the
    ///   caller keeps ownership and may retry later
    pub fn publish_task(&mut self, task: BoxedTask<R>) -> Result<(), BoxedTask<R>> {
        let Some(channel_idx) = self.find_available_channel() else {
            return Err(task);
        };

        let channel = &mut self.channels[channel_idx];
        let Some(sender) = channel.task_sender.as_ref() else {
            return Err(task);
        };

        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                self.current_channel = (channel_idx + 1) % self.channels.len();
                Ok(())
            }
            Err(task) => {
                warn!("Worker {channel_idx} disconnected, task handed back");
                Err(task.0)
            }
        }
    }

    /// Whether at least one worker can accept a task right now.
    pub fn has_capacity(&self) -> bool {
        self.find_available_channel().is_some()
    }

    /// Tasks published but not yet collected.
    pub fn in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Workers currently executing a task.
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    /// Highest number of workers ever observed executing at the same time.
    pub fn peak_busy(&self) -> usize {
        self.peak_busy.load(Ordering::SeqCst)
    }

    /// Collects every output that is already available, without blocking.
    pub fn try_completed(&mut self) -> Vec<R> {
        let mut results = Vec::new();
        while let Ok((channel_idx, result)) = self.result_receiver.try_recv() {
            self.release(channel_idx);
            results.push(result);
        }
        results
    }

    /// Waits up to `timeout` for the next output.
    ///
    /// Returns `None` immediately when nothing is in flight, so callers can use it as
    /// the suspension point of a cooperative wait loop.
    pub fn wait_completed(&mut self, timeout: Duration) -> Option<R> {
        if self.in_flight() == 0 {
            return None;
        }
        match self.result_receiver.recv_timeout(timeout) {
            Ok((channel_idx, result)) => {
                self.release(channel_idx);
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("All workers disconnected");
                None
            }
        }
    }

    fn release(&mut self, channel_idx: usize) {
        if let Some(channel) = self.channels.get_mut(channel_idx) {
            channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
        }
    }
}

impl<R: Send + 'static> Drop for TaskManager<R> {
    fn drop(&mut self) {
        // Closing the task channels ends each worker loop after its current task.
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for (channel_idx, channel) in self.channels.iter_mut().enumerate() {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    warn!("Worker {channel_idx} panicked");
                }
            }
        }
        debug!("Task manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    struct Square(u64);

    impl Task for Square {
        type Output = u64;

        fn process(self: Box<Self>) -> u64 {
            self.0 * self.0
        }
    }

    struct Blocking(Arc<Barrier>);

    impl Task for Blocking {
        type Output = u64;

        fn process(self: Box<Self>) -> u64 {
            self.0.wait();
            0
        }
    }

    fn wait_for(manager: &mut TaskManager<u64>, count: usize) -> Vec<u64> {
        let mut results = Vec::new();
        while results.len() < count {
            match manager.wait_completed(Duration::from_secs(10)) {
                Some(result) => results.push(result),
                None => break,
            }
        }
        results
    }

    #[test]
    fn test_capacity_is_bounded_by_workers() {
        let mut manager = TaskManager::<u64>::new(2, "test").unwrap();
        let barrier = Arc::new(Barrier::new(3));

        assert!(manager.publish_task(Box::new(Blocking(barrier.clone()))).is_ok());
        assert!(manager.publish_task(Box::new(Blocking(barrier.clone()))).is_ok());
        assert!(!manager.has_capacity());
        assert!(manager.publish_task(Box::new(Square(3))).is_err());
        assert_eq!(manager.in_flight(), 2);

        barrier.wait();
        assert_eq!(wait_for(&mut manager, 2).len(), 2);
        assert_eq!(manager.in_flight(), 0);
        assert!(manager.peak_busy() <= 2);
    }

    #[test]
    fn test_outputs_are_collected() {
        let mut manager = TaskManager::<u64>::new(1, "test").unwrap();
        let mut results = Vec::new();
        for value in 1..=4 {
            assert!(manager.publish_task(Box::new(Square(value))).is_ok());
            results.extend(wait_for(&mut manager, 1));
        }

        assert_eq!(results, vec![1, 4, 9, 16]);
        assert_eq!(manager.peak_busy(), 1);
        assert_eq!(manager.busy(), 0);
        assert!(manager.wait_completed(Duration::from_millis(1)).is_none());
    }
}
