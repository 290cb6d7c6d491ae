//! # Task System Core Types
//!
//! This module defines the building blocks of the task system.
//!
//! ## Core Components
//! - `Task`: A unit of work that runs on a worker thread and produces an output
//! - `CancellationToken`: A cooperative cancellation flag that tasks poll between phases
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and handed to `TaskManager::publish_task()`
//! 2. The task's `process()` method consumes it on a worker thread
//! 3. The output travels back to the coordinating thread through the result channel
//! 4. The coordinating thread collects it with `try_completed()` or `wait_completed()`
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - Outputs must be `Send` to be transferred back
//! - Tasks own all the data they work on; nothing is borrowed across threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A unit of work executed on a worker thread.
///
/// Tasks are consumed by `process`, so they can move owned buffers in and hand them
/// back through their output.
///
/// # Implementation Guidelines
/// - Must be `Send` to be transferred between threads
/// - Should be coarse-grained to amortize scheduling overhead
/// - Should not panic; a panicking task takes its worker thread down with it
pub trait Task: Send {
    /// The value sent back to the coordinating thread.
    type Output: Send + 'static;

    /// Performs the work and produces the output.
    fn process(self: Box<Self>) -> Self::Output;
}

#[derive(Debug)]
struct TokenState {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

/// Cooperative cancellation flag shared between the coordinating thread and tasks.
///
/// Tokens form a tree: cancelling a token also cancels every child created from it,
/// while cancelling a child leaves its parent untouched.
///
/// ```
/// use voxel_world::engine_state::task_management::task::CancellationToken;
///
/// let root = CancellationToken::new();
/// let child = root.child();
/// root.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a new, uncancelled root token.
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Creates a child token that is cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Requests cancellation of this token and its children.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// Whether this token or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.state
            .parent
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_follows_parent() {
        let root = CancellationToken::new();
        let child = root.child();
        let grandchild = child.child();

        assert!(!grandchild.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_parent_ignores_child() {
        let root = CancellationToken::new();
        let child = root.child();
        let sibling = root.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());
    }
}
