//! Shared, lock-protected resources.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` provides synchronized access to a value of type `T` that can be shared
/// across threads. It uses an `Arc<RwLock<T>>` internally, so readers never lock each
/// other out and writers hold the lock only for the duration of the returned guard.
///
/// The chunk registry is the main user: the coordinating thread mutates it in short
/// critical sections while any number of consumers read from it.
///
/// # Examples
///
/// ```
/// use voxel_world::core::MtResource;
///
/// let counter = MtResource::new(0);
/// *counter.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
/// ```
///
/// ## Sharing Between Threads
/// ```
/// # use std::thread;
/// use voxel_world::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let counter_clone = counter.clone();
///
/// let handle = thread::spawn(move || {
///     *counter_clone.get_mut() += 1;
/// });
///
/// handle.join().unwrap();
/// assert_eq!(*counter.get(), 1);
/// ```
#[derive(Debug)]
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard that allows reading the contained value.
    ///
    /// A poisoned lock is recovered rather than propagated.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a mutable guard that allows modifying the contained value.
    ///
    /// Other readers and writers block until the guard is dropped, so keep the
    /// critical section short.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live handles to this resource.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.resource)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clone_shares_value() {
        let resource = MtResource::new(vec![1, 2, 3]);
        let other = resource.clone();

        other.get_mut().push(4);

        assert_eq!(*resource.get(), vec![1, 2, 3, 4]);
        assert_eq!(resource.handle_count(), 2);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let resource = MtResource::new(7);
        let clone = resource.clone();

        let _ = thread::spawn(move || {
            let _guard = clone.get_mut();
            panic!("writer died while holding the lock");
        })
        .join();

        assert_eq!(*resource.get(), 7);
        *resource.get_mut() = 8;
        assert_eq!(*resource.get(), 8);
    }
}
