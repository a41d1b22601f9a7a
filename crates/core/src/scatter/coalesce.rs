use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

pub(crate) type SharedTask<T> = Shared<BoxFuture<'static, T>>;

/// At most one in-flight execution per key; later callers share its output.
pub(crate) struct InFlight<T: Clone> {
    tasks: Mutex<HashMap<String, SharedTask<T>>>,
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, SharedTask<T>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Join the execution running under `key`, or start one with `start`.
    ///
    /// Returns the shared future and whether this caller started it. The
    /// started execution must hold an [`InFlightEntry`] (or call
    /// [`Self::remove`]) so the key is released when it ends.
    pub(crate) fn join_or_start<F>(&self, key: &str, start: F) -> (SharedTask<T>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let mut tasks = self.tasks();
        if let Some(task) = tasks.get(key) {
            return (task.clone(), false);
        }
        let task = start().shared();
        tasks.insert(key.to_string(), task.clone());
        (task, true)
    }

    pub(crate) fn remove(&self, key: &str) {
        self.tasks().remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks().len()
    }

    /// Guard that removes `key` when dropped, including during a panic unwind.
    pub(crate) fn entry(self: &Arc<Self>, key: &str) -> InFlightEntry<T> {
        InFlightEntry {
            owner: Arc::clone(self),
            key: key.to_string(),
        }
    }
}

/// Releases a coalescing key when the execution holding it ends.
pub(crate) struct InFlightEntry<T>
where
    T: Clone + Send + Sync + 'static,
{
    owner: Arc<InFlight<T>>,
    key: String,
}

impl<T> Drop for InFlightEntry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.owner.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_second_caller_joins() {
        let inflight: InFlight<u32> = InFlight::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&starts);
        let (first, leader) = inflight.join_or_start("k", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { 7 }.boxed()
        });
        assert!(leader);

        let counter = Arc::clone(&starts);
        let (second, leader) = inflight.join_or_start("k", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { 8 }.boxed()
        });
        assert!(!leader);

        assert_eq!(first.await, 7);
        assert_eq!(second.await, 7);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_allows_new_execution() {
        let inflight: InFlight<u32> = InFlight::new();
        let (task, _) = inflight.join_or_start("k", || async { 1 }.boxed());
        assert_eq!(task.await, 1);
        assert_eq!(inflight.len(), 1);

        inflight.remove("k");
        assert_eq!(inflight.len(), 0);
        let (task, leader) = inflight.join_or_start("k", || async { 2 }.boxed());
        assert!(leader);
        assert_eq!(task.await, 2);
    }

    #[tokio::test]
    async fn test_entry_released_when_execution_panics() {
        let inflight: Arc<InFlight<u32>> = Arc::new(InFlight::new());

        let owner = Arc::clone(&inflight);
        let (task, leader) = inflight.join_or_start("k", move || {
            let handle = tokio::spawn(async move {
                let _entry = owner.entry("k");
                if owner.len() > 0 {
                    panic!("provider blew up");
                }
                1
            });
            async move { handle.await.unwrap_or(0) }.boxed()
        });
        assert!(leader);
        assert_eq!(task.await, 0);
        assert_eq!(inflight.len(), 0);

        let (task, leader) = inflight.join_or_start("k", || async { 5 }.boxed());
        assert!(leader);
        assert_eq!(task.await, 5);
    }
}
