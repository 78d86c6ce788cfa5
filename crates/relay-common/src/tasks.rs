//! Task registry - owned background task handles
//!
//! Timers, polling loops, and subscriptions are owned resources: each is
//! registered under an instance key and aborted deterministically on
//! completion, expiry, or teardown. `stop` is idempotent; a key registered
//! twice supersedes (and aborts) the earlier task.

use dashmap::DashMap;
use std::hash::Hash;
use tokio::task::JoinHandle;

/// Arena of named abortable background tasks
pub struct TaskRegistry<K>
where
    K: Eq + Hash,
{
    tasks: DashMap<K, JoinHandle<()>>,
}

impl<K> TaskRegistry<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Register a task under `key`, aborting any task previously held
    /// under the same key.
    pub fn register(&self, key: K, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(key, handle) {
            previous.abort();
        }
    }

    /// Stop and remove the task under `key`. Returns `true` if a task was
    /// present. Calling this twice is a no-op the second time.
    pub fn stop(&self, key: &K) -> bool {
        if let Some((_, handle)) = self.tasks.remove(key) {
            handle.abort();
            tracing::trace!(key = %key, "Background task stopped");
            true
        } else {
            false
        }
    }

    /// Check whether a live task is registered under `key`, pruning the
    /// entry if the task already finished.
    pub fn is_running(&self, key: &K) -> bool {
        let finished = match self.tasks.get(key) {
            Some(entry) => entry.is_finished(),
            None => return false,
        };
        if finished {
            self.tasks.remove(key);
        }
        !finished
    }

    /// Stop every registered task. Returns the number of tasks aborted.
    pub fn stop_all(&self) -> usize {
        let keys: Vec<K> = self
            .tasks
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut stopped = 0;
        for key in keys {
            if self.stop(&key) {
                stopped += 1;
            }
        }

        if stopped > 0 {
            tracing::debug!(count = stopped, "Background tasks stopped");
        }

        stopped
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check whether the registry holds no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<K> Default for TaskRegistry<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn forever() -> JoinHandle<()> {
        tokio::spawn(async {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        })
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let registry: TaskRegistry<String> = TaskRegistry::new();
        registry.register("poll".to_string(), forever());

        assert!(registry.stop(&"poll".to_string()));
        assert!(!registry.stop(&"poll".to_string()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_register_supersedes_prior_task() {
        let registry: TaskRegistry<String> = TaskRegistry::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let ticks_a = ticks.clone();
        registry.register(
            "poll".to_string(),
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ticks_a.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        registry.register("poll".to_string(), forever());
        assert_eq!(registry.len(), 1);

        // The first task was aborted; its counter must stop advancing
        tokio::time::sleep(Duration::from_millis(20)).await;
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_stop_all() {
        let registry: TaskRegistry<String> = TaskRegistry::new();
        registry.register("a".to_string(), forever());
        registry.register("b".to_string(), forever());

        assert_eq!(registry.stop_all(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_is_running_prunes_finished() {
        let registry: TaskRegistry<String> = TaskRegistry::new();
        registry.register("done".to_string(), tokio::spawn(async {}));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!registry.is_running(&"done".to_string()));
        assert!(registry.is_empty());
    }
}
