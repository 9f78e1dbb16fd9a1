//! Cancellable one-shot deferred actions, at most one pending per key.
//!
//! [`ExpiryTimers::arm`] aborts whatever was pending for the key and spawns a
//! fresh sleeper. Aborting alone is not enough: a sleeper that already woke
//! may be waiting on the caller's lock when it is superseded. Each arming
//! therefore carries a generation number, handed to the action, so the
//! action can compare it against the state it guards and do nothing when a
//! newer arming exists.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingMap<K> = Arc<Mutex<HashMap<K, Pending>>>;

/// Registry of per-key expiry timers.
pub struct ExpiryTimers<K> {
    pending: PendingMap<K>,
    next_generation: AtomicU64,
}

impl<K> Default for ExpiryTimers<K> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }
}

fn lock<K>(map: &Mutex<HashMap<K, Pending>>) -> MutexGuard<'_, HashMap<K, Pending>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K> ExpiryTimers<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run after `delay`, superseding any pending action
    /// for `key`. Returns the generation passed to `action`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, key: K, delay: Duration, action: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();

        // Held across spawn so the entry exists before the sleeper can look for it.
        let mut map = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action(generation);
            let mut map = lock(&pending);
            if map.get(&task_key).is_some_and(|p| p.generation == generation) {
                map.remove(&task_key);
            }
        });

        let previous = map.insert(key.clone(), Pending { generation, handle });
        drop(map);
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(?key, superseded = previous.generation, generation, "expiry timer re-armed");
        }
        generation
    }

    /// Cancel the pending action for `key`, if any. Idempotent.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.pending).remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether an action is pending for `key`.
    pub fn is_armed(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Drop for ExpiryTimers<K> {
    fn drop(&mut self) {
        for (_, pending) in lock(&self.pending).drain() {
            pending.handle.abort();
        }
    }
}
