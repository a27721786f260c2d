//! Per-project mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per project name.
///
/// Operations that publish or submit for a project hold its guard, so two
/// requests for the same project run one after the other while different
/// projects proceed independently. An entry lives only while some caller
/// holds or waits on it.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held lock on one project; releases the map entry when it is the last user.
#[derive(Debug)]
pub struct ProjectGuard<'a> {
    locks: &'a ProjectLocks,
    project: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProjectGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts
        self.guard.take();
        self.locks.release(&self.project);
    }
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, project: &str) -> ProjectGuard<'_> {
        let waiter = Waiter {
            locks: self,
            project,
        };
        // Clone the Arc out so the map shard is released before awaiting
        let lock = self
            .locks
            .entry(project.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        std::mem::forget(waiter);

        ProjectGuard {
            locks: self,
            project: project.to_string(),
            guard: Some(guard),
        }
    }

    /// Drop the entry for `project` unless another caller still holds a clone.
    fn release(&self, project: &str) {
        self.locks
            .remove_if(project, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Cleans up after a caller that stopped waiting (e.g. a dropped request).
struct Waiter<'a> {
    locks: &'a ProjectLocks,
    project: &'a str,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.locks.release(self.project);
    }
}
