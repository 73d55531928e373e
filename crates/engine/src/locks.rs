//! Process-wide named locks used by `mutex` prechecks.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::EngineError;

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Registry of named advisory locks.
///
/// One registry is built at process start and shared by every engine. Locks
/// are not reentrant: a chain that takes the same name twice deadlocks. A
/// name is forgotten once nobody holds or waits for it.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: LockMap,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of names currently held or waited for.
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        lock_map(&self.locks).entry(name.to_string()).or_default().clone()
    }

    /// Wait for the lock called `name`, giving up when `cancel` fires.
    pub async fn acquire(&self, name: &str, cancel: &CancellationToken) -> Result<NamedLock, EngineError> {
        let lock = self.lock_for(name);
        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = lock.clone().lock_owned() => Some(guard),
        };
        let Some(guard) = acquired else {
            forget_if_idle(&self.locks, name, &lock);
            return Err(EngineError::Cancelled);
        };
        debug!(lock = %name, "mutex acquired");
        Ok(NamedLock {
            name: name.to_string(),
            guard: Some(guard),
            lock,
            registry: self.locks.clone(),
        })
    }
}

fn lock_map(locks: &LockMap) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drop the entry for `name` when the only references left are the map's and
/// the caller's.
fn forget_if_idle(locks: &LockMap, name: &str, lock: &Arc<AsyncMutex<()>>) {
    let mut map = lock_map(locks);
    let idle = map
        .get(name)
        .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
    if idle {
        map.remove(name);
    }
}

/// A held named lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<AsyncMutex<()>>,
    registry: LockMap,
}

impl NamedLock {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        forget_if_idle(&self.registry, &self.name, &self.lock);
        debug!(lock = %self.name, "mutex released");
    }
}

/// Locks held on behalf of a precheck chain.
///
/// Dropping the guard releases every lock in reverse acquisition order.
#[derive(Debug, Default)]
pub struct PrecheckGuard {
    held: Vec<NamedLock>,
}

impl PrecheckGuard {
    pub(crate) fn push(&mut self, lock: NamedLock) {
        self.held.push(lock);
    }

    /// Names currently held, in acquisition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(NamedLock::name)
    }

    pub fn unlock(mut self) {
        self.release();
    }

    fn release(&mut self) {
        while let Some(lock) = self.held.pop() {
            drop(lock);
        }
    }
}

impl Drop for PrecheckGuard {
    fn drop(&mut self) {
        self.release();
    }
}
