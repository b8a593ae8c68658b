//! In-flight save lock.
//!
//! A confirm takes the lock for the duration of its save. A second confirm
//! does not wait for it: `try_acquire` returns `None` immediately, so no
//! duplicate request ever leaves the client.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct SaveLock {
    inner: Arc<Mutex<()>>,
}

/// Held while a save runs; dropping it releases the lock.
#[derive(Debug)]
pub struct SaveGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SaveLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SaveGuard> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| SaveGuard { _guard: guard })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
