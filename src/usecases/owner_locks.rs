use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::value_objects::external_reference::OwnerPath;

/// One async mutex per owner document. Every read-modify-write of an owner's
/// lists runs while holding that owner's guard; different owners never wait
/// on each other.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

pub type OwnerGuard = OwnedMutexGuard<()>;

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, owner: &OwnerPath) -> OwnerGuard {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on.
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            Arc::clone(
                locks
                    .entry(owner.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }
}
