// src/registry.rs

//! Registry of in-flight supervised processes.
//!
//! The orchestration loop and every supervisor's callbacks share one
//! registry. Entries are keyed by [`ProcessHandle::id`], which increases with
//! each launch, so snapshots come out in launch order.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::exec::ProcessHandle;

#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    inner: Arc<RwLock<BTreeMap<u64, ProcessHandle>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process. Returns false if it was already present.
    pub fn add(&self, handle: ProcessHandle) -> bool {
        let id = handle.id();
        let label = handle.display_name();
        let inserted = self.write().insert(id, handle).is_none();
        debug!(id, label = %label, inserted, "registry add");
        inserted
    }

    /// Remove a process. Removing an absent entry is a no-op returning false.
    pub fn remove(&self, handle: &ProcessHandle) -> bool {
        let removed = self.write().remove(&handle.id()).is_some();
        debug!(id = handle.id(), removed, "registry remove");
        removed
    }

    /// Consistent copy of the current entries, in launch order.
    pub fn snapshot(&self) -> Vec<ProcessHandle> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, handle: &ProcessHandle) -> bool {
        self.read().contains_key(&handle.id())
    }

    pub fn find_by_label(&self, label: &str) -> Option<ProcessHandle> {
        self.read()
            .values()
            .find(|h| h.label() == Some(label))
            .cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<u64, ProcessHandle>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<u64, ProcessHandle>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
