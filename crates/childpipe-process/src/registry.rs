//! Process handle registry.
//!
//! The registry is the only shared, mutation-guarded structure: it maps
//! [`HandleId`]s to records. Identifiers are allocated from a counter and
//! never reused, so a disposed handle can never alias a newer process.
//!
//! # Rust Learning Note
//!
//! The map holds `Arc<ProcessRecord>` and lookups clone the `Arc` out under
//! a read lock. Blocking I/O then runs without the registry lock held, so
//! one slow child never stalls operations on another.

use crate::record::ProcessRecord;
use childpipe_common::{HandleId, ProcessError, ProcessResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// Registry of live process records.
#[derive(Debug)]
pub struct ProcessRegistry {
    next_id: AtomicU64,
    records: RwLock<HashMap<HandleId, Arc<ProcessRecord>>>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Reserve a fresh identifier.
    pub fn allocate(&self) -> HandleId {
        HandleId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Store a record under its own identifier.
    pub fn insert(&self, record: ProcessRecord) -> Arc<ProcessRecord> {
        let record = Arc::new(record);
        let id = record.id();
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&record));
        debug!("[Registry] Registered handle {}", id);
        record
    }

    /// Resolve a handle.
    ///
    /// # Errors
    ///
    /// [`ProcessError::UnknownHandle`] for identifiers that were never issued
    /// or were already disposed.
    pub fn lookup(&self, id: HandleId) -> ProcessResult<Arc<ProcessRecord>> {
        trace!("[Registry] Looking up handle {}", id);
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| ProcessError::unknown_handle(id))
    }

    /// Stop tracking a handle and return its record.
    pub fn remove(&self, id: HandleId) -> ProcessResult<Arc<ProcessRecord>> {
        let removed = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or_else(|| ProcessError::unknown_handle(id))?;
        debug!("[Registry] Removed handle {}", id);
        Ok(removed)
    }

    /// Number of handles currently tracked.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers of all tracked handles, in ascending order.
    pub fn handles(&self) -> Vec<HandleId> {
        let mut ids: Vec<HandleId> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }
}
