//! Scoped access to workflow mutable state.
//!
//! Handlers borrow state through a lease and must release it on every exit
//! path. A clean release keeps the cached entry; releasing with an error
//! invalidates it so the next acquisition reloads from storage. The retry
//! path releases clean: a task waiting on replication has not observed
//! anything wrong with the entry itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{HistoryError, ProcessError};
use crate::history::mutable_state::MutableState;
use crate::history::ExecutionKey;

/// Source of truth the cache loads from on a miss.
#[async_trait]
pub trait ExecutionStateStore: Send + Sync {
    /// Load the mutable state for an execution, or `None` when the execution
    /// is unknown on this cluster.
    async fn load(
        &self,
        key: &ExecutionKey,
    ) -> Result<Option<Arc<dyn MutableState>>, HistoryError>;
}

type EntryMap = Arc<Mutex<HashMap<ExecutionKey, Arc<dyn MutableState>>>>;

const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Keyed cache of mutable state with leased access.
pub struct ExecutionCache {
    store: Arc<dyn ExecutionStateStore>,
    entries: EntryMap,
    capacity: usize,
}

impl ExecutionCache {
    pub fn new(store: Arc<dyn ExecutionStateStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn ExecutionStateStore>, capacity: usize) -> Self {
        Self {
            store,
            entries: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Acquire a lease for one execution, loading on a cache miss.
    pub async fn acquire(&self, key: ExecutionKey) -> Result<ExecutionLease, HistoryError> {
        let cached = self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&key).cloned());

        let state = match cached {
            Some(state) => Some(state),
            None => {
                let loaded = self.store.load(&key).await?;
                if let Some(state) = &loaded {
                    if let Ok(mut entries) = self.entries.lock() {
                        // At capacity, drop an arbitrary entry; evicted
                        // executions reload from storage on next access.
                        if entries.len() >= self.capacity {
                            if let Some(evict) = entries.keys().next().cloned() {
                                entries.remove(&evict);
                            }
                        }
                        entries.insert(key.clone(), state.clone());
                    }
                }
                loaded
            }
        };

        Ok(ExecutionLease {
            key,
            state,
            entries: self.entries.clone(),
            released: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Leased view of one execution's mutable state.
///
/// Dropping a lease without an explicit release counts as releasing with an
/// error: the entry is invalidated, which is the safe direction.
pub struct ExecutionLease {
    key: ExecutionKey,
    state: Option<Arc<dyn MutableState>>,
    entries: EntryMap,
    released: bool,
}

impl ExecutionLease {
    /// Mutable state, or `None` when the execution is unknown locally.
    pub fn state(&self) -> Option<&Arc<dyn MutableState>> {
        self.state.as_ref()
    }

    /// Release the lease. `None` keeps the cached entry; an error evicts it.
    pub fn release(mut self, error: Option<&ProcessError>) {
        self.finish(error.is_some());
    }

    fn finish(&mut self, invalidate: bool) {
        if self.released {
            return;
        }
        self.released = true;
        if invalidate {
            if let Ok(mut entries) = self.entries.lock() {
                entries.remove(&self.key);
            }
        }
    }
}

impl Drop for ExecutionLease {
    fn drop(&mut self) {
        self.finish(true);
    }
}
