//! In-process counters for the pipeline's operational signals.
//!
//! The handle is cheap to clone and share across tasks; counters are plain
//! atomics read by health endpoints and by the test suites.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cloneable metrics handle shared by the queue processor and the indexer.
#[derive(Debug, Clone, Default)]
pub struct MetricsClient {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    es_processor_requests: AtomicU64,
    es_processor_failures: AtomicU64,
    es_processor_corrupted_data: AtomicU64,
    es_processor_duplicate_messages: AtomicU64,
    transfer_tasks_processed: AtomicU64,
    transfer_tasks_discarded: AtomicU64,
    transfer_task_processing_failed: AtomicU64,
}

impl MetricsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_es_processor_requests(&self) {
        self.inner.es_processor_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_es_processor_failures(&self) {
        self.inner.es_processor_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_es_processor_corrupted_data(&self) {
        self.inner
            .es_processor_corrupted_data
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_es_processor_duplicate_messages(&self) {
        self.inner
            .es_processor_duplicate_messages
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transfer_tasks_processed(&self) {
        self.inner
            .transfer_tasks_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transfer_tasks_discarded(&self) {
        self.inner
            .transfer_tasks_discarded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transfer_task_processing_failed(&self) {
        self.inner
            .transfer_task_processing_failed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn es_processor_requests(&self) -> u64 {
        self.inner.es_processor_requests.load(Ordering::Relaxed)
    }

    pub fn es_processor_failures(&self) -> u64 {
        self.inner.es_processor_failures.load(Ordering::Relaxed)
    }

    pub fn es_processor_corrupted_data(&self) -> u64 {
        self.inner.es_processor_corrupted_data.load(Ordering::Relaxed)
    }

    pub fn es_processor_duplicate_messages(&self) -> u64 {
        self.inner
            .es_processor_duplicate_messages
            .load(Ordering::Relaxed)
    }

    pub fn transfer_tasks_processed(&self) -> u64 {
        self.inner.transfer_tasks_processed.load(Ordering::Relaxed)
    }

    pub fn transfer_tasks_discarded(&self) -> u64 {
        self.inner.transfer_tasks_discarded.load(Ordering::Relaxed)
    }

    pub fn transfer_task_processing_failed(&self) -> u64 {
        self.inner
            .transfer_task_processing_failed
            .load(Ordering::Relaxed)
    }
}
