//! In-memory transfer store and visibility store for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::persistence::{
    RecordWorkflowExecutionClosedRequest, RecordWorkflowExecutionStartedRequest, TransferTask,
    TransferTaskPage, TransferTaskStore, VisibilityStore,
};

/// Transfer store over an ordered in-memory map.
#[derive(Default)]
pub struct InMemoryTransferStore {
    tasks: Mutex<BTreeMap<i64, TransferTask>>,
}

impl InMemoryTransferStore {
    pub fn push(&self, task: TransferTask) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(task.task_id, task);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransferTaskStore for InMemoryTransferStore {
    async fn get_transfer_tasks(
        &self,
        read_level: i64,
        max_read_level: i64,
        batch_size: usize,
    ) -> Result<TransferTaskPage, PersistenceError> {
        let tasks = self
            .tasks
            .lock()
            .map_err(|_| PersistenceError::ReadFailed("store poisoned".to_string()))?;

        let mut page = Vec::new();
        let mut remaining = 0usize;
        for (_, task) in tasks.range((Bound::Excluded(read_level), Bound::Included(max_read_level)))
        {
            if page.len() < batch_size {
                page.push(task.clone());
            } else {
                remaining += 1;
            }
        }
        Ok(TransferTaskPage {
            tasks: page,
            has_more: remaining > 0,
        })
    }
}

/// Recording visibility store.
#[derive(Default)]
pub struct MemoryVisibilityStore {
    started: Mutex<Vec<RecordWorkflowExecutionStartedRequest>>,
    closed: Mutex<Vec<RecordWorkflowExecutionClosedRequest>>,
}

impl MemoryVisibilityStore {
    pub fn started(&self) -> Vec<RecordWorkflowExecutionStartedRequest> {
        self.started.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn closed(&self) -> Vec<RecordWorkflowExecutionClosedRequest> {
        self.closed.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisibilityStore for MemoryVisibilityStore {
    async fn record_workflow_execution_started(
        &self,
        request: RecordWorkflowExecutionStartedRequest,
    ) -> Result<(), PersistenceError> {
        self.started
            .lock()
            .map_err(|_| PersistenceError::VisibilityWriteFailed("store poisoned".to_string()))?
            .push(request);
        Ok(())
    }

    async fn record_workflow_execution_closed(
        &self,
        request: RecordWorkflowExecutionClosedRequest,
    ) -> Result<(), PersistenceError> {
        self.closed
            .lock()
            .map_err(|_| PersistenceError::VisibilityWriteFailed("store poisoned".to_string()))?
            .push(request);
        Ok(())
    }
}
