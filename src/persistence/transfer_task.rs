//! Transfer task records.
//!
//! A transfer task is the persisted trace of one workflow state transition
//! that requires an asynchronous side effect. Tasks are immutable and
//! totally ordered by `task_id` within a shard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::ExecutionKey;
use crate::persistence::WorkflowExecution;

/// State transition kind recorded by a transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferTaskType {
    ActivityTask,
    DecisionTask,
    CloseExecution,
    CancelExecution,
    SignalExecution,
    StartChildExecution,
}

/// One persisted transfer task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTask {
    pub task_id: i64,
    pub task_type: TransferTaskType,
    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,
    /// Domain the side effect targets; falls back to `domain_id` when unset.
    pub target_domain_id: Option<String>,
    /// Task list for matching pushes.
    pub task_list: Option<String>,
    /// Event id of the schedule event this task refers to.
    pub schedule_id: i64,
    /// Failover version of the event that produced the task.
    pub version: i64,
    /// When the transition became visible to queue processors.
    pub visibility_time: DateTime<Utc>,
}

impl TransferTask {
    pub fn execution(&self) -> WorkflowExecution {
        WorkflowExecution {
            workflow_id: self.workflow_id.clone(),
            run_id: self.run_id.clone(),
        }
    }

    pub fn execution_key(&self) -> ExecutionKey {
        ExecutionKey {
            domain_id: self.domain_id.clone(),
            workflow_id: self.workflow_id.clone(),
            run_id: self.run_id.clone(),
        }
    }

    pub fn target_domain_id(&self) -> &str {
        self.target_domain_id.as_deref().unwrap_or(&self.domain_id)
    }

    pub fn task_list(&self) -> &str {
        self.task_list.as_deref().unwrap_or_default()
    }
}
