//! Persistence contracts: the transfer-task store and the primary
//! visibility store. Storage engines live behind these traits; the pipeline
//! only reads tasks, advances ack levels, and writes visibility rows.

pub mod transfer_store;
pub mod transfer_task;
pub mod visibility_store;

pub use transfer_store::{TransferTaskPage, TransferTaskStore};
pub use transfer_task::{TransferTask, TransferTaskType};
pub use visibility_store::{
    RecordWorkflowExecutionClosedRequest, RecordWorkflowExecutionStartedRequest, VisibilityStore,
};

use serde::{Deserialize, Serialize};

/// Identity of one workflow execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}
