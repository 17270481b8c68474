//! Write contract for the primary visibility store.
//!
//! The primary store is the durable system of record; the Elasticsearch
//! index is a derived projection fed through the message bus.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::messaging::message::WorkflowCloseStatus;
use crate::persistence::WorkflowExecution;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordWorkflowExecutionStartedRequest {
    pub domain_uuid: String,
    pub domain: String,
    pub execution: WorkflowExecution,
    pub workflow_type_name: String,
    /// Nanoseconds since the Unix epoch.
    pub start_time: i64,
    /// Workflow execution timeout in seconds.
    pub workflow_timeout: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordWorkflowExecutionClosedRequest {
    pub domain_uuid: String,
    pub domain: String,
    pub execution: WorkflowExecution,
    pub workflow_type_name: String,
    pub start_time: i64,
    pub close_time: i64,
    pub status: WorkflowCloseStatus,
    pub history_length: i64,
    pub retention_seconds: i64,
}

#[async_trait]
pub trait VisibilityStore: Send + Sync {
    async fn record_workflow_execution_started(
        &self,
        request: RecordWorkflowExecutionStartedRequest,
    ) -> Result<(), PersistenceError>;

    async fn record_workflow_execution_closed(
        &self,
        request: RecordWorkflowExecutionClosedRequest,
    ) -> Result<(), PersistenceError>;
}
