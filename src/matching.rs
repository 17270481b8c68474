//! Matching service client contract.
//!
//! The standby processor pushes activity and decision tasks to matching once
//! the replication admission window has passed; pollers on this cluster can
//! then pick the work up immediately after a failover.

use async_trait::async_trait;

use crate::error::MatchingError;
use crate::persistence::WorkflowExecution;

#[derive(Debug, Clone, PartialEq)]
pub struct AddActivityTaskRequest {
    pub domain_uuid: String,
    pub source_domain_uuid: String,
    pub execution: WorkflowExecution,
    pub task_list: String,
    pub schedule_id: i64,
    pub schedule_to_start_timeout_secs: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddDecisionTaskRequest {
    pub domain_uuid: String,
    pub execution: WorkflowExecution,
    pub task_list: String,
    pub schedule_id: i64,
    pub schedule_to_start_timeout_secs: i32,
}

#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn add_activity_task(&self, request: AddActivityTaskRequest)
        -> Result<(), MatchingError>;
    async fn add_decision_task(&self, request: AddDecisionTaskRequest)
        -> Result<(), MatchingError>;
}
