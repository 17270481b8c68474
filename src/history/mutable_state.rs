//! Read-only view of a workflow's mutable state.
//!
//! On a standby cluster this state is built purely from replicated events,
//! so a pending info may lag the active cluster by the replication delay.
//! Every info carries the failover `version` of the event that created it;
//! infos for operations that have a distinct started event also carry
//! `started_id`, with [`crate::constants::EMPTY_EVENT_ID`] meaning the
//! started event has not been observed.

use chrono::{DateTime, Utc};

use crate::messaging::message::WorkflowCloseStatus;

/// Top-level execution attributes.
#[derive(Debug, Clone)]
pub struct ExecutionInfo {
    pub workflow_type_name: String,
    /// Workflow execution timeout in seconds.
    pub workflow_timeout_secs: i32,
    pub start_time: DateTime<Utc>,
    /// Terminal status once the execution has closed.
    pub close_status: Option<WorkflowCloseStatus>,
    /// Id the next history event will take; doubles as the history length.
    pub next_event_id: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActivityInfo {
    pub version: i64,
    pub started_id: i64,
    pub schedule_to_start_timeout_secs: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionInfo {
    pub version: i64,
    pub started_id: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestCancelInfo {
    pub version: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct SignalInfo {
    pub version: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ChildExecutionInfo {
    pub version: i64,
    pub started_id: i64,
}

/// Read-only mutable state of one workflow execution. Pending infos return
/// `None` once the corresponding operation completed (or if its schedule
/// event has not replicated yet).
pub trait MutableState: Send + Sync {
    fn is_running(&self) -> bool;
    fn execution_info(&self) -> &ExecutionInfo;
    fn last_updated_time(&self) -> DateTime<Utc>;
    fn last_write_version(&self) -> i64;
    fn activity_info(&self, schedule_id: i64) -> Option<ActivityInfo>;
    fn pending_decision(&self, schedule_id: i64) -> Option<DecisionInfo>;
    fn request_cancel_info(&self, schedule_id: i64) -> Option<RequestCancelInfo>;
    fn signal_info(&self, schedule_id: i64) -> Option<SignalInfo>;
    fn child_execution_info(&self, schedule_id: i64) -> Option<ChildExecutionInfo>;
}
