//! # Visibility Wire Schema
//!
//! Messages carried on the bus between the history service and the indexer.
//! Field presence is part of the contract: `Open` carries no close fields,
//! `Closed` carries all four, `Delete` carries only the identity triple.
//! Construct messages through [`VisibilityMessage::open`],
//! [`VisibilityMessage::closed`], and [`VisibilityMessage::delete`] so the
//! invariant holds by construction.

use serde::{Deserialize, Serialize};

use crate::error::MessagingError;

/// Lifecycle stage a visibility message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityMessageType {
    Open,
    Closed,
    Delete,
}

impl VisibilityMessageType {
    /// Stable tag appended to the document id to form the de-duplication key.
    pub fn tag(&self) -> &'static str {
        match self {
            VisibilityMessageType::Open => "Open",
            VisibilityMessageType::Closed => "Closed",
            VisibilityMessageType::Delete => "Delete",
        }
    }
}

/// Terminal status of a closed workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowCloseStatus {
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
}

/// Derived visibility summary of a workflow lifecycle transition.
///
/// Timestamps are nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityMessage {
    pub msg_type: VisibilityMessageType,
    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_status: Option<WorkflowCloseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i64>,
}

impl VisibilityMessage {
    /// Message for a workflow that has started running.
    pub fn open(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        workflow_type: impl Into<String>,
        start_time: i64,
    ) -> Self {
        Self {
            msg_type: VisibilityMessageType::Open,
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            workflow_type: Some(workflow_type.into()),
            start_time: Some(start_time),
            close_time: None,
            close_status: None,
            history_length: None,
        }
    }

    /// Message for a workflow that reached a terminal state.
    #[allow(clippy::too_many_arguments)]
    pub fn closed(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        workflow_type: impl Into<String>,
        start_time: i64,
        close_time: i64,
        close_status: WorkflowCloseStatus,
        history_length: i64,
    ) -> Self {
        Self {
            msg_type: VisibilityMessageType::Closed,
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            workflow_type: Some(workflow_type.into()),
            start_time: Some(start_time),
            close_time: Some(close_time),
            close_status: Some(close_status),
            history_length: Some(history_length),
        }
    }

    /// Message removing a workflow's visibility record past retention.
    pub fn delete(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            msg_type: VisibilityMessageType::Delete,
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            workflow_type: None,
            start_time: None,
            close_time: None,
            close_status: None,
            history_length: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::Decode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes).map_err(|e| MessagingError::Decode(e.to_string()))
    }
}
