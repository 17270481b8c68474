//! Matching pushes and visibility records emitted by standby handlers.
//!
//! Visibility is written twice on purpose: a message on the bus feeds the
//! Elasticsearch projection, and a row in the primary visibility store keeps
//! the durable system of record. Both writes are at-least-once; the index
//! de-dupes by document id plus message type.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::constants::{DEFAULT_DOMAIN_NAME, SECONDS_IN_DAY};
use crate::domain::DomainCache;
use crate::error::{DomainError, ProcessError};
use crate::matching::{AddActivityTaskRequest, AddDecisionTaskRequest, MatchingClient};
use crate::messaging::bus::VisibilityProducer;
use crate::messaging::message::{VisibilityMessage, WorkflowCloseStatus};
use crate::persistence::{
    RecordWorkflowExecutionClosedRequest, RecordWorkflowExecutionStartedRequest, TransferTask,
    TransferTaskType, VisibilityStore, WorkflowExecution,
};

/// Side-effect sink for the standby task executor.
pub struct TransferRecorder {
    domain_cache: Arc<dyn DomainCache>,
    visibility_store: Arc<dyn VisibilityStore>,
    visibility_producer: Option<Arc<dyn VisibilityProducer>>,
    matching_client: Arc<dyn MatchingClient>,
}

impl TransferRecorder {
    pub fn new(
        domain_cache: Arc<dyn DomainCache>,
        visibility_store: Arc<dyn VisibilityStore>,
        visibility_producer: Option<Arc<dyn VisibilityProducer>>,
        matching_client: Arc<dyn MatchingClient>,
    ) -> Self {
        Self {
            domain_cache,
            visibility_store,
            visibility_producer,
            matching_client,
        }
    }

    /// Push an admitted activity task to matching.
    pub async fn push_activity(
        &self,
        task: &TransferTask,
        schedule_to_start_timeout_secs: i32,
    ) -> Result<(), ProcessError> {
        if task.task_type != TransferTaskType::ActivityTask {
            debug_assert!(false, "push_activity on {:?}", task.task_type);
            return Err(ProcessError::InvalidTask(format!(
                "cannot push non-activity task {:?} to matching",
                task.task_type
            )));
        }

        self.matching_client
            .add_activity_task(AddActivityTaskRequest {
                domain_uuid: task.target_domain_id().to_string(),
                source_domain_uuid: task.domain_id.clone(),
                execution: task.execution(),
                task_list: task.task_list().to_string(),
                schedule_id: task.schedule_id,
                schedule_to_start_timeout_secs,
            })
            .await?;
        Ok(())
    }

    /// Push an admitted decision task to matching.
    pub async fn push_decision(
        &self,
        task: &TransferTask,
        task_list: &str,
        schedule_to_start_timeout_secs: i32,
    ) -> Result<(), ProcessError> {
        if task.task_type != TransferTaskType::DecisionTask {
            debug_assert!(false, "push_decision on {:?}", task.task_type);
            return Err(ProcessError::InvalidTask(format!(
                "cannot push non-decision task {:?} to matching",
                task.task_type
            )));
        }

        self.matching_client
            .add_decision_task(AddDecisionTaskRequest {
                domain_uuid: task.domain_id.clone(),
                execution: task.execution(),
                task_list: task_list.to_string(),
                schedule_id: task.schedule_id,
                schedule_to_start_timeout_secs,
            })
            .await?;
        Ok(())
    }

    /// Record a workflow as started: publish `Open` and write the primary
    /// visibility row. Skipped entirely for unsampled workflows of domains
    /// with retention sampling on.
    #[instrument(skip(self, execution), fields(domain_id = %domain_id, workflow_id = %execution.workflow_id))]
    pub async fn record_workflow_started(
        &self,
        domain_id: &str,
        execution: &WorkflowExecution,
        workflow_type_name: &str,
        start_time_ns: i64,
        workflow_timeout_secs: i32,
    ) -> Result<(), ProcessError> {
        let entry = self.resolve_domain(domain_id).await?;
        let workflow_id = execution.workflow_id.as_str();

        let domain_name = entry
            .as_ref()
            .map(|e| e.name.clone())
            .unwrap_or_else(|| DEFAULT_DOMAIN_NAME.to_string());

        if let Some(entry) = &entry {
            if entry.is_sampled_for_longer_retention_enabled(workflow_id)
                && !entry.is_sampled_for_longer_retention(workflow_id)
            {
                debug!("workflow not in retention sample, skipping visibility record");
                return Ok(());
            }
        }

        if let Some(producer) = &self.visibility_producer {
            let msg = VisibilityMessage::open(
                domain_id,
                workflow_id,
                execution.run_id.as_str(),
                workflow_type_name,
                start_time_ns,
            );
            producer.publish(&msg).await?;
        }

        self.visibility_store
            .record_workflow_execution_started(RecordWorkflowExecutionStartedRequest {
                domain_uuid: domain_id.to_string(),
                domain: domain_name,
                execution: execution.clone(),
                workflow_type_name: workflow_type_name.to_string(),
                start_time: start_time_ns,
                workflow_timeout: i64::from(workflow_timeout_secs),
            })
            .await?;
        Ok(())
    }

    /// Record a workflow as closed: publish `Closed` and write the primary
    /// visibility row with the domain's retention.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, execution), fields(domain_id = %domain_id, workflow_id = %execution.workflow_id))]
    pub async fn record_workflow_closed(
        &self,
        domain_id: &str,
        execution: &WorkflowExecution,
        workflow_type_name: &str,
        start_time_ns: i64,
        close_time_ns: i64,
        close_status: WorkflowCloseStatus,
        history_length: i64,
    ) -> Result<(), ProcessError> {
        let entry = self.resolve_domain(domain_id).await?;
        let workflow_id = execution.workflow_id.as_str();

        // The domain may have been deleted while its executions drain; fall
        // back to zero retention and the default name.
        let mut retention_seconds = 0i64;
        let mut domain_name = DEFAULT_DOMAIN_NAME.to_string();
        if let Some(entry) = &entry {
            retention_seconds = i64::from(entry.retention_days(workflow_id)) * SECONDS_IN_DAY;
            domain_name = entry.name.clone();

            if entry.is_sampled_for_longer_retention_enabled(workflow_id)
                && !entry.is_sampled_for_longer_retention(workflow_id)
            {
                debug!("workflow not in retention sample, skipping visibility record");
                return Ok(());
            }
        }

        if let Some(producer) = &self.visibility_producer {
            let msg = VisibilityMessage::closed(
                domain_id,
                workflow_id,
                execution.run_id.as_str(),
                workflow_type_name,
                start_time_ns,
                close_time_ns,
                close_status,
                history_length,
            );
            producer.publish(&msg).await?;
        }

        self.visibility_store
            .record_workflow_execution_closed(RecordWorkflowExecutionClosedRequest {
                domain_uuid: domain_id.to_string(),
                domain: domain_name,
                execution: execution.clone(),
                workflow_type_name: workflow_type_name.to_string(),
                start_time: start_time_ns,
                close_time: close_time_ns,
                status: close_status,
                history_length,
                retention_seconds,
            })
            .await?;
        Ok(())
    }

    async fn resolve_domain(
        &self,
        domain_id: &str,
    ) -> Result<Option<Arc<crate::domain::DomainEntry>>, ProcessError> {
        match self.domain_cache.get_domain_by_id(domain_id).await {
            Ok(entry) => Ok(Some(entry)),
            Err(DomainError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
