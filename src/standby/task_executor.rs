//! Per-type standby transfer-task handlers.
//!
//! Each handler runs in two stages. `inspect` reads mutable state under the
//! execution lease and produces a [`Decision`]: the terminal outcome plus
//! any side effects to perform. The lease is then released cleanly and the
//! side effects are applied outside it, so a slow matching RPC or bus
//! publish never pins the execution entry.
//!
//! Admission works off the shard's lagged clock. With `delay` the standby
//! cluster delay and `elapsed` measured against that clock: a pending,
//! unstarted dispatch is pushed to matching once `elapsed > delay` (the
//! active cluster has had its window), retried before that, and discarded
//! once `elapsed > 2 * delay`.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::constants::{EMPTY_EVENT_ID, FIRST_EVENT_ID, MAX_TASK_TIMEOUT_SECS};
use crate::error::ProcessError;
use crate::history::{ExecutionCache, MutableState};
use crate::messaging::message::WorkflowCloseStatus;
use crate::persistence::{TransferTask, TransferTaskType};
use crate::shard::ShardContext;
use crate::standby::recorder::TransferRecorder;
use crate::standby::HandlerOutcome;

/// Outcome of an inspect stage: what to conclude and what to do about it.
struct Decision {
    outcome: HandlerOutcome,
    record_started: Option<StartedRecord>,
    record_closed: Option<ClosedRecord>,
    push: Option<MatchingPush>,
}

impl Decision {
    fn done() -> Self {
        Self {
            outcome: HandlerOutcome::Done,
            record_started: None,
            record_closed: None,
            push: None,
        }
    }

    fn retry() -> Self {
        Self {
            outcome: HandlerOutcome::Retry,
            ..Self::done()
        }
    }

    fn discard() -> Self {
        Self {
            outcome: HandlerOutcome::Discard,
            ..Self::done()
        }
    }
}

struct StartedRecord {
    workflow_type_name: String,
    start_time_ns: i64,
    workflow_timeout_secs: i32,
}

struct ClosedRecord {
    workflow_type_name: String,
    start_time_ns: i64,
    close_time_ns: i64,
    close_status: WorkflowCloseStatus,
    history_length: i64,
}

enum MatchingPush {
    Activity { timeout_secs: i32 },
    Decision { task_list: String, timeout_secs: i32 },
}

/// Executes one standby transfer task to a terminal outcome or a retry.
pub struct StandbyTaskExecutor {
    cluster_name: String,
    shard: Arc<dyn ShardContext>,
    execution_cache: Arc<ExecutionCache>,
    recorder: Arc<TransferRecorder>,
    standby_cluster_delay: ChronoDuration,
}

impl StandbyTaskExecutor {
    pub fn new(
        cluster_name: impl Into<String>,
        shard: Arc<dyn ShardContext>,
        execution_cache: Arc<ExecutionCache>,
        recorder: Arc<TransferRecorder>,
        standby_cluster_delay: Duration,
    ) -> Self {
        let delay = ChronoDuration::from_std(standby_cluster_delay)
            .unwrap_or_else(|_| ChronoDuration::seconds(i64::MAX / 1_000));
        Self {
            cluster_name: cluster_name.into(),
            shard,
            execution_cache,
            recorder,
            standby_cluster_delay: delay,
        }
    }

    /// Dispatch one task to its per-type handler.
    pub async fn execute(&self, task: &TransferTask) -> Result<HandlerOutcome, ProcessError> {
        match task.task_type {
            TransferTaskType::ActivityTask => {
                self.process_transfer(false, task, |ms: &dyn MutableState| self.inspect_activity(task, ms))
                    .await
            }
            TransferTaskType::DecisionTask => {
                self.process_transfer(false, task, |ms: &dyn MutableState| self.inspect_decision(task, ms))
                    .await
            }
            TransferTaskType::CloseExecution => {
                self.process_transfer(true, task, |ms: &dyn MutableState| self.inspect_close(task, ms))
                    .await
            }
            TransferTaskType::CancelExecution => {
                self.process_transfer(false, task, |ms: &dyn MutableState| self.inspect_cancel(task, ms))
                    .await
            }
            TransferTaskType::SignalExecution => {
                self.process_transfer(false, task, |ms: &dyn MutableState| self.inspect_signal(task, ms))
                    .await
            }
            TransferTaskType::StartChildExecution => {
                self.process_transfer(false, task, |ms: &dyn MutableState| self.inspect_start_child(task, ms))
                    .await
            }
        }
    }

    /// Acquire the execution lease, inspect, release, then apply.
    async fn process_transfer<F>(
        &self,
        process_if_closed: bool,
        task: &TransferTask,
        inspect: F,
    ) -> Result<HandlerOutcome, ProcessError>
    where
        F: FnOnce(&dyn MutableState) -> Decision,
    {
        let lease = self.execution_cache.acquire(task.execution_key()).await?;
        let Some(state) = lease.state().cloned() else {
            // Execution unknown on this cluster: the task outlived its
            // workflow (retention delete or shard moved on).
            lease.release(None);
            return Ok(HandlerOutcome::Done);
        };

        if !process_if_closed && !state.is_running() {
            lease.release(None);
            return Ok(HandlerOutcome::Done);
        }

        let decision = inspect(state.as_ref());
        // Retry and every other inspect outcome release clean: inspection
        // never mutates, so the cached entry stays valid.
        lease.release(None);

        self.apply(task, &decision).await?;
        Ok(decision.outcome)
    }

    /// Perform the side effects staged by an inspect stage.
    async fn apply(&self, task: &TransferTask, decision: &Decision) -> Result<(), ProcessError> {
        if let Some(record) = &decision.record_started {
            self.recorder
                .record_workflow_started(
                    &task.domain_id,
                    &task.execution(),
                    &record.workflow_type_name,
                    record.start_time_ns,
                    record.workflow_timeout_secs,
                )
                .await?;
        }

        if let Some(record) = &decision.record_closed {
            self.recorder
                .record_workflow_closed(
                    &task.domain_id,
                    &task.execution(),
                    &record.workflow_type_name,
                    record.start_time_ns,
                    record.close_time_ns,
                    record.close_status,
                    record.history_length,
                )
                .await?;
        }

        if let Some(push) = &decision.push {
            match push {
                MatchingPush::Activity { timeout_secs } => {
                    let timeout = (*timeout_secs).min(MAX_TASK_TIMEOUT_SECS);
                    self.recorder.push_activity(task, timeout).await?;
                }
                MatchingPush::Decision {
                    task_list,
                    timeout_secs,
                } => {
                    let timeout = (*timeout_secs).min(MAX_TASK_TIMEOUT_SECS);
                    self.recorder.push_decision(task, task_list, timeout).await?;
                }
            }
        }

        Ok(())
    }

    fn inspect_activity(&self, task: &TransferTask, ms: &dyn MutableState) -> Decision {
        let Some(info) = ms.activity_info(task.schedule_id) else {
            return Decision::done();
        };
        if !self.verify_task_version(task, info.version) {
            return Decision::done();
        }
        if info.started_id != EMPTY_EVENT_ID {
            return Decision::done();
        }

        if self.discard_task(task) {
            return Decision::discard();
        }
        if self.push_window_open(task) {
            let timeout = info
                .schedule_to_start_timeout_secs
                .min(MAX_TASK_TIMEOUT_SECS);
            return Decision {
                push: Some(MatchingPush::Activity {
                    timeout_secs: timeout,
                }),
                ..Decision::done()
            };
        }
        Decision::retry()
    }

    fn inspect_decision(&self, task: &TransferTask, ms: &dyn MutableState) -> Decision {
        let execution_info = ms.execution_info();
        let workflow_timeout = execution_info.workflow_timeout_secs;
        let decision_timeout = workflow_timeout.min(MAX_TASK_TIMEOUT_SECS);
        let start_time_ns = execution_info
            .start_time
            .timestamp_nanos_opt()
            .unwrap_or_default();

        // The first decision schedules right after the start event; seeing
        // it means the workflow just opened.
        let mark_workflow_as_open = task.schedule_id <= FIRST_EVENT_ID + 2;
        let record_started = mark_workflow_as_open.then(|| StartedRecord {
            workflow_type_name: execution_info.workflow_type_name.clone(),
            start_time_ns,
            workflow_timeout_secs: workflow_timeout,
        });

        let Some(info) = ms.pending_decision(task.schedule_id) else {
            return Decision {
                record_started,
                ..Decision::done()
            };
        };
        if !self.verify_task_version(task, info.version) {
            return Decision::done();
        }

        let mut decision = Decision {
            record_started,
            ..Decision::done()
        };
        if info.started_id == EMPTY_EVENT_ID {
            if self.discard_task(task) {
                decision.outcome = HandlerOutcome::Discard;
            } else if self.push_window_open(task) {
                decision.push = Some(MatchingPush::Decision {
                    task_list: task.task_list().to_string(),
                    timeout_secs: decision_timeout,
                });
            } else {
                decision.outcome = HandlerOutcome::Retry;
            }
        }
        decision
    }

    fn inspect_close(&self, task: &TransferTask, ms: &dyn MutableState) -> Decision {
        if ms.is_running() {
            // A reset can reopen the execution after the close task was
            // written; the reset cluster owns the new run.
            return Decision::done();
        }
        if !self.verify_task_version(task, ms.last_write_version()) {
            return Decision::done();
        }

        let execution_info = ms.execution_info();
        // Replying to a parent workflow is left to the active cluster;
        // standby only records visibility.
        Decision {
            record_closed: Some(ClosedRecord {
                workflow_type_name: execution_info.workflow_type_name.clone(),
                start_time_ns: execution_info
                    .start_time
                    .timestamp_nanos_opt()
                    .unwrap_or_default(),
                close_time_ns: ms.last_updated_time().timestamp_nanos_opt().unwrap_or_default(),
                close_status: execution_info
                    .close_status
                    .unwrap_or(WorkflowCloseStatus::Completed),
                history_length: execution_info.next_event_id,
            }),
            ..Decision::done()
        }
    }

    fn inspect_cancel(&self, task: &TransferTask, ms: &dyn MutableState) -> Decision {
        let Some(info) = ms.request_cancel_info(task.schedule_id) else {
            return Decision::done();
        };
        if !self.verify_task_version(task, info.version) {
            return Decision::done();
        }
        if self.discard_task(task) {
            return Decision::discard();
        }
        Decision::retry()
    }

    fn inspect_signal(&self, task: &TransferTask, ms: &dyn MutableState) -> Decision {
        let Some(info) = ms.signal_info(task.schedule_id) else {
            return Decision::done();
        };
        if !self.verify_task_version(task, info.version) {
            return Decision::done();
        }
        if self.discard_task(task) {
            return Decision::discard();
        }
        Decision::retry()
    }

    fn inspect_start_child(&self, task: &TransferTask, ms: &dyn MutableState) -> Decision {
        let Some(info) = ms.child_execution_info(task.schedule_id) else {
            return Decision::done();
        };
        if !self.verify_task_version(task, info.version) {
            return Decision::done();
        }
        if info.started_id == EMPTY_EVENT_ID {
            if self.discard_task(task) {
                return Decision::discard();
            }
            return Decision::retry();
        }
        Decision::done()
    }

    /// Versions must match for standby to act; a mismatch means another
    /// cluster owns that part of the version history.
    fn verify_task_version(&self, task: &TransferTask, state_version: i64) -> bool {
        if state_version != task.version {
            debug!(
                task_id = task.task_id,
                task_version = task.version,
                state_version,
                "task version mismatch, dropping"
            );
            return false;
        }
        true
    }

    fn elapsed(&self, task: &TransferTask) -> ChronoDuration {
        self.shard.current_time(&self.cluster_name) - task.visibility_time
    }

    /// The active cluster has had a full replication window; this cluster
    /// may now dispatch on its behalf.
    fn push_window_open(&self, task: &TransferTask) -> bool {
        self.elapsed(task) > self.standby_cluster_delay
    }

    /// The task has been pending past twice the replication window; give up.
    /// The shard clock already lags wall-clock by the delay, so in wall
    /// terms this is three windows since the transition.
    fn discard_task(&self, task: &TransferTask) -> bool {
        let discard = self.elapsed(task) > self.standby_cluster_delay * 2;
        if discard {
            error!(
                domain_id = %task.domain_id,
                workflow_id = %task.workflow_id,
                run_id = %task.run_id,
                task_id = task.task_id,
                task_type = ?task.task_type,
                version = task.version,
                visibility_time = %task.visibility_time,
                schedule_id = task.schedule_id,
                "discarding standby transfer task pending for too long"
            );
        }
        discard
    }
}
