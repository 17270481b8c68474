//! Mutable-state builder and execution-state store for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::HistoryError;
use crate::history::{
    ActivityInfo, ChildExecutionInfo, DecisionInfo, ExecutionInfo, ExecutionKey, ExecutionStateStore,
    MutableState, RequestCancelInfo, SignalInfo,
};
use crate::messaging::message::WorkflowCloseStatus;
use crate::test_helpers::base_time;

pub struct TestMutableState {
    running: bool,
    execution_info: ExecutionInfo,
    last_updated: DateTime<Utc>,
    last_write_version: i64,
    activities: HashMap<i64, ActivityInfo>,
    decisions: HashMap<i64, DecisionInfo>,
    cancels: HashMap<i64, RequestCancelInfo>,
    signals: HashMap<i64, SignalInfo>,
    children: HashMap<i64, ChildExecutionInfo>,
}

impl MutableState for TestMutableState {
    fn is_running(&self) -> bool {
        self.running
    }

    fn execution_info(&self) -> &ExecutionInfo {
        &self.execution_info
    }

    fn last_updated_time(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn last_write_version(&self) -> i64 {
        self.last_write_version
    }

    fn activity_info(&self, schedule_id: i64) -> Option<ActivityInfo> {
        self.activities.get(&schedule_id).copied()
    }

    fn pending_decision(&self, schedule_id: i64) -> Option<DecisionInfo> {
        self.decisions.get(&schedule_id).copied()
    }

    fn request_cancel_info(&self, schedule_id: i64) -> Option<RequestCancelInfo> {
        self.cancels.get(&schedule_id).copied()
    }

    fn signal_info(&self, schedule_id: i64) -> Option<SignalInfo> {
        self.signals.get(&schedule_id).copied()
    }

    fn child_execution_info(&self, schedule_id: i64) -> Option<ChildExecutionInfo> {
        self.children.get(&schedule_id).copied()
    }
}

/// Builder over [`TestMutableState`] with workable defaults.
pub struct TestMutableStateBuilder {
    state: TestMutableState,
}

impl TestMutableStateBuilder {
    pub fn running() -> Self {
        Self {
            state: TestMutableState {
                running: true,
                execution_info: ExecutionInfo {
                    workflow_type_name: "OrderWorkflow".to_string(),
                    workflow_timeout_secs: 120,
                    start_time: base_time(),
                    close_status: None,
                    next_event_id: 10,
                },
                last_updated: base_time(),
                last_write_version: 5,
                activities: HashMap::new(),
                decisions: HashMap::new(),
                cancels: HashMap::new(),
                signals: HashMap::new(),
                children: HashMap::new(),
            },
        }
    }

    pub fn closed(close_status: WorkflowCloseStatus, last_write_version: i64) -> Self {
        let mut builder = Self::running();
        builder.state.running = false;
        builder.state.execution_info.close_status = Some(close_status);
        builder.state.last_write_version = last_write_version;
        builder
    }

    pub fn with_activity(mut self, schedule_id: i64, info: ActivityInfo) -> Self {
        self.state.activities.insert(schedule_id, info);
        self
    }

    pub fn with_pending_decision(mut self, schedule_id: i64, info: DecisionInfo) -> Self {
        self.state.decisions.insert(schedule_id, info);
        self
    }

    pub fn with_request_cancel(mut self, schedule_id: i64, info: RequestCancelInfo) -> Self {
        self.state.cancels.insert(schedule_id, info);
        self
    }

    pub fn with_signal(mut self, schedule_id: i64, info: SignalInfo) -> Self {
        self.state.signals.insert(schedule_id, info);
        self
    }

    pub fn with_child_execution(mut self, schedule_id: i64, info: ChildExecutionInfo) -> Self {
        self.state.children.insert(schedule_id, info);
        self
    }

    pub fn with_workflow_type(mut self, name: &str) -> Self {
        self.state.execution_info.workflow_type_name = name.to_string();
        self
    }

    pub fn with_workflow_timeout(mut self, timeout_secs: i32) -> Self {
        self.state.execution_info.workflow_timeout_secs = timeout_secs;
        self
    }

    pub fn with_next_event_id(mut self, next_event_id: i64) -> Self {
        self.state.execution_info.next_event_id = next_event_id;
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.state.execution_info.start_time = start_time;
        self
    }

    pub fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.state.last_updated = last_updated;
        self
    }

    pub fn with_last_write_version(mut self, version: i64) -> Self {
        self.state.last_write_version = version;
        self
    }

    pub fn build(self) -> Arc<dyn MutableState> {
        Arc::new(self.state)
    }
}

/// Execution-state store backed by a fixed map.
#[derive(Default)]
pub struct StaticExecutionStateStore {
    states: Mutex<HashMap<ExecutionKey, Arc<dyn MutableState>>>,
}

impl StaticExecutionStateStore {
    pub fn insert(&self, key: ExecutionKey, state: Arc<dyn MutableState>) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(key, state);
        }
    }
}

#[async_trait]
impl ExecutionStateStore for StaticExecutionStateStore {
    async fn load(
        &self,
        key: &ExecutionKey,
    ) -> Result<Option<Arc<dyn MutableState>>, HistoryError> {
        Ok(self
            .states
            .lock()
            .ok()
            .and_then(|states| states.get(key).cloned()))
    }
}
