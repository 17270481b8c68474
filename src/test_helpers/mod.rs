//! In-crate test doubles for the pipeline's external collaborators.
//!
//! These back both the `#[cfg(test)]` unit suites and the integration tests
//! under `tests/`. They are deterministic: clocks are manual, stores are in
//! memory, and every recorded interaction is observable.

pub mod bus;
pub mod domain;
pub mod es;
pub mod history;
pub mod matching;
pub mod persistence;
pub mod shard;

pub use bus::{TestBusMessage, TestMessageProbe};
pub use domain::StaticDomainCache;
pub use es::ScriptedEsClient;
pub use history::{StaticExecutionStateStore, TestMutableStateBuilder};
pub use matching::MockMatchingClient;
pub use persistence::{InMemoryTransferStore, MemoryVisibilityStore};
pub use shard::ManualClockShard;

use chrono::{TimeZone, Utc};

use crate::persistence::{TransferTask, TransferTaskType};

/// A transfer task with stable identity fields; tests override what they
/// care about.
pub fn sample_task(task_id: i64, task_type: TransferTaskType, domain_id: &str) -> TransferTask {
    TransferTask {
        task_id,
        task_type,
        domain_id: domain_id.to_string(),
        workflow_id: "wf1".to_string(),
        run_id: "run1".to_string(),
        target_domain_id: None,
        task_list: Some("default-task-list".to_string()),
        schedule_id: 7,
        version: 5,
        visibility_time: base_time(),
    }
}

/// Fixed reference instant used as "T0" across the standby tests.
pub fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
}
