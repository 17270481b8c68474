//! Workflow mutable state contracts and the scoped execution cache.

pub mod execution_cache;
pub mod mutable_state;

pub use execution_cache::{ExecutionCache, ExecutionLease, ExecutionStateStore};
pub use mutable_state::{
    ActivityInfo, ChildExecutionInfo, DecisionInfo, ExecutionInfo, MutableState,
    RequestCancelInfo, SignalInfo,
};

/// Cache key identifying one workflow execution attempt within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionKey {
    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,
}
