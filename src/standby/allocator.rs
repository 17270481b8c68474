//! Standby task allocation.
//!
//! Decides, per task and target cluster, whether this node is the standby
//! handler. A task belongs to the standby processor for cluster `c` exactly
//! when its domain is global and currently active in `c`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::domain::DomainCache;
use crate::error::{DomainError, ProcessError};
use crate::persistence::TransferTask;

#[async_trait]
pub trait TaskAllocator: Send + Sync {
    /// Whether the standby processor for `standby_cluster` should handle
    /// this task.
    async fn verify_standby_task(
        &self,
        standby_cluster: &str,
        domain_id: &str,
        task: &TransferTask,
    ) -> Result<bool, ProcessError>;
}

/// Allocator backed by domain replication metadata.
pub struct ClusterTaskAllocator {
    domain_cache: Arc<dyn DomainCache>,
}

impl ClusterTaskAllocator {
    pub fn new(domain_cache: Arc<dyn DomainCache>) -> Self {
        Self { domain_cache }
    }
}

#[async_trait]
impl TaskAllocator for ClusterTaskAllocator {
    async fn verify_standby_task(
        &self,
        standby_cluster: &str,
        domain_id: &str,
        task: &TransferTask,
    ) -> Result<bool, ProcessError> {
        let entry = match self.domain_cache.get_domain_by_id(domain_id).await {
            Ok(entry) => entry,
            Err(DomainError::NotFound(_)) => {
                warn!(
                    domain_id = %domain_id,
                    task_id = task.task_id,
                    "dropping standby task for unknown domain"
                );
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        Ok(entry.is_global && entry.replication.active_cluster == standby_cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_task, StaticDomainCache};
    use crate::persistence::TransferTaskType;

    fn allocator(cache: StaticDomainCache) -> ClusterTaskAllocator {
        ClusterTaskAllocator::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn task_for_domain_active_in_cluster_is_standby_here() {
        let cache = StaticDomainCache::default();
        cache.insert_global("d1", "orders", "remote");
        let allocator = allocator(cache);

        let task = sample_task(1, TransferTaskType::ActivityTask, "d1");
        let verified = allocator
            .verify_standby_task("remote", "d1", &task)
            .await
            .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn task_for_domain_active_elsewhere_is_filtered() {
        let cache = StaticDomainCache::default();
        cache.insert_global("d1", "orders", "primary");
        let allocator = allocator(cache);

        let task = sample_task(1, TransferTaskType::ActivityTask, "d1");
        let verified = allocator
            .verify_standby_task("remote", "d1", &task)
            .await
            .unwrap();
        assert!(!verified);
    }

    #[tokio::test]
    async fn unknown_domain_is_filtered_not_an_error() {
        let allocator = allocator(StaticDomainCache::default());
        let task = sample_task(1, TransferTaskType::DecisionTask, "ghost");
        let verified = allocator
            .verify_standby_task("remote", "ghost", &task)
            .await
            .unwrap();
        assert!(!verified);
    }

    #[tokio::test]
    async fn local_only_domain_is_filtered() {
        let cache = StaticDomainCache::default();
        cache.insert_local("d1", "orders", "remote");
        let allocator = allocator(cache);

        let task = sample_task(1, TransferTaskType::SignalExecution, "d1");
        let verified = allocator
            .verify_standby_task("remote", "d1", &task)
            .await
            .unwrap();
        assert!(!verified);
    }
}
