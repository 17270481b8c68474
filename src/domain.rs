//! Domain cache contract consumed by the standby pipeline.
//!
//! The cache maps a domain id to the metadata the pipeline needs: display
//! name, retention, retention-sampling policy, and replication topology.
//! Lookup misses are a normal condition (a domain may have been deleted
//! while its tasks are still draining) and degrade to defaults at the call
//! site.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::DomainError;

/// Replication topology of a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainReplicationConfig {
    /// Cluster currently authoritative for the domain.
    pub active_cluster: String,
    /// All clusters the domain is replicated to, active included.
    pub clusters: Vec<String>,
}

/// Cached metadata for one domain.
#[derive(Debug, Clone)]
pub struct DomainEntry {
    pub id: String,
    pub name: String,
    /// Whether the domain replicates across clusters at all. Local-only
    /// domains never reach standby processing.
    pub is_global: bool,
    pub replication: DomainReplicationConfig,
    /// Base retention for closed workflows, in days.
    pub retention_days: i32,
    /// Longer retention applied to the sampled subset when sampling is on.
    pub sampled_retention_days: i32,
    /// Fraction of workflows sampled for longer retention, 0.0 disables.
    pub sampled_retention_rate: f64,
}

impl DomainEntry {
    /// Retention in days for one workflow, honoring the sampling policy.
    pub fn retention_days(&self, workflow_id: &str) -> i32 {
        if self.is_sampled_for_longer_retention_enabled(workflow_id)
            && self.is_sampled_for_longer_retention(workflow_id)
        {
            return self.sampled_retention_days;
        }
        self.retention_days
    }

    pub fn is_sampled_for_longer_retention_enabled(&self, _workflow_id: &str) -> bool {
        self.sampled_retention_rate > 0.0
    }

    /// Stable per-workflow sampling decision: the same workflow id always
    /// lands on the same side of the rate.
    pub fn is_sampled_for_longer_retention(&self, workflow_id: &str) -> bool {
        let mut hasher = DefaultHasher::new();
        workflow_id.hash(&mut hasher);
        let bucket = hasher.finish() % 1_000;
        (bucket as f64) < self.sampled_retention_rate * 1_000.0
    }
}

/// Read access to domain metadata.
#[async_trait]
pub trait DomainCache: Send + Sync {
    async fn get_domain_by_id(&self, domain_id: &str) -> Result<Arc<DomainEntry>, DomainError>;
}
