//! Static domain cache for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{DomainCache, DomainEntry, DomainReplicationConfig};
use crate::error::DomainError;

/// Domain cache backed by a fixed map; missing ids report `NotFound`.
#[derive(Default)]
pub struct StaticDomainCache {
    entries: Mutex<HashMap<String, Arc<DomainEntry>>>,
}

impl StaticDomainCache {
    pub fn insert(&self, entry: DomainEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(entry.id.clone(), Arc::new(entry));
        }
    }

    /// Global domain active in `active_cluster` with default retention.
    pub fn insert_global(&self, id: &str, name: &str, active_cluster: &str) {
        self.insert_global_with_retention(id, name, active_cluster, 3);
    }

    pub fn insert_global_with_retention(
        &self,
        id: &str,
        name: &str,
        active_cluster: &str,
        retention_days: i32,
    ) {
        self.insert(DomainEntry {
            id: id.to_string(),
            name: name.to_string(),
            is_global: true,
            replication: DomainReplicationConfig {
                active_cluster: active_cluster.to_string(),
                clusters: vec![active_cluster.to_string(), "secondary".to_string()],
            },
            retention_days,
            sampled_retention_days: 30,
            sampled_retention_rate: 0.0,
        });
    }

    /// Global domain with retention sampling enabled at `rate`.
    pub fn insert_global_sampled(&self, id: &str, name: &str, active_cluster: &str, rate: f64) {
        self.insert(DomainEntry {
            id: id.to_string(),
            name: name.to_string(),
            is_global: true,
            replication: DomainReplicationConfig {
                active_cluster: active_cluster.to_string(),
                clusters: vec![active_cluster.to_string(), "secondary".to_string()],
            },
            retention_days: 3,
            sampled_retention_days: 30,
            sampled_retention_rate: rate,
        });
    }

    /// Domain that does not replicate across clusters.
    pub fn insert_local(&self, id: &str, name: &str, active_cluster: &str) {
        self.insert(DomainEntry {
            id: id.to_string(),
            name: name.to_string(),
            is_global: false,
            replication: DomainReplicationConfig {
                active_cluster: active_cluster.to_string(),
                clusters: vec![active_cluster.to_string()],
            },
            retention_days: 3,
            sampled_retention_days: 30,
            sampled_retention_rate: 0.0,
        });
    }
}

#[async_trait]
impl DomainCache for StaticDomainCache {
    async fn get_domain_by_id(&self, domain_id: &str) -> Result<Arc<DomainEntry>, DomainError> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(domain_id).cloned())
            .ok_or_else(|| DomainError::NotFound(domain_id.to_string()))
    }
}
