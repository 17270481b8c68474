//! Shard context with a manual per-cluster clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::shard::ShardContext;
use crate::test_helpers::base_time;

/// Shard whose clocks and levels are set explicitly by the test.
pub struct ManualClockShard {
    times: Mutex<HashMap<String, DateTime<Utc>>>,
    max_read_level: AtomicI64,
    ack_levels: Mutex<HashMap<String, i64>>,
}

impl Default for ManualClockShard {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClockShard {
    pub fn new() -> Self {
        Self {
            times: Mutex::new(HashMap::new()),
            max_read_level: AtomicI64::new(0),
            ack_levels: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_current_time(&self, cluster: &str, time: DateTime<Utc>) {
        if let Ok(mut times) = self.times.lock() {
            times.insert(cluster.to_string(), time);
        }
    }

    pub fn set_max_read_level(&self, level: i64) {
        self.max_read_level.store(level, Ordering::SeqCst);
    }

    pub fn persisted_ack_level(&self, cluster: &str) -> i64 {
        self.transfer_cluster_ack_level(cluster)
    }
}

#[async_trait]
impl ShardContext for ManualClockShard {
    fn current_time(&self, cluster: &str) -> DateTime<Utc> {
        self.times
            .lock()
            .ok()
            .and_then(|times| times.get(cluster).copied())
            .unwrap_or_else(base_time)
    }

    fn transfer_max_read_level(&self) -> i64 {
        self.max_read_level.load(Ordering::SeqCst)
    }

    fn transfer_cluster_ack_level(&self, cluster: &str) -> i64 {
        self.ack_levels
            .lock()
            .ok()
            .and_then(|levels| levels.get(cluster).copied())
            .unwrap_or(0)
    }

    async fn update_transfer_cluster_ack_level(
        &self,
        cluster: &str,
        level: i64,
    ) -> Result<(), PersistenceError> {
        let mut levels = self
            .ack_levels
            .lock()
            .map_err(|_| PersistenceError::AckUpdateFailed("shard poisoned".to_string()))?;
        let current = levels.entry(cluster.to_string()).or_insert(0);
        if level < *current {
            return Err(PersistenceError::AckUpdateFailed(format!(
                "ack level regression: {level} < {current}"
            )));
        }
        *current = level;
        Ok(())
    }
}
