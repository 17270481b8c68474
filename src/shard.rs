//! Shard context contract.
//!
//! A shard owns a contiguous range of workflow executions, the transfer
//! queue derived from them, and the per-cluster ack levels persisted in
//! shard metadata. The per-cluster clock is the load-bearing piece for
//! standby processing: for a remote cluster it deliberately lags wall-clock
//! by the standby cluster delay, so admission and discard comparisons come
//! out conservative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PersistenceError;

#[async_trait]
pub trait ShardContext: Send + Sync {
    /// Current time as seen for `cluster`. For remote clusters this lags
    /// wall-clock by the configured standby cluster delay.
    fn current_time(&self, cluster: &str) -> DateTime<Utc>;

    /// Highest transfer task id that is safe to read.
    fn transfer_max_read_level(&self) -> i64;

    /// Persisted ack level for `cluster`; tasks at or below it are
    /// terminally processed.
    fn transfer_cluster_ack_level(&self, cluster: &str) -> i64;

    /// Persist a new ack level for `cluster`. Levels are monotonically
    /// non-decreasing; implementations reject regressions.
    async fn update_transfer_cluster_ack_level(
        &self,
        cluster: &str,
        level: i64,
    ) -> Result<(), PersistenceError>;
}
