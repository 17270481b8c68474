//! Configuration for the standby queue processor and the visibility indexer.
//!
//! Knobs are captured as owned values at processor construction. Defaults
//! reflect steady-state production tuning; tests override individual fields.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the standby transfer-queue processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueProcessorConfig {
    /// Maximum transfer tasks fetched per store read.
    pub batch_size: usize,
    /// Number of executor workers dispatching tasks concurrently.
    pub worker_count: usize,
    /// Steady-state ceiling on store polls per second.
    pub max_poll_rps: u32,
    /// Idle re-poll interval; jittered by `max_poll_interval_jitter_coefficient`.
    pub max_poll_interval: Duration,
    pub max_poll_interval_jitter_coefficient: f64,
    /// Cadence of the cluster ack-level updater; jittered likewise.
    pub update_ack_interval: Duration,
    pub update_ack_interval_jitter_coefficient: f64,
    /// In-memory retry budget per task before it is logged and dropped.
    pub max_retry_count: u32,
    /// Sleep between in-memory retries of the same task.
    pub retry_backoff: Duration,
    /// Lower bound on expected replication lag. The shard clock for a remote
    /// cluster already lags wall-clock by this much; admission and discard
    /// windows are derived from it.
    pub standby_cluster_delay: Duration,
}

impl Default for QueueProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            worker_count: 10,
            max_poll_rps: 20,
            max_poll_interval: Duration::from_secs(60),
            max_poll_interval_jitter_coefficient: 0.15,
            update_ack_interval: Duration::from_secs(30),
            update_ack_interval_jitter_coefficient: 0.15,
            max_retry_count: 100,
            retry_backoff: Duration::from_millis(100),
            standby_cluster_delay: Duration::from_secs(5 * 60),
        }
    }
}

/// Tuning for the Elasticsearch bulk processor and its consumer glue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Number of concurrent flush workers.
    pub num_of_workers: usize,
    /// Flush once this many requests are staged.
    pub bulk_actions: usize,
    /// Flush once the staged payload reaches this many bytes.
    pub bulk_size_bytes: usize,
    /// Flush whatever is staged at this interval.
    pub flush_interval: Duration,
    /// Sleep after a whole-batch commit failure before resubmitting.
    pub retry_interval: Duration,
    /// Initial backoff between attempts within one flush.
    pub bulk_retry_initial_interval: Duration,
    /// Backoff ceiling; a flush attempt past it fails the whole batch.
    pub bulk_retry_max_interval: Duration,
    /// Routing modulus for the in-flight map; all messages of one document
    /// serialize onto one shard.
    pub indexer_concurrency: usize,
    /// Target index for visibility documents.
    pub index_name: String,
    /// Mapping type recorded in each bulk header.
    pub doc_type: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            num_of_workers: 1,
            bulk_actions: 1000,
            bulk_size_bytes: 2 << 20,
            flush_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(5),
            bulk_retry_initial_interval: Duration::from_millis(200),
            bulk_retry_max_interval: Duration::from_secs(20),
            indexer_concurrency: 1000,
            index_name: "waypoint-visibility".to_string(),
            doc_type: "visibility".to_string(),
        }
    }
}

/// Jitter a base interval upward by up to `coefficient * base`.
pub(crate) fn jittered(base: Duration, coefficient: f64) -> Duration {
    if coefficient <= 0.0 {
        return base;
    }
    base.mul_f64(1.0 + coefficient * fastrand::f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_processor_config_defaults() {
        let config = QueueProcessorConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.max_retry_count, 100);
        assert_eq!(config.standby_cluster_delay, Duration::from_secs(300));
    }

    #[test]
    fn indexer_config_defaults() {
        let config = IndexerConfig::default();
        assert_eq!(config.bulk_actions, 1000);
        assert_eq!(config.bulk_size_bytes, 2 << 20);
        assert_eq!(config.index_name, "waypoint-visibility");
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            let d = jittered(base, 0.15);
            assert!(d >= base);
            assert!(d <= base.mul_f64(1.15));
        }
    }
}
