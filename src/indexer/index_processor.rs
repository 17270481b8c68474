//! Consumer loop feeding the bulk processor from the visibility topic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::IndexerConfig;
use crate::indexer::bulk::{doc_version_for, BulkRequest};
use crate::indexer::processor::EsBulkProcessor;
use crate::messaging::bus::{BusMessage, VisibilityConsumer};
use crate::messaging::message::{VisibilityMessage, VisibilityMessageType};
use crate::metrics::MetricsClient;

struct IndexInner {
    config: IndexerConfig,
    bulk: Arc<EsBulkProcessor>,
    metrics: MetricsClient,
    running: AtomicBool,
    shutdown: Notify,
}

/// Decodes bus messages into bulk requests keyed for de-duplication.
pub struct IndexProcessor {
    inner: Arc<IndexInner>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl IndexProcessor {
    pub fn new(config: IndexerConfig, bulk: Arc<EsBulkProcessor>, metrics: MetricsClient) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                config,
                bulk,
                metrics,
                running: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Start consuming from one partition. Idempotent.
    pub fn start(&self, consumer: Box<dyn VisibilityConsumer>) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("index processor starting");
        let handle = tokio::spawn(Self::run(self.inner.clone(), consumer));
        if let Ok(mut stored) = self.handle.lock() {
            *stored = Some(handle);
        }
        info!("index processor started");
    }

    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("index processor shutting down");
        self.inner.shutdown.notify_waiters();
        let handle = self.handle.lock().ok().and_then(|mut stored| stored.take());
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .is_err()
            {
                warn!("index processor shutdown timed out");
            }
        }
        info!("index processor shutdown");
    }

    async fn run(inner: Arc<IndexInner>, mut consumer: Box<dyn VisibilityConsumer>) {
        while inner.running.load(Ordering::Acquire) {
            let msg = tokio::select! {
                msg = consumer.next() => msg,
                _ = inner.shutdown.notified() => break,
            };
            let Some(msg) = msg else { break };
            Self::handle_message(&inner, msg);
        }
    }

    fn handle_message(inner: &Arc<IndexInner>, msg: Box<dyn BusMessage>) {
        let visibility = match VisibilityMessage::decode(msg.value()) {
            Ok(visibility) => visibility,
            Err(err) => {
                // A poison message must not wedge the partition: count it,
                // ack it, move on.
                inner.metrics.inc_es_processor_corrupted_data();
                warn!(error = %err, "undecodable visibility message, skipping");
                msg.ack();
                return;
            }
        };

        let key = format!("{}{}", visibility.run_id, visibility.msg_type.tag());
        let request = Self::build_request(&inner.config, &visibility);
        inner.bulk.add(request, key, msg);
    }

    fn build_request(config: &IndexerConfig, msg: &VisibilityMessage) -> BulkRequest {
        let version = doc_version_for(msg.msg_type);
        match msg.msg_type {
            VisibilityMessageType::Open | VisibilityMessageType::Closed => BulkRequest::index(
                config.index_name.clone(),
                config.doc_type.clone(),
                msg.run_id.clone(),
                version,
                msg.clone(),
            ),
            VisibilityMessageType::Delete => BulkRequest::delete(
                config.index_name.clone(),
                config.doc_type.clone(),
                msg.run_id.clone(),
                version,
            ),
        }
    }
}
