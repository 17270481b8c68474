//! # Elasticsearch Bulk Processor
//!
//! Batches versioned index/delete requests into bulk flushes and reconciles
//! per-item outcomes against the bus messages that produced them. The
//! in-flight table maps `doc_id ∥ msg_type` to the bus handle; every handle
//! added is eventually released exactly once, either by ack after a
//! successful (or version-conflicted) commit or by the duplicate shortcut
//! in [`EsBulkProcessor::add`].
//!
//! Flushes retry internally with exponential backoff (200 ms to 20 s).
//! A batch that still fails is resubmitted wholesale after `retry_interval`
//! without acking anything.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collection::ShardedConcurrentMap;
use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::indexer::bulk::{message_type_for_version, parse_bulk_header, parse_bulk_lines, BulkRequest};
use crate::indexer::es_client::{BulkResponse, ElasticsearchClient};
use crate::messaging::bus::BusMessage;
use crate::metrics::MetricsClient;

const IN_FLIGHT_SHARD_COUNT: usize = 1024;

/// Upper bound on how long a flush worker waits before re-checking the
/// running flag.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct BulkInner {
    processor_id: Uuid,
    config: IndexerConfig,
    client: Arc<dyn ElasticsearchClient>,
    in_flight: ShardedConcurrentMap<String, Box<dyn BusMessage>>,
    metrics: MetricsClient,
    running: AtomicBool,
    shutdown: Notify,
}

/// Bulk indexing front end: de-dupes, stages, flushes, reconciles.
pub struct EsBulkProcessor {
    inner: Arc<BulkInner>,
    tx: mpsc::UnboundedSender<BulkRequest>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl EsBulkProcessor {
    /// Create the processor and start its flush workers.
    pub fn start(
        config: IndexerConfig,
        client: Arc<dyn ElasticsearchClient>,
        metrics: MetricsClient,
    ) -> Self {
        let concurrency = config.indexer_concurrency.max(1) as u64;
        let in_flight = ShardedConcurrentMap::new(IN_FLIGHT_SHARD_COUNT, move |key: &String| {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            (hasher.finish() % concurrency) as u32
        });

        let inner = Arc::new(BulkInner {
            processor_id: Uuid::new_v4(),
            config,
            client,
            in_flight,
            metrics,
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(TokioMutex::new(rx));

        let mut workers = Vec::new();
        for worker_id in 0..inner.config.num_of_workers.max(1) {
            workers.push(tokio::spawn(Self::run_worker(
                inner.clone(),
                rx.clone(),
                tx.clone(),
                worker_id,
            )));
        }
        info!(
            processor_id = %inner.processor_id,
            workers = inner.config.num_of_workers.max(1),
            bulk_actions = inner.config.bulk_actions,
            "elasticsearch bulk processor started"
        );

        Self {
            inner,
            tx,
            workers: std::sync::Mutex::new(workers),
        }
    }

    /// Stage a request keyed by `doc_id ∥ msg_type`, recording the bus
    /// handle for reconciliation. A key already in flight means the bus
    /// redelivered: the new handle is acked immediately and the request
    /// dropped.
    pub fn add(&self, request: BulkRequest, key: String, msg: Box<dyn BusMessage>) {
        if self.inner.in_flight.contains(&key) {
            self.inner.metrics.inc_es_processor_duplicate_messages();
            debug!(key = %key, "duplicate visibility message, acking immediately");
            msg.ack();
            return;
        }
        // A concurrent reconcile may have removed the key between the checks;
        // the replaced handle is then acked here, which is safe because the
        // staged request for that key carries the same document state.
        if let Some(replaced) = self.inner.in_flight.put(key, msg) {
            self.inner.metrics.inc_es_processor_duplicate_messages();
            replaced.ack();
        }
        self.inner.metrics.inc_es_processor_requests();
        if self.tx.send(request).is_err() {
            warn!("bulk processor stopped, request dropped");
        }
    }

    /// Stop the flush workers, flushing whatever is staged.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("elasticsearch bulk processor shutting down");
        self.inner.shutdown.notify_waiters();

        let workers = self
            .workers
            .lock()
            .map(|mut stored| stored.drain(..).collect::<Vec<_>>())
            .unwrap_or_default();
        for worker in workers {
            if tokio::time::timeout(Duration::from_secs(30), worker)
                .await
                .is_err()
            {
                warn!("elasticsearch bulk processor shutdown timed out");
            }
        }
        info!("elasticsearch bulk processor shutdown");
    }

    /// Number of requests currently awaiting reconciliation.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    async fn run_worker(
        inner: Arc<BulkInner>,
        rx: Arc<TokioMutex<mpsc::UnboundedReceiver<BulkRequest>>>,
        resubmit: mpsc::UnboundedSender<BulkRequest>,
        worker_id: usize,
    ) {
        debug!(processor_id = %inner.processor_id, worker_id, "bulk flush worker started");
        loop {
            let mut staged: Vec<Vec<String>> = Vec::new();
            let mut staged_bytes = 0usize;

            if !inner.running.load(Ordering::Acquire) {
                // Shutdown: drain what is immediately available, flush, exit.
                {
                    let mut guard = rx.lock().await;
                    while let Ok(request) = guard.try_recv() {
                        Self::stage(&inner, request, &mut staged, &mut staged_bytes);
                    }
                }
                Self::flush(&inner, &mut staged, &resubmit).await;
                break;
            }

            // The periodic tick bounds the wait so a shutdown notification
            // raced past this worker still terminates it.
            let first = {
                let mut guard = rx.lock().await;
                tokio::select! {
                    request = guard.recv() => {
                        if request.is_none() {
                            break;
                        }
                        request
                    }
                    _ = inner.shutdown.notified() => None,
                    _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => None,
                }
            };
            let Some(first) = first else { continue };
            Self::stage(&inner, first, &mut staged, &mut staged_bytes);

            let deadline = tokio::time::Instant::now() + inner.config.flush_interval;
            while staged.len() < inner.config.bulk_actions
                && staged_bytes < inner.config.bulk_size_bytes
            {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let next = {
                    let mut guard = rx.lock().await;
                    tokio::select! {
                        result = tokio::time::timeout(remaining, guard.recv()) => {
                            match result {
                                Ok(request) => request,
                                Err(_) => None,
                            }
                        }
                        _ = inner.shutdown.notified() => None,
                    }
                };
                let Some(request) = next else { break };
                Self::stage(&inner, request, &mut staged, &mut staged_bytes);
            }

            Self::flush(&inner, &mut staged, &resubmit).await;
        }
        debug!(processor_id = %inner.processor_id, worker_id, "bulk flush worker stopped");
    }

    fn stage(
        inner: &Arc<BulkInner>,
        request: BulkRequest,
        staged: &mut Vec<Vec<String>>,
        staged_bytes: &mut usize,
    ) {
        match request.to_lines() {
            Ok(lines) => {
                *staged_bytes += lines.iter().map(|line| line.len() + 1).sum::<usize>();
                staged.push(lines);
            }
            Err(err) => {
                inner.metrics.inc_es_processor_corrupted_data();
                error!(error = %err, "bulk request serialization failed, dropping");
            }
        }
    }

    async fn flush(
        inner: &Arc<BulkInner>,
        staged: &mut Vec<Vec<String>>,
        resubmit: &mpsc::UnboundedSender<BulkRequest>,
    ) {
        if staged.is_empty() {
            return;
        }
        let batch = std::mem::take(staged);
        let mut body = String::new();
        for lines in &batch {
            for line in lines {
                body.push_str(line);
                body.push('\n');
            }
        }

        match Self::execute_with_backoff(inner, &body).await {
            Ok(response) => Self::reconcile(inner, &batch, &response, resubmit),
            Err(err) => {
                // The whole batch failed after internal retries: something is
                // wrong with the cluster or the index. Wait, rebuild every
                // request from its framing, resubmit, ack nothing.
                inner.metrics.inc_es_processor_failures();
                error!(
                    error = %err,
                    batch_size = batch.len(),
                    "bulk commit failed"
                );
                tokio::select! {
                    _ = tokio::time::sleep(inner.config.retry_interval) => {}
                    _ = inner.shutdown.notified() => {}
                }
                for lines in &batch {
                    match parse_bulk_lines(lines) {
                        Ok(request) => {
                            let _ = resubmit.send(request);
                        }
                        Err(parse_err) => {
                            inner.metrics.inc_es_processor_corrupted_data();
                            error!(error = %parse_err, "failed to rebuild bulk request, dropping");
                        }
                    }
                }
            }
        }
    }

    async fn execute_with_backoff(
        inner: &Arc<BulkInner>,
        body: &str,
    ) -> Result<BulkResponse, IndexerError> {
        let mut delay = inner.config.bulk_retry_initial_interval;
        loop {
            match inner.client.bulk(body.to_string()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if delay > inner.config.bulk_retry_max_interval {
                        return Err(err);
                    }
                    warn!(
                        error = %err,
                        backoff_ms = delay.as_millis() as u64,
                        "bulk flush attempt failed, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = inner.shutdown.notified() => return Err(err),
                    }
                    delay *= 2;
                }
            }
        }
    }

    /// Match per-item statuses back to in-flight handles. 2xx and 409 both
    /// count as the document being represented: a version conflict means a
    /// newer lifecycle state is already indexed.
    fn reconcile(
        inner: &Arc<BulkInner>,
        batch: &[Vec<String>],
        response: &BulkResponse,
        resubmit: &mpsc::UnboundedSender<BulkRequest>,
    ) {
        for (i, lines) in batch.iter().enumerate() {
            let Some(item) = response.items.get(i) else {
                inner.metrics.inc_es_processor_corrupted_data();
                warn!(
                    index = i,
                    batch_size = batch.len(),
                    "bulk response shorter than submitted batch"
                );
                continue;
            };

            let Some(header_line) = lines.first() else {
                inner.metrics.inc_es_processor_corrupted_data();
                continue;
            };
            let header = match parse_bulk_header(header_line) {
                Ok((_, header)) => header,
                Err(err) => {
                    inner.metrics.inc_es_processor_corrupted_data();
                    error!(error = %err, "unparseable bulk header during reconcile");
                    continue;
                }
            };
            let Some(msg_type) = message_type_for_version(header.version) else {
                inner.metrics.inc_es_processor_corrupted_data();
                error!(version = header.version, "unknown document version during reconcile");
                continue;
            };
            let key = format!("{}{}", header.id, msg_type.tag());

            if (200..300).contains(&item.status) || item.status == 409 {
                Self::ack_bus_message(inner, &key);
            } else {
                debug!(
                    key = %key,
                    status = item.status,
                    "bulk item failed, resubmitting"
                );
                match parse_bulk_lines(lines) {
                    Ok(request) => {
                        let _ = resubmit.send(request);
                    }
                    Err(err) => {
                        inner.metrics.inc_es_processor_corrupted_data();
                        error!(error = %err, "failed to rebuild bulk request, dropping");
                    }
                }
            }
        }
    }

    fn ack_bus_message(inner: &Arc<BulkInner>, key: &str) {
        match inner.in_flight.remove(&key.to_string()) {
            Some(msg) => msg.ack(),
            // Missing key: a redelivered copy was already acked through the
            // duplicate shortcut.
            None => debug!(key = %key, "no in-flight handle for key"),
        }
    }
}
