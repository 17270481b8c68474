//! # Standby Transfer Queue Processor
//!
//! Canonical poll-dispatch-ack loop over the shard's transfer queue:
//!
//! - one poller refills the worker channel from the store, paced to
//!   `max_poll_rps` and woken early by [`TransferQueueStandbyProcessor::
//!   notify_new_task`];
//! - `worker_count` executors run the allocator filter and the per-type
//!   handler, retrying in memory up to `max_retry_count`;
//! - one updater persists the cluster ack level on a jittered ticker.
//!
//! The ack level only moves past a task once its handler returned a
//! terminal outcome, so a crash never skips unprocessed tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex as TokioMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{jittered, QueueProcessorConfig};
use crate::error::ProcessError;
use crate::metrics::MetricsClient;
use crate::persistence::{TransferTask, TransferTaskStore};
use crate::shard::ShardContext;
use crate::standby::ack_manager::AckManager;
use crate::standby::allocator::TaskAllocator;
use crate::standby::task_executor::StandbyTaskExecutor;
use crate::standby::HandlerOutcome;

/// Upper bound on how long a worker waits before re-checking the running
/// flag; covers a shutdown notification racing past the select.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Inner {
    cluster_name: String,
    config: QueueProcessorConfig,
    shard: Arc<dyn ShardContext>,
    store: Arc<dyn TransferTaskStore>,
    allocator: Arc<dyn TaskAllocator>,
    executor: Arc<StandbyTaskExecutor>,
    ack: AckManager,
    metrics: MetricsClient,
    running: AtomicBool,
    shutdown: Notify,
    new_task: Notify,
}

/// Per-remote-cluster standby consumer of the transfer queue.
pub struct TransferQueueStandbyProcessor {
    inner: Arc<Inner>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TransferQueueStandbyProcessor {
    pub fn new(
        cluster_name: impl Into<String>,
        config: QueueProcessorConfig,
        shard: Arc<dyn ShardContext>,
        store: Arc<dyn TransferTaskStore>,
        allocator: Arc<dyn TaskAllocator>,
        executor: Arc<StandbyTaskExecutor>,
        metrics: MetricsClient,
    ) -> Self {
        let cluster_name = cluster_name.into();
        let ack = AckManager::new(shard.transfer_cluster_ack_level(&cluster_name));
        Self {
            inner: Arc::new(Inner {
                cluster_name,
                config,
                shard,
                store,
                allocator,
                executor,
                ack,
                metrics,
                running: AtomicBool::new(false),
                shutdown: Notify::new(),
                new_task: Notify::new(),
            }),
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the poller, executor workers, and ack updater. Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            cluster = %self.inner.cluster_name,
            workers = self.inner.config.worker_count,
            "transfer queue standby processor starting"
        );

        let (tx, rx) = mpsc::channel::<TransferTask>(self.inner.config.batch_size.max(1));
        let rx = Arc::new(TokioMutex::new(rx));

        let mut handles = Vec::new();
        handles.push(tokio::spawn(Self::run_poller(self.inner.clone(), tx)));
        for worker_id in 0..self.inner.config.worker_count.max(1) {
            handles.push(tokio::spawn(Self::run_worker(
                self.inner.clone(),
                rx.clone(),
                worker_id,
            )));
        }
        handles.push(tokio::spawn(Self::run_ack_updater(self.inner.clone())));

        if let Ok(mut stored) = self.handles.lock() {
            stored.extend(handles);
        }
        info!(cluster = %self.inner.cluster_name, "transfer queue standby processor started");
    }

    /// Stop all loops, waiting for in-flight tasks to settle.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!(cluster = %self.inner.cluster_name, "transfer queue standby processor shutting down");
        self.inner.shutdown.notify_waiters();

        let handles = self
            .handles
            .lock()
            .map(|mut stored| stored.drain(..).collect::<Vec<_>>())
            .unwrap_or_default();
        for handle in handles {
            if tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .is_err()
            {
                warn!(
                    cluster = %self.inner.cluster_name,
                    "transfer queue standby processor shutdown timed out"
                );
            }
        }
        info!(cluster = %self.inner.cluster_name, "transfer queue standby processor shutdown");
    }

    /// Wake the poller ahead of its interval; called when new transfer tasks
    /// were written to the shard.
    pub fn notify_new_task(&self) {
        self.inner.new_task.notify_one();
    }

    /// Ack level currently computed from completed tasks.
    pub fn ack_level(&self) -> i64 {
        self.inner.ack.ack_level()
    }

    async fn run_poller(inner: Arc<Inner>, tx: mpsc::Sender<TransferTask>) {
        let min_poll_spacing =
            Duration::from_secs_f64(1.0 / f64::from(inner.config.max_poll_rps.max(1)));
        let mut last_poll = Instant::now()
            .checked_sub(min_poll_spacing)
            .unwrap_or_else(Instant::now);

        while inner.running.load(Ordering::Acquire) {
            let since_last = last_poll.elapsed();
            if since_last < min_poll_spacing {
                tokio::select! {
                    _ = tokio::time::sleep(min_poll_spacing - since_last) => {}
                    _ = inner.shutdown.notified() => break,
                }
            }
            last_poll = Instant::now();

            let mut has_more = false;
            let read_level = inner.ack.read_level();
            let max_read_level = inner.shard.transfer_max_read_level();
            if read_level < max_read_level {
                match inner
                    .store
                    .get_transfer_tasks(read_level, max_read_level, inner.config.batch_size)
                    .await
                {
                    Ok(page) => {
                        has_more = page.has_more;
                        debug!(
                            cluster = %inner.cluster_name,
                            read_level,
                            max_read_level,
                            count = page.tasks.len(),
                            "read transfer tasks"
                        );
                        for task in page.tasks {
                            inner.ack.register(task.task_id);
                            tokio::select! {
                                sent = tx.send(task) => {
                                    if sent.is_err() {
                                        return;
                                    }
                                }
                                _ = inner.shutdown.notified() => return,
                            }
                        }
                    }
                    Err(err) => {
                        error!(cluster = %inner.cluster_name, error = %err, "transfer task read failed");
                    }
                }
            }

            if has_more {
                continue;
            }

            let wait = jittered(
                inner.config.max_poll_interval,
                inner.config.max_poll_interval_jitter_coefficient,
            );
            tokio::select! {
                _ = inner.new_task.notified() => {}
                _ = tokio::time::sleep(wait) => {}
                _ = inner.shutdown.notified() => break,
            }
        }
    }

    async fn run_worker(
        inner: Arc<Inner>,
        rx: Arc<TokioMutex<mpsc::Receiver<TransferTask>>>,
        worker_id: usize,
    ) {
        debug!(cluster = %inner.cluster_name, worker_id, "standby executor worker started");
        loop {
            if !inner.running.load(Ordering::Acquire) {
                break;
            }
            // The periodic tick bounds the wait so a shutdown notification
            // raced past this worker still terminates it.
            let task = {
                let mut guard = rx.lock().await;
                tokio::select! {
                    task = guard.recv() => {
                        if task.is_none() {
                            break;
                        }
                        task
                    }
                    _ = inner.shutdown.notified() => None,
                    _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => None,
                }
            };
            if let Some(task) = task {
                Self::process_task(&inner, task).await;
            }
        }
        debug!(cluster = %inner.cluster_name, worker_id, "standby executor worker stopped");
    }

    /// Drive one task to a terminal outcome within the retry budget.
    async fn process_task(inner: &Arc<Inner>, task: TransferTask) {
        let mut attempt: u32 = 0;
        loop {
            match Self::process_once(inner, &task).await {
                Ok(HandlerOutcome::Done) => {
                    inner.metrics.inc_transfer_tasks_processed();
                    inner.ack.complete(task.task_id);
                    return;
                }
                Ok(HandlerOutcome::Discard) => {
                    inner.metrics.inc_transfer_tasks_discarded();
                    inner.ack.complete(task.task_id);
                    return;
                }
                Ok(HandlerOutcome::Retry) => {
                    debug!(
                        cluster = %inner.cluster_name,
                        task_id = task.task_id,
                        attempt,
                        "task waiting on replication, retrying"
                    );
                }
                Err(err) => {
                    warn!(
                        cluster = %inner.cluster_name,
                        task_id = task.task_id,
                        attempt,
                        error = %err,
                        "transfer task attempt failed"
                    );
                }
            }

            attempt += 1;
            if attempt > inner.config.max_retry_count {
                inner.metrics.inc_transfer_task_processing_failed();
                error!(
                    cluster = %inner.cluster_name,
                    task_id = task.task_id,
                    task_type = ?task.task_type,
                    attempts = attempt,
                    "transfer task processing failed, dropping task"
                );
                inner.ack.complete(task.task_id);
                return;
            }
            if !inner.running.load(Ordering::Acquire) {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(inner.config.retry_backoff) => {}
                _ = inner.shutdown.notified() => return,
            }
        }
    }

    async fn process_once(
        inner: &Arc<Inner>,
        task: &TransferTask,
    ) -> Result<HandlerOutcome, ProcessError> {
        let verified = inner
            .allocator
            .verify_standby_task(&inner.cluster_name, &task.domain_id, task)
            .await?;
        if !verified {
            return Ok(HandlerOutcome::Done);
        }
        inner.executor.execute(task).await
    }

    async fn run_ack_updater(inner: Arc<Inner>) {
        let mut last_persisted = inner.ack.ack_level();
        loop {
            let wait = jittered(
                inner.config.update_ack_interval,
                inner.config.update_ack_interval_jitter_coefficient,
            );
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_persisted = Self::persist_ack_level(&inner, last_persisted).await;
                }
                _ = inner.shutdown.notified() => {
                    // One final update so a restart resumes near the frontier.
                    Self::persist_ack_level(&inner, last_persisted).await;
                    break;
                }
            }
            if !inner.running.load(Ordering::Acquire) {
                break;
            }
        }
    }

    async fn persist_ack_level(inner: &Arc<Inner>, last_persisted: i64) -> i64 {
        let level = inner.ack.advance_ack_level();
        if level > last_persisted {
            match inner
                .shard
                .update_transfer_cluster_ack_level(&inner.cluster_name, level)
                .await
            {
                Ok(()) => {
                    debug!(cluster = %inner.cluster_name, level, "cluster ack level updated");
                    return level;
                }
                Err(err) => {
                    error!(
                        cluster = %inner.cluster_name,
                        level,
                        error = %err,
                        "cluster ack level update failed"
                    );
                }
            }
        }
        last_persisted
    }
}
