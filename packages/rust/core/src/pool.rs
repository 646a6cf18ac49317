//! Bounded worker pool for attachment tasks.
//!
//! One producer feeds a bounded MPMC queue; `workers` tasks drain it until it
//! is closed and empty. [`WorkerPool::finish`] is the completion barrier: it
//! closes the queue and waits for every worker to exit.

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lawwatch_shared::{AttachmentTask, Result, ScanConfig};

/// Per-task work performed by each worker.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Process one task. `Ok(true)` means it produced a match.
    async fn handle(&self, task: &AttachmentTask) -> Result<bool>;
}

/// Sizing and pacing for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Sleep after each processed task, per worker.
    pub pacing: Duration,
}

impl From<&ScanConfig> for PoolConfig {
    fn from(config: &ScanConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            pacing: config.pacing,
        }
    }
}

/// Aggregate outcome once every worker has exited.
#[derive(Debug, Default)]
pub struct PoolReport {
    /// Tasks handled successfully, matched or not.
    pub processed: usize,
    /// Tasks that produced a match.
    pub matched: usize,
    /// Tasks that failed transiently and are worth another attempt.
    pub failed: Vec<AttachmentTask>,
    /// Tasks that failed permanently.
    pub rejected: usize,
    /// Tasks still queued when the pool was cancelled.
    pub unprocessed: Vec<AttachmentTask>,
}

#[derive(Debug, Default)]
struct WorkerReport {
    processed: usize,
    matched: usize,
    failed: Vec<AttachmentTask>,
    rejected: usize,
}

pub struct WorkerPool {
    tx: Sender<AttachmentTask>,
    rx: Receiver<AttachmentTask>,
    handles: Vec<JoinHandle<WorkerReport>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Start `config.workers` workers (at least one) sharing `handler`.
    pub fn spawn<H: TaskHandler>(
        config: PoolConfig,
        handler: Arc<H>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = async_channel::bounded(config.queue_capacity.max(1));
        let workers = config.workers.max(1);

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    rx.clone(),
                    handler.clone(),
                    config.pacing,
                    cancel.clone(),
                ))
            })
            .collect();

        debug!(workers, capacity = config.queue_capacity, "worker pool started");
        Self {
            tx,
            rx,
            handles,
            cancel,
        }
    }

    /// Enqueue `task`, waiting while the queue is full.
    ///
    /// Hands the task back if the pool is cancelled before it was queued.
    pub async fn submit(&self, task: AttachmentTask) -> std::result::Result<(), AttachmentTask> {
        if self.cancel.is_cancelled() {
            return Err(task);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(task),
            sent = self.tx.send(task.clone()) => sent.map_err(|e| e.into_inner()),
        }
    }

    /// Close the queue and wait for every worker to exit.
    pub async fn finish(self) -> PoolReport {
        self.tx.close();

        let mut report = PoolReport::default();
        for handle in self.handles {
            match handle.await {
                Ok(worker) => {
                    report.processed += worker.processed;
                    report.matched += worker.matched;
                    report.failed.extend(worker.failed);
                    report.rejected += worker.rejected;
                }
                Err(e) => error!(error = %e, "worker task failed"),
            }
        }

        // Only non-empty after cancellation: workers drain everything otherwise.
        while let Ok(task) = self.rx.try_recv() {
            report.unprocessed.push(task);
        }

        info!(
            processed = report.processed,
            matched = report.matched,
            failed = report.failed.len(),
            rejected = report.rejected,
            unprocessed = report.unprocessed.len(),
            "worker pool finished"
        );
        report
    }
}

async fn worker_loop<H: TaskHandler>(
    id: usize,
    rx: Receiver<AttachmentTask>,
    handler: Arc<H>,
    pacing: Duration,
    cancel: CancellationToken,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Ok(task) => task,
                Err(_) => break,
            },
        };

        // A panic inside the handler is confined to its own task so the
        // worker keeps draining the queue.
        let outcome = {
            let handler = handler.clone();
            let job = task.clone();
            tokio::spawn(async move { handler.handle(&job).await }).await
        };

        match outcome {
            Ok(Ok(matched)) => {
                report.processed += 1;
                if matched {
                    report.matched += 1;
                }
            }
            Ok(Err(e)) if e.is_transient() => {
                warn!(worker = id, url = %task.file_url, error = %e, "attachment failed, will retry next cycle");
                report.failed.push(task);
            }
            Ok(Err(e)) => {
                warn!(worker = id, url = %task.file_url, error = %e, "attachment skipped");
                report.rejected += 1;
            }
            Err(e) => {
                error!(worker = id, url = %task.file_url, error = %e, "attachment handler panicked");
                report.rejected += 1;
            }
        }

        if !pacing.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pacing) => {}
            }
        }
    }

    debug!(worker = id, processed = report.processed, "worker exited");
    report
}
