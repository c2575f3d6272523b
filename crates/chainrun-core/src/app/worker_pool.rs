//! WorkerPool - RunQueue を消費する固定数のワーカー
//!
//! # 学習ポイント
//! - shutdown は `watch` チャネルで全ワーカーに通知する
//! - `dequeue()` は待つ可能性があるので `select!` で shutdown と競合させる
//! - 実行前に ActiveRuns で登録し、同じ run を 2 つのワーカーが同時に
//!   実行しないようにする

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::active_runs::{ActiveRuns, Claim, Release};
use crate::app::executor::RunExecutor;
use crate::app::run_queue::RunQueueReceiver;
use crate::domain::RunRequest;

/// Worker pool handle.
/// - `request_shutdown()` で新しいリクエストの受け取りを止める
/// - 実行中のステップは強制キャンセルしない
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers draining `receiver`.
    pub fn spawn(
        n: usize,
        receiver: RunQueueReceiver,
        executor: Arc<RunExecutor>,
        active: Arc<ActiveRuns>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let rx = receiver.clone();
            let executor = Arc::clone(&executor);
            let active = Arc::clone(&active);
            let mut shutdown = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, rx, executor, active, &mut shutdown).await;
            });
            joins.push(join);
        }

        tracing::info!(workers = n, "worker pool started");
        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every worker to stop after its current run.
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker task failed");
            }
        }
        tracing::info!("worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: RunQueueReceiver,
    executor: Arc<RunExecutor>,
    active: Arc<ActiveRuns>,
    shutdown: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let request = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            request = rx.dequeue() => request,
        };

        let Some(request) = request else {
            tracing::debug!(worker_id, "run queue closed");
            break;
        };

        process(worker_id, &executor, &active, request).await;
    }
}

/// Execute one request, then any request deferred while it ran.
async fn process(worker_id: usize, executor: &RunExecutor, active: &ActiveRuns, request: RunRequest) {
    let id = request.job_run_id;
    if active.claim(&request) == Claim::Deferred {
        tracing::debug!(worker_id, job_run_id = %id, "run is held by another worker, deferred");
        return;
    }

    let mut input = request.input;
    loop {
        let request = RunRequest {
            job_run_id: id,
            input,
        };
        match executor.execute(request).await {
            Ok(status) => {
                tracing::debug!(worker_id, job_run_id = %id, status = ?status, "execution finished");
            }
            Err(e) => {
                // nothing past the last successful save is committed
                tracing::error!(worker_id, job_run_id = %id, error = %e, "execution failed");
            }
        }

        match active.release(id) {
            Release::Done => break,
            Release::Again(next) => input = next,
        }
    }
}
