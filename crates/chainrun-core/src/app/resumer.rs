//! Resumers - 中断された run の再投入
//!
//! - **起動時**: 前回終了時に終わっていなかった run（InProgress / Pending*）を
//!   すべて再投入する
//! - **接続・ヘッド通知時**: PendingConnection / PendingConfirmations の
//!   run を再投入する
//!
//! どちらも実行中の run を再投入してよい（ActiveRuns が直列化する）。
//! 互いの排他は前提にしない。

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::run_queue::RunQueue;
use crate::domain::{JobRun, RunStatus};
use crate::error::Result;
use crate::ports::{Head, HeadTrackable, JobStore};

/// Enqueue every non-terminal run. Returns how many were enqueued.
pub async fn resume_runs_since_last_shutdown(store: &dyn JobStore, queue: &RunQueue) -> Result<usize> {
    let runs = store.find_non_terminal().await?;
    let count = enqueue_all(runs, queue).await?;
    tracing::info!(count, "resumed runs since last shutdown");
    Ok(count)
}

async fn enqueue_all(runs: Vec<JobRun>, queue: &RunQueue) -> Result<usize> {
    let mut count = 0;
    for run in runs.into_iter().filter(|r| !r.is_terminal()) {
        queue.enqueue(run.id, None).await?;
        count += 1;
    }
    Ok(count)
}

/// Re-drives runs waiting on the chain whenever the head tracker reports a
/// connection or a new head.
pub struct PendingConnectionResumer {
    store: Arc<dyn JobStore>,
    queue: RunQueue,
}

impl PendingConnectionResumer {
    pub fn new(store: Arc<dyn JobStore>, queue: RunQueue) -> Self {
        Self { store, queue }
    }

    /// Enqueue every run in an awaiting-chain status.
    pub async fn resume_pending(&self) -> Result<usize> {
        let runs = self.store.find_by_status(&RunStatus::AWAITING_CHAIN).await?;
        enqueue_all(runs, &self.queue).await
    }

    async fn resume_logged(&self, trigger: &'static str) {
        match self.resume_pending().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(trigger, count, "resumed runs awaiting the chain"),
            Err(e) => tracing::error!(trigger, error = %e, "could not resume runs awaiting the chain"),
        }
    }
}

#[async_trait]
impl HeadTrackable for PendingConnectionResumer {
    async fn connect(&self, _head: Option<&Head>) {
        self.resume_logged("connect").await;
    }

    async fn disconnect(&self) {}

    async fn on_new_head(&self, _head: &Head) {
        self.resume_logged("new_head").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::run_queue::{RunQueueReceiver, run_queue};
    use crate::domain::{JobRunId, JobSpec, RunResult, TaskRunId, TaskSpec};
    use crate::impls::InMemoryJobStore;
    use chrono::Utc;
    use rstest::rstest;
    use std::collections::HashSet;

    async fn store_with(statuses: &[RunStatus]) -> (Arc<InMemoryJobStore>, Vec<JobRunId>) {
        let store = Arc::new(InMemoryJobStore::new());
        let mut ids = Vec::new();
        for status in statuses {
            let id = JobRunId::random();
            let mut run = JobRun::new(
                id,
                &JobSpec::new(vec![TaskSpec::bare("noop")]),
                std::iter::repeat_with(TaskRunId::random),
                RunResult::new(id, serde_json::Value::Null),
                Utc::now(),
            );
            run.status = *status;
            store.save(&run).await.unwrap();
            ids.push(id);
        }
        (store, ids)
    }

    async fn drain(rx: &RunQueueReceiver) -> HashSet<JobRunId> {
        let mut seen = HashSet::new();
        while let Some(req) = rx.try_dequeue().await {
            seen.insert(req.job_run_id);
        }
        seen
    }

    #[tokio::test]
    async fn startup_resumes_only_unfinished_runs() {
        let (store, ids) = store_with(&[
            RunStatus::InProgress,
            RunStatus::PendingSleep,
            RunStatus::Completed,
            RunStatus::Errored,
        ])
        .await;
        let (queue, rx) = run_queue(8);

        let count = resume_runs_since_last_shutdown(store.as_ref(), &queue).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(drain(&rx).await, HashSet::from([ids[0], ids[1]]));
    }

    #[tokio::test]
    async fn empty_store_is_a_no_op() {
        let (store, _) = store_with(&[]).await;
        let (queue, rx) = run_queue(1);
        assert_eq!(resume_runs_since_last_shutdown(store.as_ref(), &queue).await.unwrap(), 0);
        assert!(drain(&rx).await.is_empty());
    }

    #[rstest]
    #[case::connect("connect")]
    #[case::new_head("new_head")]
    #[tokio::test]
    async fn chain_events_resume_runs_awaiting_the_chain(#[case] event: &str) {
        let (store, ids) = store_with(&[
            RunStatus::PendingConnection,
            RunStatus::PendingConfirmations,
            RunStatus::PendingSleep,
            RunStatus::InProgress,
            RunStatus::Completed,
        ])
        .await;
        let (queue, rx) = run_queue(8);
        let resumer = PendingConnectionResumer::new(store, queue);

        let head = Head::new(7, "0x07");
        match event {
            "connect" => resumer.connect(Some(&head)).await,
            _ => resumer.on_new_head(&head).await,
        }

        assert_eq!(drain(&rx).await, HashSet::from([ids[0], ids[1]]));
    }

    #[tokio::test]
    async fn disconnect_enqueues_nothing() {
        let (store, _) = store_with(&[RunStatus::PendingConnection]).await;
        let (queue, rx) = run_queue(8);
        let resumer = PendingConnectionResumer::new(store, queue);

        resumer.disconnect().await;
        assert!(drain(&rx).await.is_empty());
    }
}
