//! RunExecutor - JobRun の実行プロトコル（状態機械）
//!
//! 1 回の `execute()` で、永続化された状態から次の未完了ステップを
//! 順に実行し、Completed / Errored / Pending* のいずれかで止まります。
//!
//! # 永続化
//! - ステップ開始時（InProgress）と結果記録時の両方で `save()` する
//! - `save()` の失敗は `Err` で返し、そのステップは確定扱いしない
//!   （メモリ上の JobRun は捨て、次回は保存済みの状態から再開）
//!
//! # 前提
//! 呼び出し側（WorkerPool）がその run の実行登録を持っていること。

use std::sync::Arc;

use crate::adapters::AdapterRegistry;
use crate::app::context::Services;
use crate::domain::{JobRun, RunRequest, RunResult, RunStatus, TaskSpec};
use crate::error::{ChainrunError, Result};
use crate::ports::{Clock, JobStore, StoreError};

pub struct RunExecutor {
    store: Arc<dyn JobStore>,
    registry: Arc<AdapterRegistry>,
    services: Services,
}

impl RunExecutor {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<AdapterRegistry>, services: Services) -> Self {
        Self {
            store,
            registry,
            services,
        }
    }

    /// Execute `request`'s run from its next unfinished step.
    ///
    /// Returns the status the run was left in, or `None` if the run no
    /// longer exists. Terminal runs are left untouched.
    pub async fn execute(&self, request: RunRequest) -> Result<Option<RunStatus>> {
        let id = request.job_run_id;
        let mut run = match self.store.load(id).await {
            Ok(run) => run,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(job_run_id = %id, "run no longer exists");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if run.is_terminal() {
            tracing::debug!(job_run_id = %id, status = ?run.status, "run already finished");
            self.services.continuations.cancel(id);
            return Ok(Some(run.status));
        }

        let mut override_input = request.input;
        loop {
            let Some(index) = run.next_task_index() else {
                // no steps configured, or every step already completed
                run.mark_completed(self.services.clock.now());
                self.store.save(&run).await?;
                break;
            };

            let input = match override_input.take() {
                Some(input) => RunResult {
                    job_run_id: run.id,
                    ..input
                },
                None => run.input_for(index),
            }
            .with_status(RunStatus::InProgress);

            run.start_task(index, input.clone());
            self.store.save(&run).await?;

            let task = run.task_runs[index].task.clone();
            let output = self.perform(&run, &task, &input).await;
            tracing::debug!(
                job_run_id = %id,
                step = index,
                adapter = %task.adapter,
                status = ?output.status,
                "step finished"
            );

            run.record_output(index, output, self.services.clock.now());
            self.store.save(&run).await?;

            if run.status != RunStatus::InProgress {
                break;
            }
        }

        match run.status {
            RunStatus::Completed => {
                tracing::info!(job_run_id = %id, "run completed");
                self.services.continuations.cancel(id);
            }
            RunStatus::Errored => {
                let error = run.last_output().and_then(|o| o.error.clone());
                tracing::warn!(job_run_id = %id, error = ?error, "run errored");
                self.services.continuations.cancel(id);
            }
            status => {
                tracing::debug!(job_run_id = %id, status = ?status, "run suspended");
            }
        }
        Ok(Some(run.status))
    }

    async fn perform(&self, run: &JobRun, task: &TaskSpec, input: &RunResult) -> RunResult {
        let Some(adapter) = self.registry.get(&task.adapter) else {
            return input.errored(ChainrunError::AdapterNotFound(task.adapter.clone()).to_string());
        };
        let ctx = self.services.context_for(run.id);
        adapter.perform_dyn(&task.params, input, &ctx).await
    }
}
