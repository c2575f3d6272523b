//! JobRunner - 実行コアの入口
//!
//! RunQueue・WorkerPool・Executor・Resumer を束ね、run の作成／削除と
//! ライフサイクル（start / shutdown）を提供します。`RunnerBuilder` で作ります。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapters::AdapterRegistry;
use crate::app::active_runs::ActiveRuns;
use crate::app::builder::RunnerConfig;
use crate::app::context::{Continuations, Services};
use crate::app::executor::RunExecutor;
use crate::app::resumer::{self, PendingConnectionResumer};
use crate::app::run_queue::{RunQueue, RunQueueReceiver, run_queue};
use crate::app::worker_pool::WorkerPool;
use crate::domain::{JobRun, JobRunId, JobSpec, RunResult};
use crate::error::{ChainrunError, Result};
use crate::ports::{Clock, IdGenerator, JobStore};

pub struct JobRunner {
    config: RunnerConfig,
    store: Arc<dyn JobStore>,
    registry: Arc<AdapterRegistry>,
    ids: Arc<dyn IdGenerator>,
    services: Services,
    receiver: RunQueueReceiver,
    active: Arc<ActiveRuns>,
    executor: Arc<RunExecutor>,
    workers: Mutex<Option<WorkerPool>>,
}

impl JobRunner {
    pub(crate) fn new(
        config: RunnerConfig,
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        registry: AdapterRegistry,
    ) -> Self {
        let (queue, receiver) = run_queue(config.queue_capacity);
        let services = Services::new(queue, clock);
        let registry = Arc::new(registry);
        let executor = Arc::new(RunExecutor::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            services.clone(),
        ));
        Self {
            config,
            store,
            registry,
            ids,
            services,
            receiver,
            active: Arc::new(ActiveRuns::new()),
            executor,
            workers: Mutex::new(None),
        }
    }

    /// Spawn the workers, then enqueue every run left unfinished by the
    /// previous process. Returns the number of resumed runs.
    ///
    /// Calling it again while running only repeats the resume scan.
    pub async fn start(&self) -> Result<usize> {
        {
            let mut workers = self.workers.lock().await;
            if workers.is_none() {
                *workers = Some(WorkerPool::spawn(
                    self.config.worker_count,
                    self.receiver.clone(),
                    Arc::clone(&self.executor),
                    Arc::clone(&self.active),
                ));
            }
        }
        resumer::resume_runs_since_last_shutdown(self.store.as_ref(), &self.services.queue).await
    }

    /// Stop the workers and wait for in-flight steps to finish.
    ///
    /// Pending continuations are dropped; the startup resume of the next
    /// `start()` picks their runs up again.
    pub async fn shutdown(&self) {
        let pool = self.workers.lock().await.take();
        if let Some(pool) = pool {
            pool.shutdown_and_join().await;
        }
        self.services.continuations.cancel_all();
    }

    pub async fn is_running(&self) -> bool {
        self.workers.lock().await.is_some()
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Producer handle for external triggers.
    pub fn queue(&self) -> &RunQueue {
        &self.services.queue
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn continuations(&self) -> &Arc<Continuations> {
        &self.services.continuations
    }

    /// Listener to attach to the head tracker.
    pub fn connection_resumer(&self) -> Arc<PendingConnectionResumer> {
        Arc::new(PendingConnectionResumer::new(
            Arc::clone(&self.store),
            self.services.queue.clone(),
        ))
    }

    /// Create, persist and enqueue a run of `spec` with `input` as the
    /// first step's input value.
    pub async fn create_run(&self, spec: &JobSpec, input: serde_json::Value) -> Result<JobRunId> {
        if let Some(task) = spec
            .tasks
            .iter()
            .find(|t| !self.registry.contains(&t.adapter))
        {
            return Err(ChainrunError::AdapterNotFound(task.adapter.clone()));
        }

        let id = self.ids.generate_job_run_id();
        let run = JobRun::new(
            id,
            spec,
            std::iter::repeat_with(|| self.ids.generate_task_run_id()),
            RunResult::new(id, input),
            self.services.clock.now(),
        );
        self.store.save(&run).await?;
        tracing::info!(job_run_id = %id, steps = run.task_runs.len(), "run created");

        self.services.queue.enqueue(id, None).await?;
        Ok(id)
    }

    /// Re-trigger a run, optionally replacing the input of the step it
    /// resumes at.
    pub async fn resume_run(&self, id: JobRunId, input: Option<RunResult>) -> Result<()> {
        self.services.queue.enqueue(id, input).await
    }

    pub async fn load_run(&self, id: JobRunId) -> Result<JobRun> {
        Ok(self.store.load(id).await?)
    }

    /// Delete a run and its pending continuation.
    ///
    /// Fails with `RunBusy` while a worker is executing it.
    pub async fn delete_run(&self, id: JobRunId) -> Result<()> {
        if !self.active.try_acquire(id) {
            return Err(ChainrunError::RunBusy(id));
        }
        self.services.continuations.cancel(id);
        let deleted = self.store.delete(id).await;
        // requests deferred meanwhile target a deleted run
        self.active.remove(id);
        deleted?;
        tracing::info!(job_run_id = %id, "run deleted");
        Ok(())
    }
}
