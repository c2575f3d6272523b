//! ExecutionContext - アダプターに渡す実行コンテキスト
//!
//! グローバルなキューや時計は持たず、必要なものをすべてここから注入します。
//!
//! # Continuations
//! 中断したアダプターが「あとで再開してほしい」ときに使う予約タスク。
//! run ごとに生きている予約は最大 1 つで、新しく予約すると古いものは
//! abort されます。run が終端状態になったときや削除されたときにも
//! キャンセルされます。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::app::run_queue::RunQueue;
use crate::domain::JobRunId;
use crate::ports::{Clock, Timer};

/// Scheduled reactivations, at most one per run.
#[derive(Default)]
pub struct Continuations {
    generation: AtomicU64,
    handles: Mutex<HashMap<JobRunId, (u64, JoinHandle<()>)>>,
}

impl Continuations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a resume request for `id` once `timer` fires, replacing any
    /// continuation already scheduled for it.
    pub fn schedule(self: &Arc<Self>, id: JobRunId, timer: Timer, queue: RunQueue) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);

        // held across spawn so the task cannot forget itself before it is recorded
        let mut handles = self.lock();
        let handle = tokio::spawn(async move {
            timer.await;
            this.forget(id, generation);
            tracing::debug!(job_run_id = %id, "continuation fired");
            if let Err(e) = queue.enqueue(id, None).await {
                tracing::warn!(job_run_id = %id, error = %e, "continuation could not enqueue");
            }
        });
        if let Some((_, previous)) = handles.insert(id, (generation, handle)) {
            previous.abort();
        }
    }

    /// Abort the continuation of `id`, if any. Returns whether one existed.
    pub fn cancel(&self, id: JobRunId) -> bool {
        match self.lock().remove(&id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, (_, handle)) in self.lock().drain() {
            handle.abort();
        }
    }

    pub fn is_scheduled(&self, id: JobRunId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of continuations that have not fired yet.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn forget(&self, id: JobRunId, generation: u64) {
        let mut handles = self.lock();
        if handles.get(&id).is_some_and(|(g, _)| *g == generation) {
            handles.remove(&id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobRunId, (u64, JoinHandle<()>)>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared services handed to every step. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub queue: RunQueue,
    pub clock: Arc<dyn Clock>,
    pub continuations: Arc<Continuations>,
}

impl Services {
    pub fn new(queue: RunQueue, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            clock,
            continuations: Arc::new(Continuations::new()),
        }
    }

    /// Context for one step of `job_run_id`.
    pub fn context_for(&self, job_run_id: JobRunId) -> ExecutionContext {
        ExecutionContext {
            job_run_id,
            services: self.clone(),
        }
    }
}

/// What an adapter sees of the runtime while performing one step.
#[derive(Clone)]
pub struct ExecutionContext {
    job_run_id: JobRunId,
    services: Services,
}

impl ExecutionContext {
    /// The run this step belongs to.
    pub fn job_run_id(&self) -> JobRunId {
        self.job_run_id
    }

    pub fn queue(&self) -> &RunQueue {
        &self.services.queue
    }

    pub fn clock(&self) -> &dyn Clock {
        self.services.clock.as_ref()
    }

    /// Schedule this run to be re-enqueued after `duration`.
    ///
    /// Returns immediately; calling it again replaces the earlier schedule.
    pub fn resume_after(&self, duration: Duration) {
        let timer = self.services.clock.after(duration);
        self.services
            .continuations
            .schedule(self.job_run_id, timer, self.services.queue.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::run_queue::run_queue;
    use crate::ports::ManualClock;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn resume_after_enqueues_once_the_timer_fires() {
        let (queue, rx) = run_queue(4);
        let clock = Arc::new(ManualClock::default());
        let services = Services::new(queue, clock.clone());
        let id = JobRunId::random();

        services.context_for(id).resume_after(Duration::from_secs(30));
        settle().await;
        assert!(rx.try_dequeue().await.is_none());
        assert!(services.continuations.is_scheduled(id));

        clock.advance(Duration::from_secs(30));
        let req = tokio::time::timeout(Duration::from_secs(1), rx.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.job_run_id, id);
        assert_eq!(req.input, None);

        settle().await;
        assert!(rx.try_dequeue().await.is_none());
        assert!(services.continuations.is_empty());
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_previous_continuation() {
        let (queue, rx) = run_queue(4);
        let clock = Arc::new(ManualClock::default());
        let services = Services::new(queue, clock.clone());
        let ctx = services.context_for(JobRunId::random());

        ctx.resume_after(Duration::from_secs(10));
        ctx.resume_after(Duration::from_secs(10));
        assert_eq!(services.continuations.len(), 1);

        clock.advance(Duration::from_secs(10));
        assert!(tokio::time::timeout(Duration::from_secs(1), rx.dequeue()).await.unwrap().is_some());
        settle().await;
        assert!(rx.try_dequeue().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_continuation_never_enqueues() {
        let (queue, rx) = run_queue(4);
        let clock = Arc::new(ManualClock::default());
        let services = Services::new(queue, clock.clone());
        let id = JobRunId::random();

        services.context_for(id).resume_after(Duration::from_secs(5));
        assert!(services.continuations.cancel(id));
        assert!(!services.continuations.cancel(id));

        clock.advance(Duration::from_secs(5));
        settle().await;
        assert!(rx.try_dequeue().await.is_none());
    }
}
