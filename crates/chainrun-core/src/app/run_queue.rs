//! RunQueue - RunRequest の有界キュー
//!
//! # 学習ポイント
//! - tokio の mpsc は単一 consumer なので、Receiver を Mutex で包んで
//!   複数ワーカーで共有する
//! - 満杯時の `enqueue()` は空きが出るまで待つ（バックプレッシャー）
//!   リクエストを黙って捨てることはしない

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::domain::{JobRunId, RunRequest, RunResult};
use crate::error::{ChainrunError, Result};

/// Create a queue holding at most `capacity` requests.
///
/// # Panics
/// If `capacity` is zero (tokio rejects empty channels). `RunnerBuilder`
/// validates this before calling.
pub fn run_queue(capacity: usize) -> (RunQueue, RunQueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        RunQueue { tx },
        RunQueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side. Cheap to clone; every producer holds its own copy.
#[derive(Clone, Debug)]
pub struct RunQueue {
    tx: mpsc::Sender<RunRequest>,
}

impl RunQueue {
    /// Ask for `job_run_id` to be (re)executed, waiting while the queue is full.
    pub async fn enqueue(&self, job_run_id: JobRunId, input: Option<RunResult>) -> Result<()> {
        self.send(RunRequest { job_run_id, input }).await
    }

    pub async fn send(&self, request: RunRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ChainrunError::QueueClosed)
    }

    /// Non-blocking variant. Returns the request back when the queue is full.
    pub fn try_send(&self, request: RunRequest) -> std::result::Result<(), TrySendError> {
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(r) => TrySendError::Full(r),
            mpsc::error::TrySendError::Closed(r) => TrySendError::Closed(r),
        })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Requests currently waiting.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrySendError {
    #[error("run queue is full")]
    Full(RunRequest),

    #[error("run queue is closed")]
    Closed(RunRequest),
}

/// Consumer side, shared by all workers.
#[derive(Clone, Debug)]
pub struct RunQueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<RunRequest>>>,
}

impl RunQueueReceiver {
    /// Wait for the next request. `None` once every producer is gone.
    ///
    /// Cancel safe: dropping the future never loses a request.
    pub async fn dequeue(&self) -> Option<RunRequest> {
        self.rx.lock().await.recv().await
    }

    /// Take a request if one is ready right now.
    pub async fn try_dequeue(&self) -> Option<RunRequest> {
        self.rx.lock().await.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order() {
        let (queue, rx) = run_queue(4);
        let a = JobRunId::random();
        let b = JobRunId::random();
        queue.enqueue(a, None).await.unwrap();
        queue.enqueue(b, None).await.unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(rx.dequeue().await.unwrap().job_run_id, a);
        assert_eq!(rx.dequeue().await.unwrap().job_run_id, b);
        assert!(rx.try_dequeue().await.is_none());
    }

    #[tokio::test]
    async fn full_queue_blocks_instead_of_dropping() {
        let (queue, rx) = run_queue(1);
        let first = JobRunId::random();
        let second = JobRunId::random();
        queue.enqueue(first, None).await.unwrap();

        assert!(matches!(
            queue.try_send(RunRequest::resume(second)),
            Err(TrySendError::Full(_))
        ));

        let producer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(second, None).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());

        assert_eq!(rx.dequeue().await.unwrap().job_run_id, first);
        producer.await.unwrap().unwrap();
        assert_eq!(rx.dequeue().await.unwrap().job_run_id, second);
    }

    #[tokio::test]
    async fn enqueue_fails_once_receiver_is_gone() {
        let (queue, rx) = run_queue(1);
        drop(rx);
        let err = queue.enqueue(JobRunId::random(), None).await.unwrap_err();
        assert!(matches!(err, ChainrunError::QueueClosed));
    }

    #[tokio::test]
    async fn receiver_is_shared_between_consumers() {
        let (queue, rx) = run_queue(8);
        for _ in 0..4 {
            queue.enqueue(JobRunId::random(), None).await.unwrap();
        }
        let rx2 = rx.clone();
        let mut seen = 0;
        for consumer in [&rx, &rx2, &rx, &rx2] {
            assert!(consumer.dequeue().await.is_some());
            seen += 1;
        }
        assert_eq!(seen, 4);
    }
}
