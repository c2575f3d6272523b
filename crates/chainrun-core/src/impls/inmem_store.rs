//! InMemoryJobStore - 開発・テスト用の JobStore
//!
//! # 実装詳細
//! - HashMap<JobRunId, JobRun> を tokio の Mutex で保護
//! - `save()` は clone を保存するので、呼び出し側の変更は反映されない

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{JobRun, JobRunId, RunStatus};
use crate::ports::{JobStore, StoreError};

#[derive(Default)]
pub struct InMemoryJobStore {
    runs: Mutex<HashMap<JobRunId, JobRun>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, run: &JobRun) -> Result<(), StoreError> {
        self.runs.lock().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn load(&self, id: JobRunId) -> Result<JobRun, StoreError> {
        self.runs
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_non_terminal(&self) -> Result<Vec<JobRun>, StoreError> {
        let runs = self.runs.lock().await;
        Ok(runs.values().filter(|r| !r.is_terminal()).cloned().collect())
    }

    async fn find_by_status(&self, statuses: &[RunStatus]) -> Result<Vec<JobRun>, StoreError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: JobRunId) -> Result<(), StoreError> {
        self.runs.lock().await.remove(&id);
        Ok(())
    }
}
