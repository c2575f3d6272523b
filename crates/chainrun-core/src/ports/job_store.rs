//! JobStore port - JobRun の永続化
//!
//! JobRun の正本（source of truth）。Executor はステップ遷移ごとに `save()`
//! し、Resumer は `find_non_terminal()` / `find_by_status()` で再開対象を探す。
//!
//! # 実装
//! - **InMemoryJobStore**: テスト・開発用
//! - **JsonFileStore**: 1 run = 1 JSON ファイル（再起動をまたいで残る）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{JobRun, JobRunId, RunStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(JobRunId),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// JobStore は JobRun の保存と検索を提供
///
/// # 設計原則
/// - `save()` が `Ok` を返した時点でその状態は確定（commit 済み）
/// - `save()` が失敗したら呼び出し側はその遷移を確定扱いしない
/// - 検索結果の順序は規定しない
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite a run.
    async fn save(&self, run: &JobRun) -> Result<(), StoreError>;

    async fn load(&self, id: JobRunId) -> Result<JobRun, StoreError>;

    /// Every run whose status is not Completed or Errored.
    async fn find_non_terminal(&self) -> Result<Vec<JobRun>, StoreError>;

    /// Every run whose status is one of `statuses`.
    async fn find_by_status(&self, statuses: &[RunStatus]) -> Result<Vec<JobRun>, StoreError>;

    /// Remove a run. Deleting a missing run is not an error.
    async fn delete(&self, id: JobRunId) -> Result<(), StoreError>;
}
