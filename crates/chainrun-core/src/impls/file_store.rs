//! JsonFileStore - ファイルベースの JobStore
//!
//! 1 つの JobRun を `<dir>/<ulid>.json` に保存します。
//! 書き込みは一時ファイル + rename なので、途中でプロセスが落ちても
//! 古い内容か新しい内容のどちらかが残ります。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::{JobRun, JobRunId, RunStatus};
use crate::ports::{JobStore, StoreError};

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: JobRunId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_ulid()))
    }

    async fn read_all(&self) -> Result<Vec<JobRun>, StoreError> {
        let mut runs = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<JobRun>(&bytes) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable run file");
                }
            }
        }
        Ok(runs)
    }
}

#[async_trait]
impl JobStore for JsonFileStore {
    async fn save(&self, run: &JobRun) -> Result<(), StoreError> {
        let path = self.path_for(run.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(run)?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, id: JobRunId) -> Result<JobRun, StoreError> {
        match fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_non_terminal(&self) -> Result<Vec<JobRun>, StoreError> {
        let mut runs = self.read_all().await?;
        runs.retain(|r| !r.is_terminal());
        Ok(runs)
    }

    async fn find_by_status(&self, statuses: &[RunStatus]) -> Result<Vec<JobRun>, StoreError> {
        let mut runs = self.read_all().await?;
        runs.retain(|r| statuses.contains(&r.status));
        Ok(runs)
    }

    async fn delete(&self, id: JobRunId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
