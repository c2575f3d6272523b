//! RunnerBuilder - JobRunner の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use crate::adapters::{Adapter, AdapterParams, AdapterRegistry, RegistryError};
use crate::app::runner::JobRunner;
use crate::impls::InMemoryJobStore;
use crate::ports::{Clock, IdGenerator, JobStore, SystemClock, UlidGenerator};

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,

    /// Maximum number of queued run requests before producers block.
    pub queue_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1000,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.worker_count == 0 {
            return Err(BuildError::InvalidWorkerCount);
        }
        if self.queue_capacity == 0 {
            return Err(BuildError::InvalidQueueCapacity);
        }
        Ok(())
    }
}

/// BuildError は Runner 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("worker_count must be at least 1")]
    InvalidWorkerCount,

    #[error("queue_capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("Missing adapters: {0:?}. These adapters were expected but not registered.")]
    MissingAdapters(Vec<String>),
}

/// RunnerBuilder は JobRunner を構築
///
/// # 使用例
/// ```ignore
/// let runner = RunnerBuilder::new()
///     .store(Arc::new(JsonFileStore::open("./runs")?))
///     .register::<MyParams, _>(MyAdapter)?
///     .expect_adapters(&["sleep", "my_adapter"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - 設定値（worker_count, queue_capacity）を build() 時に検証
/// - expect_adapters() で期待されるアダプターがすべて登録済みかチェック
///
/// store / clock を指定しなければ InMemoryJobStore / SystemClock を使います。
/// 組み込みアダプター（sleep, ethbool, noop, noop_pend）は最初から登録済みです。
pub struct RunnerBuilder {
    config: RunnerConfig,
    store: Option<Arc<dyn JobStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    registry: AdapterRegistry,
    expected_adapters: Option<Vec<String>>,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            store: None,
            clock: None,
            ids: None,
            registry: AdapterRegistry::with_builtins(),
            expected_adapters: None,
        }
    }

    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.config.queue_capacity = n;
        self
    }

    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a `UlidGenerator` on the runner's clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replace the whole registry, built-ins included.
    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adapter を登録
    ///
    /// # Example
    /// ```ignore
    /// builder.register::<MyParams, _>(MyAdapter)?;
    /// ```
    pub fn register<P: AdapterParams, A: Adapter<P> + 'static>(
        mut self,
        adapter: A,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<P, A>(adapter)?;
        Ok(self)
    }

    /// 期待される adapter 名のリストを設定
    pub fn expect_adapters(mut self, adapter_types: &[&str]) -> Self {
        self.expected_adapters = Some(adapter_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// # 検証
    /// - RunnerConfig::validate()
    /// - expect_adapters() で設定された adapter が全て登録されているか
    pub fn build(self) -> Result<JobRunner, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_adapters {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.registry.contains(t.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingAdapters(missing));
            }
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        Ok(JobRunner::new(self.config, store, clock, ids, self.registry))
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NoOpParams;
    use rstest::rstest;

    #[test]
    fn build_with_defaults() {
        let runner = RunnerBuilder::new().build().unwrap();
        assert_eq!(runner.worker_count(), 4);
        assert_eq!(runner.queue().capacity(), 1000);
    }

    #[rstest]
    #[case::no_workers(0, 10)]
    #[case::no_capacity(2, 0)]
    fn build_rejects_invalid_config(#[case] workers: usize, #[case] capacity: usize) {
        let result = RunnerBuilder::new()
            .worker_count(workers)
            .queue_capacity(capacity)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidWorkerCount | BuildError::InvalidQueueCapacity)
        ));
    }

    #[test]
    fn build_missing_adapters() {
        let result = RunnerBuilder::new()
            .expect_adapters(&["sleep", "httpget", "ethtx"])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingAdapters(missing)) if missing == vec!["httpget", "ethtx"]
        ));
    }

    #[test]
    fn builtin_adapters_cannot_be_registered_twice() {
        let result = RunnerBuilder::new().register::<NoOpParams, _>(crate::adapters::NoOp);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }
}
