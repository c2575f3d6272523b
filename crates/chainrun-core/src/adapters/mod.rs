//! Adapters - ステップを実行するプラグイン
//!
//! # 二層構造
//! - **表層（Typed）**: `AdapterParams` trait, `Adapter<P>` trait - 型安全
//! - **内部（Dyn）**: `DynAdapter` trait - object-safe, type erasure
//!
//! TaskSpec の `adapter` 名で DynAdapter を引き、`params` を serde で
//! `P` にデコードしてから `Adapter::perform` を呼びます。
//!
//! # 契約
//! - 入力の RunResult は変更しない（新しい RunResult を返す）
//! - 待つ必要があるときは Pending* を即座に返す。ワーカーを止めない
//! - 再開が必要なら `ExecutionContext::resume_after` で予約は 1 つだけ
//! - 失敗は `Err` ではなく Errored の RunResult で表す

pub mod eth_bool;
pub mod noop;
pub mod sleep;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::app::context::ExecutionContext;
use crate::domain::RunResult;

pub use self::eth_bool::{EVM_FALSE, EVM_TRUE, EthBool, EthBoolParams};
pub use self::noop::{NoOp, NoOpParams, NoOpPend, NoOpPendParams};
pub use self::sleep::{Sleep, SleepParams};

/// Parameter type of an adapter, tied to its registered name.
///
/// # 命名規約
/// - 小文字の短い名前（`"sleep"`, `"ethbool"`）
pub trait AdapterParams: DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}

/// A step implementation for parameters `P`.
#[async_trait]
pub trait Adapter<P: AdapterParams>: Send + Sync {
    async fn perform(&self, params: P, input: &RunResult, ctx: &ExecutionContext) -> RunResult;
}

/// Object-safe form stored in the registry.
#[async_trait]
pub trait DynAdapter: Send + Sync {
    async fn perform_dyn(
        &self,
        params: &serde_json::Value,
        input: &RunResult,
        ctx: &ExecutionContext,
    ) -> RunResult;

    fn adapter_type(&self) -> &str;
}

pub struct TypedAdapter<P: AdapterParams, A: Adapter<P>> {
    adapter: A,
    _marker: PhantomData<fn() -> P>,
}

impl<P: AdapterParams, A: Adapter<P>> TypedAdapter<P, A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P: AdapterParams, A: Adapter<P>> DynAdapter for TypedAdapter<P, A> {
    async fn perform_dyn(
        &self,
        params: &serde_json::Value,
        input: &RunResult,
        ctx: &ExecutionContext,
    ) -> RunResult {
        // missing params decode like an empty object
        let raw = match params {
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };
        match serde_json::from_value::<P>(raw) {
            Ok(params) => self.adapter.perform(params, input, ctx).await,
            Err(e) => input.errored(format!("{}: invalid params: {e}", P::TYPE)),
        }
    }

    fn adapter_type(&self) -> &str {
        P::TYPE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("adapter type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Adapter type name -> adapter.
///
/// Built during initialization (mutable), shared read-only afterwards.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn DynAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `sleep`, `ethbool`, `noop` and `noop_pend`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert::<SleepParams, _>(Sleep);
        registry.insert::<EthBoolParams, _>(EthBool);
        registry.insert::<NoOpParams, _>(NoOp);
        registry.insert::<NoOpPendParams, _>(NoOpPend);
        registry
    }

    pub fn register<P: AdapterParams, A: Adapter<P> + 'static>(
        &mut self,
        adapter: A,
    ) -> Result<(), RegistryError> {
        if self.adapters.contains_key(P::TYPE) {
            return Err(RegistryError::AlreadyRegistered(P::TYPE.to_string()));
        }
        self.insert::<P, A>(adapter);
        Ok(())
    }

    fn insert<P: AdapterParams, A: Adapter<P> + 'static>(&mut self, adapter: A) {
        self.adapters
            .insert(P::TYPE.to_string(), Arc::new(TypedAdapter::<P, A>::new(adapter)));
    }

    pub fn get(&self, adapter_type: &str) -> Option<Arc<dyn DynAdapter>> {
        self.adapters.get(adapter_type).cloned()
    }

    pub fn contains(&self, adapter_type: &str) -> bool {
        self.adapters.contains_key(adapter_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.adapters.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::app::context::Services;
    use crate::app::run_queue::{RunQueueReceiver, run_queue};
    use crate::ports::ManualClock;

    /// Context backed by a ManualClock and a small queue.
    pub(crate) fn manual_context(
        job_run_id: crate::domain::JobRunId,
    ) -> (ExecutionContext, Services, Arc<ManualClock>, RunQueueReceiver) {
        let (queue, rx) = run_queue(8);
        let clock = Arc::new(ManualClock::default());
        let services = Services::new(queue, clock.clone());
        (services.context_for(job_run_id), services, clock, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobRunId, RunStatus};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct MultiplyParams {
        times: i64,
    }

    impl AdapterParams for MultiplyParams {
        const TYPE: &'static str = "multiply";
    }

    struct Multiply;

    #[async_trait]
    impl Adapter<MultiplyParams> for Multiply {
        async fn perform(
            &self,
            params: MultiplyParams,
            input: &RunResult,
            _ctx: &ExecutionContext,
        ) -> RunResult {
            match input.result().as_i64() {
                Some(n) => input.with_result(n * params.times).completed(),
                None => input.errored("not a number"),
            }
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = AdapterRegistry::with_builtins();
        assert_eq!(
            registry.registered_types(),
            vec!["ethbool", "noop", "noop_pend", "sleep"]
        );
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = AdapterRegistry::new();
        registry.register::<MultiplyParams, _>(Multiply).unwrap();
        let result = registry.register::<MultiplyParams, _>(Multiply);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t == "multiply"));
    }

    #[tokio::test]
    async fn params_are_decoded_before_perform() {
        let mut registry = AdapterRegistry::new();
        registry.register::<MultiplyParams, _>(Multiply).unwrap();
        let adapter = registry.get("multiply").unwrap();
        assert_eq!(adapter.adapter_type(), "multiply");

        let id = JobRunId::random();
        let (ctx, ..) = testing::manual_context(id);
        let input = RunResult::with_value(id, json!(6));

        let out = adapter.perform_dyn(&json!({"times": 7}), &input, &ctx).await;
        assert_eq!(out.status, RunStatus::Completed);
        assert_eq!(out.result(), &json!(42));
    }

    #[tokio::test]
    async fn undecodable_params_error_the_step() {
        let mut registry = AdapterRegistry::new();
        registry.register::<MultiplyParams, _>(Multiply).unwrap();
        let adapter = registry.get("multiply").unwrap();

        let id = JobRunId::random();
        let (ctx, ..) = testing::manual_context(id);
        let input = RunResult::with_value(id, json!(6));

        let out = adapter.perform_dyn(&json!({"times": "x"}), &input, &ctx).await;
        assert_eq!(out.status, RunStatus::Errored);
        assert!(out.error.unwrap().starts_with("multiply: invalid params"));
    }
}
