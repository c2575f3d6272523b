//! NoOp adapters.
//!
//! `noop` passes its input through as Completed. `noop_pend` suspends the
//! run with a pending status and schedules nothing, so only an external
//! resume (e.g. the connection resumer) moves it forward.

use async_trait::async_trait;
use serde::Deserialize;

use super::{Adapter, AdapterParams};
use crate::app::context::ExecutionContext;
use crate::domain::{RunResult, RunStatus};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoOpParams {}

impl AdapterParams for NoOpParams {
    const TYPE: &'static str = "noop";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

#[async_trait]
impl Adapter<NoOpParams> for NoOp {
    async fn perform(
        &self,
        _params: NoOpParams,
        input: &RunResult,
        _ctx: &ExecutionContext,
    ) -> RunResult {
        input.completed()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoOpPendParams {
    #[serde(default = "default_pending")]
    pub status: RunStatus,
}

fn default_pending() -> RunStatus {
    RunStatus::PendingConfirmations
}

impl AdapterParams for NoOpPendParams {
    const TYPE: &'static str = "noop_pend";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPend;

#[async_trait]
impl Adapter<NoOpPendParams> for NoOpPend {
    async fn perform(
        &self,
        params: NoOpPendParams,
        input: &RunResult,
        _ctx: &ExecutionContext,
    ) -> RunResult {
        if !params.status.is_pending() {
            return input.errored(format!(
                "noop_pend: {:?} is not a pending status",
                params.status
            ));
        }
        input.with_status(params.status)
    }
}
