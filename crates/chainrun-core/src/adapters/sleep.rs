//! Sleep - 指定時刻まで run を中断する
//!
//! `until` が過去なら即座に Completed。未来なら PendingSleep を返し、
//! 残り時間後に同じ run を再投入する continuation を予約します。
//! ワーカーは待ちません。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Adapter, AdapterParams};
use crate::app::context::ExecutionContext;
use crate::domain::{RunResult, RunStatus};
use crate::ports::Clock;

#[derive(Debug, Clone, Deserialize)]
pub struct SleepParams {
    pub until: DateTime<Utc>,
}

impl AdapterParams for SleepParams {
    const TYPE: &'static str = "sleep";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sleep;

#[async_trait]
impl Adapter<SleepParams> for Sleep {
    async fn perform(
        &self,
        params: SleepParams,
        input: &RunResult,
        ctx: &ExecutionContext,
    ) -> RunResult {
        let now = ctx.clock().now();
        if params.until <= now {
            return input.completed();
        }

        // positive here, so to_std cannot fail
        let remaining = (params.until - now).to_std().unwrap_or_default();
        tracing::debug!(
            job_run_id = %ctx.job_run_id(),
            until = %params.until,
            "sleeping"
        );
        ctx.resume_after(remaining);
        input.with_status(RunStatus::PendingSleep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::manual_context;
    use crate::domain::JobRunId;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn past_deadline_completes_immediately() {
        let id = JobRunId::random();
        let (ctx, services, clock, _rx) = manual_context(id);
        let input = RunResult::with_value(id, json!("x"));

        let params = SleepParams {
            until: clock.now() - chrono::Duration::seconds(1),
        };
        let out = Sleep.perform(params, &input, &ctx).await;

        assert_eq!(out.status, RunStatus::Completed);
        assert_eq!(out.result(), &json!("x"));
        assert!(services.continuations.is_empty());
    }

    #[tokio::test]
    async fn future_deadline_suspends_and_schedules_one_resume() {
        let id = JobRunId::random();
        let (ctx, services, clock, rx) = manual_context(id);
        let input = RunResult::with_value(id, json!("x"));

        let params = SleepParams {
            until: clock.now() + chrono::Duration::seconds(60),
        };
        let out = Sleep.perform(params, &input, &ctx).await;

        assert_eq!(out.status, RunStatus::PendingSleep);
        assert_eq!(out.error, None);
        assert!(services.continuations.is_scheduled(id));
        assert_eq!(input.status, RunStatus::InProgress);

        clock.advance(Duration::from_secs(59));
        assert!(rx.try_dequeue().await.is_none());

        clock.advance(Duration::from_secs(1));
        let req = tokio::time::timeout(Duration::from_secs(1), rx.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.job_run_id, id);
        assert_eq!(req.input, None);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_dequeue().await.is_none());
    }

    #[test]
    fn params_parse_rfc3339() {
        let params: SleepParams =
            serde_json::from_value(json!({"until": "2030-01-01T00:00:00Z"})).unwrap();
        assert_eq!(params.until.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }
}
