//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: 注入された Clock の時刻で ULID を作る

use std::sync::Arc;

use crate::domain::ids::{JobRunId, TaskRunId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は JobRun / TaskRun の ID を生成
pub trait IdGenerator: Send + Sync {
    fn generate_job_run_id(&self) -> JobRunId;

    fn generate_task_run_id(&self) -> TaskRunId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// timestamp 部分は Clock から取るので、ManualClock を使えば
/// 生成順と論理時刻が一致します。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_job_run_id(&self) -> JobRunId {
        JobRunId::from(self.next())
    }

    fn generate_task_run_id(&self) -> TaskRunId {
        TaskRunId::from(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ManualClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generates_unique_ids() {
        let id_gen = UlidGenerator::new(Arc::new(SystemClock));

        let id1 = id_gen.generate_job_run_id();
        let id2 = id_gen.generate_job_run_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn timestamp_comes_from_the_clock() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(Arc::new(ManualClock::new(fixed_time)));

        let run = id_gen.generate_job_run_id();
        let task = id_gen.generate_task_run_id();

        assert_eq!(run.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(task.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert!(task.to_string().starts_with("task-"));
    }
}
