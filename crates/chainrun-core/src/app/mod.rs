//! App - アプリケーション層
//!
//! ports を組み合わせて実行コアを組み立てます。
//!
//! # 主要コンポーネント
//! - **RunnerBuilder / JobRunner**: 構築とライフサイクル
//! - **RunQueue**: RunRequest の有界キュー
//! - **WorkerPool**: キューを消費する固定数のワーカー
//! - **ActiveRuns**: run ごとの実行登録（同時実行は 1 つだけ）
//! - **RunExecutor**: JobRun の状態機械
//! - **Resumers**: 起動時・チェーンイベント時の再投入
//! - **ExecutionContext**: アダプターに注入するキュー・時計・continuation

pub mod active_runs;
pub mod builder;
pub mod context;
pub mod executor;
pub mod resumer;
pub mod run_queue;
pub mod runner;
pub mod worker_pool;

// 主要な型を再エクスポート
pub use self::active_runs::{ActiveRuns, Claim, Release};
pub use self::builder::{BuildError, RunnerBuilder, RunnerConfig};
pub use self::context::{Continuations, ExecutionContext, Services};
pub use self::executor::RunExecutor;
pub use self::resumer::{PendingConnectionResumer, resume_runs_since_last_shutdown};
pub use self::run_queue::{RunQueue, RunQueueReceiver, TrySendError, run_queue};
pub use self::runner::JobRunner;
pub use self::worker_pool::WorkerPool;
