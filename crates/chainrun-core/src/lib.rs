//! chainrun-core
//!
//! Execution core for multi-step oracle jobs: runs are executed step by
//! step by a bounded worker pool, suspended without blocking a worker, and
//! resumed after a timer, a chain event or a process restart.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, run_result, job_run, request）
//! - **ports**: 抽象化レイヤー（JobStore, Clock, HeadTrackable, IdGenerator）
//! - **adapters**: ステップの実装（sleep, ethbool, noop, noop_pend）と AdapterRegistry
//! - **app**: 実行コア（RunQueue, WorkerPool, RunExecutor, Resumers, JobRunner）
//! - **impls**: ports の実装（InMemoryJobStore, JsonFileStore, HeadTracker）

pub mod adapters;
pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use crate::app::{JobRunner, RunnerBuilder, RunnerConfig};
pub use crate::error::{ChainrunError, Result};
