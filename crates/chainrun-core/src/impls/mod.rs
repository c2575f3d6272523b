//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryJobStore**: テスト・開発用の JobStore
//! - **JsonFileStore**: ディレクトリに 1 run = 1 ファイルで保存する JobStore
//! - **HeadTracker**: 接続状態とヘッドを HeadTrackable に配信する

pub mod file_store;
pub mod head_tracker;
pub mod inmem_store;

// 主要な型を再エクスポート
pub use self::file_store::JsonFileStore;
pub use self::head_tracker::HeadTracker;
pub use self::inmem_store::InMemoryJobStore;
