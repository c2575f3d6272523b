//! Ports - 抽象化レイヤー
//!
//! Executor / Resumer が依存する外部システム（永続化、時計、チェーンの
//! ヘッド追跡）へのインターフェースを定義します。実装は `impls` に置きます。

pub mod clock;
pub mod head_tracker;
pub mod id_generator;
pub mod job_store;

pub use self::clock::{Clock, ManualClock, SystemClock, Timer};
pub use self::head_tracker::{Head, HeadTrackable};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{JobStore, StoreError};
