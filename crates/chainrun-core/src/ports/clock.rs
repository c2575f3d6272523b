//! Clock port - 時刻とタイマーの抽象化
//!
//! # 実装
//! - **SystemClock**: 本番用（tokio のタイマー）
//! - **ManualClock**: テスト用（`advance()` で時間を進める）

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// 一度だけ完了するタイマー
pub type Timer = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Clock は現在時刻とワンショットタイマーを提供
///
/// # テスト容易性
/// - `after()` は呼び出し時点でタイマーを登録する（await 前に）
/// - そのため ManualClock では `advance()` との順序が決定的になる
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// `duration` 経過後に完了する Timer を返す
    fn after(&self, duration: Duration) -> Timer;
}

/// 本番用の Clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, duration: Duration) -> Timer {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// テスト用の Clock
///
/// 時刻は `advance()` でのみ進みます。期限を迎えたタイマーは
/// `advance()` の中で発火します。
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    timers: Vec<(DateTime<Utc>, oneshot::Sender<()>)>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now,
                timers: Vec::new(),
            }),
        }
    }

    /// 時刻を進め、期限切れのタイマーを発火する
    pub fn advance(&self, duration: Duration) {
        let fired = {
            let mut state = self.lock();
            state.now += to_chrono(duration);
            let now = state.now;
            let (fired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.timers)
                .into_iter()
                .partition(|(deadline, _)| *deadline <= now);
            state.timers = waiting;
            fired
        };
        for (_, tx) in fired {
            // receiver dropped = continuation cancelled
            let _ = tx.send(());
        }
    }

    /// 未発火のタイマー数（キャンセル済みは除く）
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // poisoned only if a test panicked while holding it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn after(&self, duration: Duration) -> Timer {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.lock();
            let deadline = state.now + to_chrono(duration);
            if duration.is_zero() {
                let _ = tx.send(());
            } else {
                state.timers.push((deadline, tx));
            }
        }
        Box::pin(async move {
            let _ = rx.await;
        })
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    // out-of-range durations are clamped to a century
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
