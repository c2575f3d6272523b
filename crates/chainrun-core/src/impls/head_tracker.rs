//! HeadTracker - インメモリのヘッド追跡
//!
//! チェーンクライアントから受け取った接続状態とヘッドを、
//! attach された HeadTrackable に配信します。
//! 同じ番号以下のヘッドは配信しません（reorg 検出はしない）。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::ports::{Head, HeadTrackable};

#[derive(Default)]
pub struct HeadTracker {
    listeners: Mutex<Vec<Arc<dyn HeadTrackable>>>,
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    connected: bool,
    head: Option<Head>,
}

impl HeadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. If already connected it is told so immediately.
    pub async fn attach(&self, listener: Arc<dyn HeadTrackable>) {
        let (connected, head) = {
            let state = self.state.lock().await;
            (state.connected, state.head.clone())
        };
        if connected {
            listener.connect(head.as_ref()).await;
        }
        self.listeners.lock().await.push(listener);
    }

    pub async fn connect(&self, head: Option<Head>) {
        {
            let mut state = self.state.lock().await;
            state.connected = true;
            if head.is_some() {
                state.head = head.clone();
            }
        }
        tracing::info!(head = ?head.as_ref().map(|h| h.number), "chain connected");
        for listener in self.snapshot().await {
            listener.connect(head.as_ref()).await;
        }
    }

    pub async fn disconnect(&self) {
        self.state.lock().await.connected = false;
        tracing::warn!("chain disconnected");
        for listener in self.snapshot().await {
            listener.disconnect().await;
        }
    }

    /// Record a head; listeners only see heads newer than the last one.
    pub async fn save(&self, head: Head) {
        {
            let mut state = self.state.lock().await;
            if state.head.as_ref().is_some_and(|h| h.number >= head.number) {
                return;
            }
            state.head = Some(head.clone());
        }
        for listener in self.snapshot().await {
            listener.on_new_head(&head).await;
        }
    }

    pub async fn head(&self) -> Option<Head> {
        self.state.lock().await.head.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    // listeners are called without holding the lock
    async fn snapshot(&self) -> Vec<Arc<dyn HeadTrackable>> {
        self.listeners.lock().await.clone()
    }
}
