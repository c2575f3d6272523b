//! HeadTrackable port - チェーンのヘッド通知を受け取る側
//!
//! ヘッド追跡サブシステムは接続・切断・新しいヘッドのたびに、
//! 登録された HeadTrackable を呼び出します。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A block header as reported by the head tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub number: u64,
    pub hash: String,
}

impl Head {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }
}

/// Listener for chain connection changes and new heads.
#[async_trait]
pub trait HeadTrackable: Send + Sync {
    /// The connection to the chain was (re)established.
    async fn connect(&self, head: Option<&Head>);

    /// The connection was lost.
    async fn disconnect(&self);

    async fn on_new_head(&self, head: &Head);
}
