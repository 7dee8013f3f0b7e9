//! 一次性用户通知
//!
//! 状态管理层发布，视图层订阅展示后即弃。

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// 通知发布句柄，可随意克隆
#[derive(Clone)]
pub struct Notices {
    sender: broadcast::Sender<Notice>,
}

impl Notices {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, message.into());
    }

    fn publish(&self, level: NoticeLevel, message: String) {
        // 没有任何订阅者时 send 返回 Err，直接丢弃
        let _ = self.sender.send(Notice { level, message });
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new(32)
    }
}
