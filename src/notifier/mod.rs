//! Telegram Sink (component C).
//!
//! Out of scope: rich message formatting templates per regime. In scope: a
//! real minimal sink so the Engine has something to publish to, exercising
//! the serial-dequeue + priority + rate-limit contract end to end. The
//! `NotificationSink` trait boundary keeps the Engine from depending on
//! Telegram concretely.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub priority: Priority,
    pub text: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: Notification);
}

/// Used when `TELEGRAM_BOT_TOKEN` is unset; drops notifications after
/// logging them once at debug level.
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn send(&self, notification: Notification) {
        tracing::debug!(priority = ?notification.priority, text = %notification.text, "notification dropped: no sink configured");
    }
}
