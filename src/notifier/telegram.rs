//! Telegram Bot API sink.

use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{NotificationSink, Notification, Priority};
use crate::config::credentials::SecretString;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

struct QueuedNotification {
    priority: Priority,
    seq: u64,
    text: String,
}

impl PartialEq for QueuedNotification {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedNotification {}
impl Ord for QueuedNotification {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueuedNotification {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Prioritized outbound queue draining serially at `MIN_INTERVAL`,
/// highest-priority-first (ties by arrival order).
pub struct TelegramSink {
    enqueue: mpsc::UnboundedSender<QueuedNotification>,
}

impl TelegramSink {
    pub fn new(bot_token: SecretString, chat_id: String, http_client: reqwest::Client) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedNotification>();
        tokio::spawn(async move {
            let heap = Arc::new(Mutex::new(BinaryHeap::<QueuedNotification>::new()));
            let drain_heap = Arc::clone(&heap);
            let mut interval = tokio::time::interval(MIN_INTERVAL);
            loop {
                tokio::select! {
                    item = rx.recv() => {
                        match item {
                            Some(item) => { heap.lock().await.push(item); }
                            None => break,
                        }
                    }
                    _ = interval.tick() => {
                        let next = drain_heap.lock().await.pop();
                        if let Some(item) = next {
                            send_message(&http_client, &bot_token, &chat_id, &item.text).await;
                        }
                    }
                }
            }
        });
        Self { enqueue: tx }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, notification: Notification) {
        static SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let _ = self.enqueue.send(QueuedNotification {
            priority: notification.priority,
            seq,
            text: notification.text,
        });
    }
}

async fn send_message(client: &reqwest::Client, bot_token: &SecretString, chat_id: &str, text: &str) {
    let url = format!(
        "https://api.telegram.org/bot{}/sendMessage",
        bot_token.expose_secret()
    );
    let body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "Markdown",
        "disable_web_page_preview": true,
    });
    match client.post(&url).json(&body).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::BAD_REQUEST => {
            let plain = strip_markdown(text);
            let fallback = serde_json::json!({
                "chat_id": chat_id,
                "text": plain,
                "disable_web_page_preview": true,
            });
            if let Err(e) = client.post(&url).json(&fallback).send().await {
                tracing::warn!(error = %e, "telegram plaintext fallback also failed");
            }
        }
        Ok(response) if !response.status().is_success() => {
            tracing::warn!(status = %response.status(), "telegram sendMessage rejected");
        }
        Err(e) => tracing::warn!(error = %e, "telegram sendMessage request failed"),
        Ok(_) => {}
    }
}

fn strip_markdown(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '[' | ']'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_orders_by_priority_then_arrival() {
        let mut heap = BinaryHeap::new();
        heap.push(QueuedNotification { priority: Priority::Low, seq: 0, text: "a".into() });
        heap.push(QueuedNotification { priority: Priority::Critical, seq: 1, text: "b".into() });
        heap.push(QueuedNotification { priority: Priority::High, seq: 2, text: "c".into() });
        assert_eq!(heap.pop().unwrap().text, "b");
        assert_eq!(heap.pop().unwrap().text, "c");
        assert_eq!(heap.pop().unwrap().text, "a");
    }

    #[test]
    fn strip_markdown_removes_formatting_chars() {
        assert_eq!(strip_markdown("*bold* and `code`"), "bold and code");
    }
}
