//! Order-book stream: REST snapshot + WebSocket delta application.
//!
//! Exponential backoff with ping/pong keep-alive, gap detection via
//! `first_update_id <= last_update_id + 1`, crossed-book detection,
//! resync-on-gap) from one hardcoded venue to a configurable one.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use super::types::{DeltaOutcome, IngestHealth, Levels, OrderBookSnapshot};

const MAX_RECONNECT_DELAY_SECS: u64 = 30;
const MAX_RECONNECT_ATTEMPTS: u32 = 10;
const STALENESS_THRESHOLD_MS: i64 = 5000;
/// Full-depth REST snapshots are the heaviest-weighted Binance endpoint;
/// one per second keeps reconnect storms and gap resyncs from tripping the
/// exchange's own IP ban thresholds.
const SNAPSHOT_RATE_LIMIT_PER_SEC: u32 = 1;

#[derive(Debug, Deserialize)]
struct DepthUpdateEvent {
    #[serde(rename = "U")]
    first_update_id: u64,
    #[serde(rename = "u")]
    final_update_id: u64,
    #[serde(rename = "b")]
    bids: Vec<(Decimal, Decimal)>,
    #[serde(rename = "a")]
    asks: Vec<(Decimal, Decimal)>,
}

pub struct OrderBookIngest {
    symbol: String,
    ws_url: String,
    rest_snapshot_url: String,
    http: reqwest::Client,
    book: Arc<RwLock<OrderBookSnapshot>>,
    health: Arc<RwLock<IngestHealth>>,
    last_message_at: Arc<AtomicI64>,
    reconnect_attempts: AtomicU32,
    snapshot_rate_limiter: DefaultDirectRateLimiter,
    updates_tx: mpsc::Sender<OrderBookSnapshot>,
}

impl OrderBookIngest {
    pub fn new(
        symbol: String,
        ws_url: String,
        rest_snapshot_url: String,
        updates_tx: mpsc::Sender<OrderBookSnapshot>,
    ) -> Self {
        Self {
            symbol,
            ws_url,
            rest_snapshot_url,
            http: reqwest::Client::new(),
            book: Arc::new(RwLock::new(OrderBookSnapshot {
                bids: Levels::new(),
                asks: Levels::new(),
                timestamp: 0,
                last_update_id: 0,
            })),
            health: Arc::new(RwLock::new(IngestHealth::Offline)),
            last_message_at: Arc::new(AtomicI64::new(0)),
            reconnect_attempts: AtomicU32::new(0),
            snapshot_rate_limiter: RateLimiter::direct(Quota::per_second(
                NonZeroU32::new(SNAPSHOT_RATE_LIMIT_PER_SEC).expect("nonzero rate limit"),
            )),
            updates_tx,
        }
    }

    pub async fn health(&self) -> IngestHealth {
        *self.health.read().await
    }

    pub async fn snapshot(&self) -> OrderBookSnapshot {
        self.book.read().await.clone()
    }

    /// Runs the supervised reconnect loop until the process shuts down.
    pub async fn run(&self, shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut shutdown = shutdown;
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.fetch_snapshot().await {
                Ok(snapshot) => {
                    *self.book.write().await = snapshot;
                }
                Err(e) => {
                    tracing::warn!(symbol = %self.symbol, error = %e, "order book snapshot fetch failed");
                    *self.health.write().await = IngestHealth::Limited;
                }
            }

            tokio::select! {
                result = self.connect_and_process() => {
                    if let Err(e) = result {
                        tracing::warn!(symbol = %self.symbol, error = %e, "order book websocket closed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }

            let attempts = self.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
            if attempts >= MAX_RECONNECT_ATTEMPTS {
                *self.health.write().await = IngestHealth::Offline;
            }
            let delay = Duration::from_secs(2u64.saturating_pow(attempts).min(MAX_RECONNECT_DELAY_SECS));
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_snapshot(&self) -> Result<OrderBookSnapshot, crate::error::EngineError> {
        self.snapshot_rate_limiter.until_ready().await;
        let response = self.http.get(&self.rest_snapshot_url).send().await?;
        let body: serde_json::Value = response.json().await?;
        let last_update_id = body
            .get("lastUpdateId")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| crate::error::EngineError::MalformedInput("missing lastUpdateId".into()))?;

        let mut bids = Levels::new();
        for level in body.get("bids").and_then(|v| v.as_array()).into_iter().flatten() {
            if let Some((p, q)) = parse_level(level) {
                bids.insert(p, q);
            }
        }
        let mut asks = Levels::new();
        for level in body.get("asks").and_then(|v| v.as_array()).into_iter().flatten() {
            if let Some((p, q)) = parse_level(level) {
                asks.insert(p, q);
            }
        }

        Ok(OrderBookSnapshot {
            bids,
            asks,
            timestamp: chrono::Utc::now().timestamp_millis(),
            last_update_id,
        })
    }

    async fn connect_and_process(&self) -> Result<(), crate::error::EngineError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.ws_url)
            .await
            .map_err(|e| crate::error::EngineError::TransientNetwork(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        *self.health.write().await = IngestHealth::Online;
        self.last_message_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| crate::error::EngineError::TransientNetwork(e.to_string()))?;
            match msg {
                Message::Ping(payload) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Message::Text(text) => {
                    self.last_message_at
                        .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
                    self.reconnect_attempts.store(0, Ordering::Relaxed);
                    self.handle_text(&text).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    async fn handle_text(&self, text: &str) {
        let event: DepthUpdateEvent = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(symbol = %self.symbol, error = %e, "malformed depth update");
                return;
            }
        };

        let outcome = {
            let mut book = self.book.write().await;
            book.apply_delta(event.final_update_id, event.first_update_id, &event.bids, &event.asks)
        };

        match outcome {
            DeltaOutcome::Applied => {
                let snapshot = self.book.read().await.clone();
                let _ = self.updates_tx.send(snapshot).await;
            }
            DeltaOutcome::Dropped => {}
            DeltaOutcome::Gap | DeltaOutcome::Crossed => {
                tracing::warn!(symbol = %self.symbol, ?outcome, "resyncing order book");
                if let Ok(fresh) = self.fetch_snapshot().await {
                    *self.book.write().await = fresh;
                }
            }
        }
    }

    pub fn is_stale(&self, now: i64) -> bool {
        let last = self.last_message_at.load(Ordering::Relaxed);
        last != 0 && now - last > STALENESS_THRESHOLD_MS
    }
}

fn parse_level(level: &serde_json::Value) -> Option<(Decimal, Decimal)> {
    let arr = level.as_array()?;
    let price: Decimal = arr.first()?.as_str()?.parse().ok()?;
    let qty: Decimal = arr.get(1)?.as_str()?.parse().ok()?;
    Some((price, qty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_pair() {
        let v = serde_json::json!(["100.5", "2.0"]);
        let (p, q) = parse_level(&v).unwrap();
        assert_eq!(p.to_string(), "100.5");
        assert_eq!(q.to_string(), "2.0");
    }

    #[test]
    fn staleness_threshold_is_five_seconds() {
        assert_eq!(STALENESS_THRESHOLD_MS, 5000);
    }
}
