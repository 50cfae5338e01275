//! Derivatives stream: up to two independent venue subscriptions routed to
//! funding-rate / open-interest / mark-price updaters. Connection failure of
//! one venue must not stop the other — each runs its own supervised loop,
//! the same reconnect-backoff shape as `ingest::orderbook`.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use super::types::{DerivativesAlert, DerivativesAlertType, IngestHealth};

const MAX_RECONNECT_DELAY_SECS: u64 = 30;
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Spike thresholds; deliberately simple relative-change triggers since the
/// spec treats the exact calibration as venue-specific and non-normative.
const OI_SPIKE_RELATIVE_CHANGE: f64 = 0.05;
const FUNDING_SPIKE_ABS_RATE: f64 = 0.001;
const MARK_PRICE_VOLATILITY_RELATIVE_CHANGE: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default)]
pub struct DerivativesState {
    pub open_interest: Option<f64>,
    pub funding_rate: Option<f64>,
    pub mark_price: Option<f64>,
}

pub struct DerivativesVenue {
    pub name: String,
    ws_url: String,
    state: Arc<RwLock<DerivativesState>>,
    health: Arc<RwLock<IngestHealth>>,
    last_message_at: Arc<AtomicI64>,
    reconnect_attempts: AtomicU32,
    alerts_tx: mpsc::Sender<DerivativesAlert>,
}

impl DerivativesVenue {
    pub fn new(name: String, ws_url: String, alerts_tx: mpsc::Sender<DerivativesAlert>) -> Self {
        Self {
            name,
            ws_url,
            state: Arc::new(RwLock::new(DerivativesState::default())),
            health: Arc::new(RwLock::new(IngestHealth::Offline)),
            last_message_at: Arc::new(AtomicI64::new(0)),
            reconnect_attempts: AtomicU32::new(0),
            alerts_tx,
        }
    }

    pub async fn health(&self) -> IngestHealth {
        *self.health.read().await
    }

    pub async fn run(&self, shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut shutdown = shutdown;
        loop {
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                result = self.connect_and_process() => {
                    if let Err(e) = result {
                        tracing::warn!(venue = %self.name, error = %e, "derivatives websocket closed");
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
            } else {
                *self.health.write().await = IngestHealth::Limited;
            }
            let delay = Duration::from_secs(2u64.saturating_pow(attempts).min(MAX_RECONNECT_DELAY_SECS));
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_and_process(&self) -> Result<(), crate::error::EngineError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.ws_url)
            .await
            .map_err(|e| crate::error::EngineError::TransientNetwork(e.to_string()))?;
        let (_write, mut read) = ws_stream.split();
        *self.health.write().await = IngestHealth::Online;
        self.last_message_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| crate::error::EngineError::TransientNetwork(e.to_string()))?;
            if let Message::Text(text) = msg {
                self.last_message_at
                    .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
                self.reconnect_attempts.store(0, Ordering::Relaxed);
                self.handle_text(&text).await;
            }
            if matches!(msg_kind(&msg), MsgKind::Close) {
                break;
            }
        }
        Ok(())
    }

    async fn handle_text(&self, text: &str) {
        let payload: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(venue = %self.name, error = %e, "malformed derivatives update");
                return;
            }
        };

        let oi = payload.get("openInterest").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());
        let funding = payload.get("fundingRate").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());
        let mark = payload.get("markPrice").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());

        let mut state = self.state.write().await;

        if let Some(new_oi) = oi {
            if let Some(prev) = state.open_interest {
                if prev > 0.0 && ((new_oi - prev) / prev).abs() >= OI_SPIKE_RELATIVE_CHANGE {
                    self.emit_alert(DerivativesAlertType::OiSpike, serde_json::json!({
                        "previous": prev, "current": new_oi,
                    }), 60_000).await;
                }
            }
            state.open_interest = Some(new_oi);
        }

        if let Some(new_rate) = funding {
            if new_rate.abs() >= FUNDING_SPIKE_ABS_RATE {
                self.emit_alert(DerivativesAlertType::FundingSpike, serde_json::json!({
                    "rate": new_rate,
                }), 60_000).await;
            }
            state.funding_rate = Some(new_rate);
        }

        if let Some(new_mark) = mark {
            if let Some(prev) = state.mark_price {
                if prev > 0.0 && ((new_mark - prev) / prev).abs() >= MARK_PRICE_VOLATILITY_RELATIVE_CHANGE {
                    self.emit_alert(DerivativesAlertType::HighVolatility, serde_json::json!({
                        "previous": prev, "current": new_mark,
                    }), 30_000).await;
                }
            }
            state.mark_price = Some(new_mark);
        }
    }

    async fn emit_alert(&self, alert_type: DerivativesAlertType, data: serde_json::Value, validity_ms: i64) {
        let alert = DerivativesAlert::new(alert_type, data, validity_ms);
        let _ = self.alerts_tx.send(alert).await;
    }
}

fn attempts_reset(last_message_at: &Arc<AtomicI64>) {
    last_message_at.store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
}

enum MsgKind {
    Close,
    Other,
}

fn msg_kind(msg: &Message) -> MsgKind {
    match msg {
        Message::Close(_) => MsgKind::Close,
        _ => MsgKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_reasonable_fractions() {
        assert!(OI_SPIKE_RELATIVE_CHANGE > 0.0 && OI_SPIKE_RELATIVE_CHANGE < 1.0);
        assert!(FUNDING_SPIKE_ABS_RATE > 0.0);
    }
}
