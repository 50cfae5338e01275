//! `POST /webhook/whale-transactions` — decodes native transfers and
//! ERC-20 `Transfer` log receipts into `WhaleIntent`s and forwards them to
//! the ingest supervisor's whale intake channel.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::types::{ThreatLevel, WhaleIntent};

use super::error::{HttpError, Result};
use super::AppState;

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    #[serde(default)]
    pub matching_transactions: Vec<NativeTx>,
    #[serde(default)]
    pub matching_receipts: Vec<Receipt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTx {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Wei, as a `0x`-prefixed hex string.
    pub value: String,
    /// When the sender observed this transaction, epoch milliseconds.
    pub observed_at_ms: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub logs: Vec<Log>,
    /// When the sender observed this receipt, epoch milliseconds.
    pub observed_at_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub topics: Vec<String>,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub transactions: usize,
    pub receipts: usize,
}

/// Parses a `0x`-prefixed hex-encoded big-endian integer into wei, then into
/// a whole-ETH f64. No USD price feed is wired into this crate; the ETH
/// quantity stands in for `estimatedValueUsd` until one is.
fn wei_hex_to_eth(value: &str) -> f64 {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let padded = if trimmed.len() % 2 == 0 { trimmed.to_string() } else { format!("0{trimmed}") };
    let Ok(bytes) = hex::decode(&padded) else { return 0.0 };
    // Only the low 16 bytes matter for an f64-precision ETH amount.
    let low_bytes = &bytes[bytes.len().saturating_sub(16)..];
    let mut buf = [0u8; 16];
    buf[16 - low_bytes.len()..].copy_from_slice(low_bytes);
    let wei = u128::from_be_bytes(buf);
    wei as f64 / 1e18
}

/// Decodes a 32-byte topic and returns the checksummed-case-insensitive
/// address packed into its low 20 bytes, `0x`-prefixed.
fn address_from_topic(topic: &str) -> Option<String> {
    let trimmed = topic.strip_prefix("0x").unwrap_or(topic);
    let bytes = hex::decode(trimmed).ok()?;
    let address_bytes = bytes.get(bytes.len().checked_sub(20)?..)?;
    Some(format!("0x{}", hex::encode(address_bytes)))
}

fn threat_level_for(estimated_value: f64) -> ThreatLevel {
    if estimated_value >= 1000.0 {
        ThreatLevel::Critical
    } else if estimated_value >= 100.0 {
        ThreatLevel::High
    } else if estimated_value >= 10.0 {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

fn intent_from_native(tx: &NativeTx, now: i64) -> WhaleIntent {
    let estimated_value_usd = wei_hex_to_eth(&tx.value);
    WhaleIntent {
        id: Uuid::new_v4(),
        whale_address: tx.from.clone(),
        estimated_value_usd,
        target_exchange: Some(tx.to.clone()),
        threat_level: threat_level_for(estimated_value_usd),
        detection_latency_ms: (now - tx.observed_at_ms).max(0),
        timestamp: now,
    }
}

/// `from`/`to` are the low 20 bytes of `topics[1]`/`topics[2]` respectively.
/// `None` if the log doesn't match the Transfer signature or is malformed.
fn intent_from_transfer_log(log: &Log, observed_at_ms: i64, now: i64) -> Option<WhaleIntent> {
    if log.topics.first()?.to_lowercase() != TRANSFER_TOPIC {
        return None;
    }
    let from = address_from_topic(log.topics.get(1)?)?;
    let to = address_from_topic(log.topics.get(2)?)?;
    let estimated_value_usd = wei_hex_to_eth(&log.data);
    Some(WhaleIntent {
        id: Uuid::new_v4(),
        whale_address: from,
        estimated_value_usd,
        target_exchange: Some(to),
        threat_level: threat_level_for(estimated_value_usd),
        detection_latency_ms: (now - observed_at_ms).max(0),
        timestamp: now,
    })
}

pub async fn whale_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WebhookBody>,
) -> Result<Json<WebhookResponse>> {
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match provided {
        Some(token) if token == state.webhook_token.expose_secret() => {}
        _ => return Err(HttpError::Unauthorized),
    }

    let now = Utc::now().timestamp_millis();

    for tx in &body.matching_transactions {
        let intent = intent_from_native(tx, now);
        let _ = state.whale_sender.send(intent).await;
    }

    for receipt in &body.matching_receipts {
        if let Some(log) = receipt.logs.first() {
            if let Some(intent) = intent_from_transfer_log(log, receipt.observed_at_ms, now) {
                let _ = state.whale_sender.send(intent).await;
            }
        }
    }

    Ok(Json(WebhookResponse {
        transactions: body.matching_transactions.len(),
        receipts: body.matching_receipts.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wei_hex_converts_to_eth() {
        // 10 ETH in wei, hex-encoded.
        let value = "0x8ac7230489e80000";
        let eth = wei_hex_to_eth(value);
        assert!((eth - 10.0).abs() < 1e-6);
    }

    #[test]
    fn transfer_log_decodes_from_and_to() {
        let from_addr = "1".repeat(40);
        let to_addr = "2".repeat(40);
        let log = Log {
            topics: vec![
                TRANSFER_TOPIC.to_string(),
                format!("0x{}{}", "0".repeat(24), from_addr),
                format!("0x{}{}", "0".repeat(24), to_addr),
            ],
            data: "0x0de0b6b3a7640000".to_string(),
        };
        let intent = intent_from_transfer_log(&log, 0, 0).expect("matches transfer topic");
        assert_eq!(intent.whale_address, format!("0x{from_addr}"));
        assert_eq!(intent.target_exchange.as_deref(), Some(format!("0x{to_addr}").as_str()));
    }

    #[test]
    fn detection_latency_reflects_observed_at() {
        let from_addr = "1".repeat(40);
        let to_addr = "2".repeat(40);
        let log = Log {
            topics: vec![
                TRANSFER_TOPIC.to_string(),
                format!("0x{}{}", "0".repeat(24), from_addr),
                format!("0x{}{}", "0".repeat(24), to_addr),
            ],
            data: "0x0de0b6b3a7640000".to_string(),
        };
        let intent = intent_from_transfer_log(&log, 1_000, 1_250).expect("matches transfer topic");
        assert_eq!(intent.detection_latency_ms, 250);
    }

    #[test]
    fn non_transfer_log_is_ignored() {
        let log = Log { topics: vec!["0xdeadbeef".to_string()], data: "0x0".to_string() };
        assert!(intent_from_transfer_log(&log, 0, 0).is_none());
    }

    #[test]
    fn threat_level_buckets() {
        assert_eq!(threat_level_for(5.0), ThreatLevel::Low);
        assert_eq!(threat_level_for(50.0), ThreatLevel::Medium);
        assert_eq!(threat_level_for(500.0), ThreatLevel::High);
        assert_eq!(threat_level_for(5000.0), ThreatLevel::Critical);
    }
}
