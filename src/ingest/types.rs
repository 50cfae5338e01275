//! Shared ingest data types.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side of the book: price -> quantity, price-ordered.
pub type Levels = BTreeMap<Decimal, Decimal>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Levels,
    pub asks: Levels,
    /// Monotonic epoch millis.
    pub timestamp: i64,
    pub last_update_id: u64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.iter().next_back().map(|(p, q)| (*p, *q))
    }

    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.iter().next().map(|(p, q)| (*p, *q))
    }

    /// Best bid < best ask, all quantities positive, both sides non-empty.
    pub fn is_valid(&self) -> bool {
        if self.bids.is_empty() || self.asks.is_empty() {
            return false;
        }
        let Some((bid, _)) = self.best_bid() else {
            return false;
        };
        let Some((ask, _)) = self.best_ask() else {
            return false;
        };
        if bid >= ask {
            return false;
        }
        self.bids.values().all(|q| *q > Decimal::ZERO) && self.asks.values().all(|q| *q > Decimal::ZERO)
    }

    /// Applies one delta update: quantity 0 removes the level, otherwise the
    /// level is replaced. Drops updates at or behind `last_update_id`.
    pub fn apply_delta(&mut self, update_id: u64, first_update_id: u64, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> DeltaOutcome {
        if update_id <= self.last_update_id {
            return DeltaOutcome::Dropped;
        }
        if first_update_id > self.last_update_id + 1 {
            return DeltaOutcome::Gap;
        }
        for (price, qty) in bids {
            if qty.is_zero() {
                self.bids.remove(price);
            } else {
                self.bids.insert(*price, *qty);
            }
        }
        for (price, qty) in asks {
            if qty.is_zero() {
                self.asks.remove(price);
            } else {
                self.asks.insert(*price, *qty);
            }
        }
        self.last_update_id = update_id;
        self.timestamp = Utc::now().timestamp_millis();
        if let (Some((bid, _)), Some((ask, _))) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return DeltaOutcome::Crossed;
            }
        }
        DeltaOutcome::Applied
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Applied,
    Dropped,
    Gap,
    Crossed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestHealth {
    Online,
    Limited,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleIntent {
    pub id: uuid::Uuid,
    pub whale_address: String,
    pub estimated_value_usd: f64,
    pub target_exchange: Option<String>,
    pub threat_level: ThreatLevel,
    pub detection_latency_ms: i64,
    pub timestamp: i64,
}

impl WhaleIntent {
    /// Valid for 30s from `timestamp`, per the data model.
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.timestamp > 30_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DerivativesAlertType {
    OiSpike,
    FundingSpike,
    HighVolatility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativesAlert {
    pub alert_type: DerivativesAlertType,
    pub data: serde_json::Value,
    pub timestamp: i64,
    pub expires_at: i64,
}

impl DerivativesAlert {
    pub fn new(alert_type: DerivativesAlertType, data: serde_json::Value, validity_ms: i64) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            alert_type,
            data,
            timestamp: now,
            expires_at: now + validity_ms,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bids: &[(&str, &str)], asks: &[(&str, &str)]) -> OrderBookSnapshot {
        let mut b = Levels::new();
        for (p, q) in bids {
            b.insert(p.parse().unwrap(), q.parse().unwrap());
        }
        let mut a = Levels::new();
        for (p, q) in asks {
            a.insert(p.parse().unwrap(), q.parse().unwrap());
        }
        OrderBookSnapshot { bids: b, asks: a, timestamp: 0, last_update_id: 100 }
    }

    #[test]
    fn stale_delta_is_dropped() {
        let mut book = snapshot(&[("10", "1")], &[("11", "1")]);
        let outcome = book.apply_delta(100, 100, &[], &[]);
        assert_eq!(outcome, DeltaOutcome::Dropped);
    }

    #[test]
    fn gap_is_detected() {
        let mut book = snapshot(&[("10", "1")], &[("11", "1")]);
        let outcome = book.apply_delta(110, 105, &[], &[]);
        assert_eq!(outcome, DeltaOutcome::Gap);
    }

    #[test]
    fn zero_quantity_removes_level() {
        let mut book = snapshot(&[("10", "1")], &[("11", "1")]);
        let zero: rust_decimal::Decimal = "0".parse().unwrap();
        let price: rust_decimal::Decimal = "10".parse().unwrap();
        let outcome = book.apply_delta(101, 101, &[(price, zero)], &[]);
        assert_eq!(outcome, DeltaOutcome::Applied);
        assert!(book.bids.is_empty());
    }

    #[test]
    fn crossed_book_detected() {
        let mut book = snapshot(&[("10", "1")], &[("11", "1")]);
        let new_bid: rust_decimal::Decimal = "12".parse().unwrap();
        let qty: rust_decimal::Decimal = "1".parse().unwrap();
        let outcome = book.apply_delta(101, 101, &[(new_bid, qty)], &[]);
        assert_eq!(outcome, DeltaOutcome::Crossed);
    }

    #[test]
    fn empty_book_is_invalid() {
        let book = snapshot(&[], &[]);
        assert!(!book.is_valid());
    }
}
