//! Dynamic Liquidity Analyzer (component E).
//!
//! Owned exclusively by the Engine's single-consumer tick task; the
//! percentile ring is never shared across threads or wrapped in a lock, per
//! the concurrency model's "cross-thread access to E and F is forbidden."

pub mod dls;
pub mod percentile;
pub mod types;
pub mod volume_profile;

pub use types::{LiquidityEvent, LiquidityRegime, LiquiditySample, SampleStatus};

use crate::ingest::types::OrderBookSnapshot;
use percentile::PercentileRing;

pub struct DynamicLiquidityAnalyzer {
    ring: PercentileRing,
}

impl DynamicLiquidityAnalyzer {
    pub fn new() -> Self {
        Self {
            ring: PercentileRing::new(),
        }
    }

    /// Converts one order-book snapshot into a `LiquiditySample`. On
    /// malformed input (empty book, crossed book) returns `INVALID_DATA`
    /// without mutating the ring.
    pub fn analyze(
        &mut self,
        book: &OrderBookSnapshot,
        signal_validation_threshold: u8,
        volume_profile_factor: f64,
    ) -> (LiquiditySample, Option<LiquidityEvent>) {
        if !book.is_valid() {
            return (LiquiditySample::invalid(book.timestamp), None);
        }

        let components = dls::calculate_components(book, volume_profile_factor);
        let score = dls::composite_dls(&components);
        let percentile = self.ring.push_and_rank(score);
        let regime = LiquidityRegime::from_percentile(percentile);
        let event = LiquidityEvent::from_percentile(percentile);

        let sample = LiquiditySample {
            status: SampleStatus::Valid,
            dls: score,
            percentile,
            regime,
            is_valid_for_signal: percentile >= signal_validation_threshold,
            timestamp: book.timestamp,
        };
        (sample, event)
    }

    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }
}

impl Default for DynamicLiquidityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Levels;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn book(bids: &[(&str, &str)], asks: &[(&str, &str)]) -> OrderBookSnapshot {
        let mut b = Levels::new();
        for (p, q) in bids {
            b.insert(Decimal::from_str(p).unwrap(), Decimal::from_str(q).unwrap());
        }
        let mut a = Levels::new();
        for (p, q) in asks {
            a.insert(Decimal::from_str(p).unwrap(), Decimal::from_str(q).unwrap());
        }
        OrderBookSnapshot { bids: b, asks: a, timestamp: 1, last_update_id: 1 }
    }

    #[test]
    fn empty_book_produces_invalid_sample_and_no_ring_mutation() {
        let mut dla = DynamicLiquidityAnalyzer::new();
        let empty = book(&[], &[]);
        let (sample, event) = dla.analyze(&empty, 75, 1.0);
        assert_eq!(sample.status, SampleStatus::InvalidData);
        assert!(event.is_none());
        assert_eq!(dla.ring_len(), 0);
    }

    #[test]
    fn valid_book_produces_bounded_dls() {
        let mut dla = DynamicLiquidityAnalyzer::new();
        let b = book(&[("3000", "5")], &[("3001", "5")]);
        let (sample, _) = dla.analyze(&b, 75, 1.0);
        assert_eq!(sample.status, SampleStatus::Valid);
        assert!(sample.dls <= 100);
        assert_eq!(dla.ring_len(), 1);
    }
}
