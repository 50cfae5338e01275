//! Dynamic Liquidity Score composite.
//!
//! Weighted composite of normalized [0,100] sub-scores, with a VWAP
//! level-walk for the market-impact component.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::ingest::types::{Levels, OrderBookSnapshot};

const DEPTH_LEVELS: usize = 50;
const DENSITY_BAND_PCT: f64 = 0.01;
const IMPACT_NOTIONAL_USD: f64 = 10_000.0;
/// bps assigned when the book is too thin to fill the simulated order.
const IMPACT_WORST_BPS: f64 = 100.0;
/// Depth normalization reference: total quantity (summed across both sides,
/// top `DEPTH_LEVELS`) mapping to a full 100 score.
const DEPTH_REFERENCE_QTY: f64 = 200.0;

pub const WEIGHT_DEPTH: f64 = 0.25;
pub const WEIGHT_DENSITY: f64 = 0.25;
pub const WEIGHT_SPREAD: f64 = 0.20;
pub const WEIGHT_IMPACT: f64 = 0.20;
pub const WEIGHT_VOLUME: f64 = 0.10;

pub struct DlsComponents {
    pub depth: f64,
    pub density: f64,
    pub spread_tightness: f64,
    pub market_impact: f64,
    pub volume_profile: f64,
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn calculate_depth_score(book: &OrderBookSnapshot) -> f64 {
    let bid_qty: f64 = book.bids.values().rev().take(DEPTH_LEVELS).map(|q| to_f64(*q)).sum();
    let ask_qty: f64 = book.asks.values().take(DEPTH_LEVELS).map(|q| to_f64(*q)).sum();
    let total = bid_qty + ask_qty;
    (total / DEPTH_REFERENCE_QTY * 100.0).min(100.0)
}

fn calculate_density_score(book: &OrderBookSnapshot, mid: f64) -> f64 {
    let lower = mid * (1.0 - DENSITY_BAND_PCT);
    let upper = mid * (1.0 + DENSITY_BAND_PCT);

    let in_band = |levels: &Levels| -> (f64, usize) {
        levels
            .iter()
            .filter(|(p, _)| {
                let price = to_f64(**p);
                price >= lower && price <= upper
            })
            .fold((0.0, 0usize), |(sum, count), (_, q)| (sum + to_f64(*q), count + 1))
    };

    let (bid_sum, bid_count) = in_band(&book.bids);
    let (ask_sum, ask_count) = in_band(&book.asks);
    let count = bid_count + ask_count;
    if count == 0 {
        return 0.0;
    }
    (((bid_sum + ask_sum) / count as f64) * 10.0).min(100.0)
}

fn calculate_spread_tightness_score(best_bid: f64, best_ask: f64, mid: f64) -> f64 {
    let spread_bps = (best_ask - best_bid) / mid * 10_000.0;
    (100.0 - spread_bps * 2.0).max(0.0)
}

/// Simulates a market sell of `notional_target` USD walking bids from the
/// best price down, returning the VWAP execution price, or `None` if the
/// book cannot fill the full notional.
fn simulate_market_sell_vwap(bids: &Levels, notional_target: f64) -> Option<f64> {
    let mut remaining = notional_target;
    let mut total_qty = 0.0;
    let mut total_cost = 0.0;

    for (&price, &qty) in bids.iter().rev() {
        let price = to_f64(price);
        let qty = to_f64(qty);
        if price <= 0.0 {
            continue;
        }
        let level_notional = price * qty;
        if level_notional >= remaining {
            let fill_qty = remaining / price;
            total_qty += fill_qty;
            total_cost += fill_qty * price;
            remaining = 0.0;
            break;
        }
        total_qty += qty;
        total_cost += level_notional;
        remaining -= level_notional;
    }

    if remaining > 0.0 || total_qty <= 0.0 {
        return None;
    }
    Some(total_cost / total_qty)
}

fn calculate_market_impact_score(book: &OrderBookSnapshot, mid: f64) -> f64 {
    let impact_bps = match simulate_market_sell_vwap(&book.bids, IMPACT_NOTIONAL_USD) {
        Some(vwap) => (vwap - mid).abs() / mid * 10_000.0,
        None => IMPACT_WORST_BPS,
    };
    (100.0 - impact_bps * 20.0).max(0.0)
}

/// Computes every sub-score for one snapshot. Caller must have already
/// validated the snapshot (`OrderBookSnapshot::is_valid`).
pub fn calculate_components(book: &OrderBookSnapshot, volume_profile_factor: f64) -> DlsComponents {
    let best_bid = to_f64(book.best_bid().expect("validated snapshot has a best bid").0);
    let best_ask = to_f64(book.best_ask().expect("validated snapshot has a best ask").0);
    let mid = (best_bid + best_ask) / 2.0;

    let volume_score = ((volume_profile_factor - 0.5) / 1.0 * 100.0).clamp(0.0, 100.0);

    DlsComponents {
        depth: calculate_depth_score(book),
        density: calculate_density_score(book, mid),
        spread_tightness: calculate_spread_tightness_score(best_bid, best_ask, mid),
        market_impact: calculate_market_impact_score(book, mid),
        volume_profile: volume_score,
    }
}

/// Weighted composite, clamped to [0,100] and rounded to an integer.
pub fn composite_dls(components: &DlsComponents) -> u8 {
    let raw = components.depth * WEIGHT_DEPTH
        + components.density * WEIGHT_DENSITY
        + components.spread_tightness * WEIGHT_SPREAD
        + components.market_impact * WEIGHT_IMPACT
        + components.volume_profile * WEIGHT_VOLUME;
    raw.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
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
        OrderBookSnapshot { bids: b, asks: a, timestamp: 0, last_update_id: 1 }
    }

    #[test]
    fn dls_stays_within_bounds_for_deep_book() {
        let mut bids = vec![];
        let mut asks = vec![];
        for i in 0..100 {
            bids.push((format!("{}", 3000 - i), "5".to_string()));
            asks.push((format!("{}", 3001 + i), "5".to_string()));
        }
        let bids: Vec<(&str, &str)> = bids.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let asks: Vec<(&str, &str)> = asks.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let book = book(&bids, &asks);
        let components = calculate_components(&book, 1.0);
        let dls = composite_dls(&components);
        assert!(dls <= 100);
    }

    #[test]
    fn thin_book_yields_low_impact_score() {
        let book = book(&[("2999", "0.001")], &[("3001", "1")]);
        let components = calculate_components(&book, 1.0);
        assert!(components.market_impact < 10.0);
    }

    #[test]
    fn tight_spread_scores_high_tightness() {
        let best_bid = 3000.0;
        let best_ask = 3000.1;
        let mid = (best_bid + best_ask) / 2.0;
        let score = calculate_spread_tightness_score(best_bid, best_ask, mid);
        assert!(score > 90.0);
    }
}
