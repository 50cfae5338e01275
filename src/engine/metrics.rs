//! Engine metrics: atomic increments, eventually consistent reads, per the
//! concurrency model's rule for shared counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

pub struct EngineMetrics {
    whale_intents_count: AtomicU64,
    derivatives_updates_count: AtomicU64,
    order_book_updates_count: AtomicU64,
    tasks_executed_count: AtomicU64,
    regime_events_count: AtomicU64,
    started_at_ms: AtomicI64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub whale_intents_count: u64,
    pub derivatives_updates_count: u64,
    pub order_book_updates_count: u64,
    pub tasks_executed_count: u64,
    pub regime_events_count: u64,
    pub uptime_ms: i64,
}

impl EngineMetrics {
    pub fn new(now_ms: i64) -> Self {
        Self {
            whale_intents_count: AtomicU64::new(0),
            derivatives_updates_count: AtomicU64::new(0),
            order_book_updates_count: AtomicU64::new(0),
            tasks_executed_count: AtomicU64::new(0),
            regime_events_count: AtomicU64::new(0),
            started_at_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn record_whale_intent(&self) {
        self.whale_intents_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_derivatives_update(&self) {
        self.derivatives_updates_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_order_book_update(&self) {
        self.order_book_updates_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_task_executed(&self) {
        self.tasks_executed_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_regime_event(&self) {
        self.regime_events_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, now_ms: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            whale_intents_count: self.whale_intents_count.load(Ordering::Relaxed),
            derivatives_updates_count: self.derivatives_updates_count.load(Ordering::Relaxed),
            order_book_updates_count: self.order_book_updates_count.load(Ordering::Relaxed),
            tasks_executed_count: self.tasks_executed_count.load(Ordering::Relaxed),
            regime_events_count: self.regime_events_count.load(Ordering::Relaxed),
            uptime_ms: now_ms - self.started_at_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = EngineMetrics::new(1000);
        let snap = metrics.snapshot(1000);
        assert_eq!(snap.whale_intents_count, 0);
        assert_eq!(snap.uptime_ms, 0);
    }

    #[test]
    fn increments_are_visible_in_snapshot() {
        let metrics = EngineMetrics::new(0);
        metrics.record_whale_intent();
        metrics.record_whale_intent();
        assert_eq!(metrics.snapshot(0).whale_intents_count, 2);
    }
}
