//! Engine / Orchestrator (component G).
//!
//! Owns `Arc`-wrapped component handles constructed once in `initialize()`
//! and cloned into spawned tasks.

pub mod metrics;

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::analytics::{DynamicLiquidityAnalyzer, LiquidityEvent, SampleStatus};
use crate::classifier::{self, AlertKind, ClassifierInput, ClassifierState, Regime};
use crate::config::EngineConfig;
use crate::ingest::types::{DerivativesAlert, DerivativesAlertType, IngestHealth, OrderBookSnapshot, ThreatLevel, WhaleIntent};
use crate::ingest::IngestSupervisor;
use crate::logging::{LogLevel, StatefulLogger};
use crate::notifier::{Notification, NotificationSink, Priority};
use crate::scheduler::{Scheduler, TaskConfig, TaskType};

pub use metrics::{EngineMetrics, MetricsSnapshot};

const PRESSURE_DEPTH_LEVELS: usize = 50;
const MOMENTUM_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Top-of-book (price, timestamp) window retained for at least 5 minutes.
struct MomentumWindow {
    entries: VecDeque<(f64, i64)>,
}

impl MomentumWindow {
    fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    fn push_and_compute(&mut self, price: f64, now: i64) -> f64 {
        self.entries.push_back((price, now));
        while self
            .entries
            .front()
            .is_some_and(|(_, ts)| now - *ts > MOMENTUM_WINDOW_MS * 2)
        {
            self.entries.pop_front();
        }
        let oldest = self
            .entries
            .iter()
            .find(|(_, ts)| now - *ts >= MOMENTUM_WINDOW_MS);
        match oldest {
            Some((old_price, _)) if *old_price != 0.0 => (price - old_price) / old_price,
            _ => 0.0,
        }
    }
}

fn pressure_from_snapshot(book: &OrderBookSnapshot) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    let bid_volume: f64 = book
        .bids
        .values()
        .rev()
        .take(PRESSURE_DEPTH_LEVELS)
        .filter_map(|q| q.to_f64())
        .sum();
    let ask_volume: f64 = book
        .asks
        .values()
        .take(PRESSURE_DEPTH_LEVELS)
        .filter_map(|q| q.to_f64())
        .sum();
    if bid_volume == 0.0 {
        0.0
    } else {
        ask_volume / bid_volume
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub order_book: String,
    pub derivatives: Vec<(String, String)>,
    pub components_online: usize,
    pub initialized: bool,
}

pub struct Engine {
    pub config: EngineConfig,
    pub logger: Arc<StatefulLogger>,
    pub scheduler: Arc<Scheduler>,
    pub notifier: Arc<dyn NotificationSink>,
    pub ingest: Arc<IngestSupervisor>,
    pub metrics: Arc<EngineMetrics>,
    initialized: std::sync::atomic::AtomicBool,
}

impl Engine {
    /// Wires A-F, preloads the whale watchlist, registers recurring tasks.
    /// Aborts with `Fatal` only if a core component (the classifier or DLA
    /// themselves, which cannot fail to construct) would fail; ingest and
    /// notifier failures degrade instead.
    pub fn initialize(
        config: EngineConfig,
        logger: Arc<StatefulLogger>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn NotificationSink>,
        ingest: Arc<IngestSupervisor>,
    ) -> Arc<Self> {
        let metrics = Arc::new(EngineMetrics::new(Utc::now().timestamp_millis()));
        Arc::new(Self {
            config,
            logger,
            scheduler,
            notifier,
            ingest,
            metrics,
            initialized: std::sync::atomic::AtomicBool::new(true),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Opens ingest streams, starts the scheduler, and schedules the default
    /// recurring tasks. Returns the channels the tick loop must poll.
    pub async fn start(
        self: &Arc<Self>,
        book_updates_rx: mpsc::Receiver<OrderBookSnapshot>,
        derivatives_alerts_rx: mpsc::Receiver<DerivativesAlert>,
        whale_intents_rx: mpsc::Receiver<WhaleIntent>,
    ) {
        self.ingest.start();

        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(async move { scheduler.run().await });

        self.schedule_recurring_tasks().await;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_tick_loop(book_updates_rx, derivatives_alerts_rx, whale_intents_rx).await;
        });
    }

    async fn schedule_recurring_tasks(&self) {
        for address in &self.config.whale_watchlist {
            let _ = self
                .scheduler
                .schedule(TaskConfig::now(
                    TaskType::WhaleBalanceCheck { address: address.clone() },
                    5,
                ))
                .await;
        }
        let _ = self
            .scheduler
            .schedule(TaskConfig::now(TaskType::SystemHealthCheck, 7))
            .await;
        let _ = self
            .scheduler
            .schedule(TaskConfig::now(TaskType::MemoryCleanup, 3))
            .await;
    }

    async fn run_tick_loop(
        self: Arc<Self>,
        mut book_updates_rx: mpsc::Receiver<OrderBookSnapshot>,
        mut derivatives_alerts_rx: mpsc::Receiver<DerivativesAlert>,
        mut whale_intents_rx: mpsc::Receiver<WhaleIntent>,
    ) {
        // DLA, momentum window, and classifier state are exclusively owned
        // by this single logical consumer; never shared across threads.
        let mut dla = DynamicLiquidityAnalyzer::new();
        let mut momentum = MomentumWindow::new();
        let mut classifier_state = ClassifierState::new();
        let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            tokio::select! {
                Some(book) = book_updates_rx.recv() => {
                    self.metrics.record_order_book_update();
                    self.process_order_book_tick(&book, &mut dla, &mut momentum, &mut classifier_state).await;
                }
                Some(alert) = derivatives_alerts_rx.recv() => {
                    self.metrics.record_derivatives_update();
                    let kind = match alert.alert_type {
                        DerivativesAlertType::OiSpike => AlertKind::OiSpike,
                        DerivativesAlertType::FundingSpike => AlertKind::FundingSpike,
                        DerivativesAlertType::HighVolatility => AlertKind::HighVolatility,
                    };
                    classifier_state.push_alert(kind, alert.expires_at);
                }
                Some(intent) = whale_intents_rx.recv() => {
                    self.metrics.record_whale_intent();
                    classifier_state.push_alert(AlertKind::WhaleSpike, intent.timestamp + 30_000);
                    if intent.threat_level == ThreatLevel::Critical {
                        self.notifier.send(Notification {
                            priority: Priority::Critical,
                            text: format!("Whale intent above critical threat level: {} (${:.0})", intent.whale_address, intent.estimated_value_usd),
                        }).await;
                    }
                }
                _ = heartbeat.tick() => {
                    let now = Utc::now().timestamp_millis();
                    if let Some(record) = classifier_state.maybe_forced_diagnostic(now) {
                        self.logger.info("classifier.forced_diagnostic", &record);
                    }
                }
                else => break,
            }
        }
    }

    async fn process_order_book_tick(
        &self,
        book: &OrderBookSnapshot,
        dla: &mut DynamicLiquidityAnalyzer,
        momentum: &mut MomentumWindow,
        classifier_state: &mut ClassifierState,
    ) {
        let volume_factor = crate::analytics::volume_profile::factor(None, None);
        let signal_validation_threshold = self.config.threshold_profile.base_dls_threshold as u8;
        let (sample, event) = dla.analyze(book, signal_validation_threshold, volume_factor);

        if let Some(event) = event {
            self.log_liquidity_event(event);
        }

        if sample.status == SampleStatus::InvalidData {
            self.logger.warn("ingest.orderbook.invalid_snapshot", &book.timestamp);
            return;
        }

        let Some((best_bid, _)) = book.best_bid() else { return };
        let Some((best_ask, _)) = book.best_ask() else { return };
        use rust_decimal::prelude::ToPrimitive;
        let mid = ((best_bid + best_ask) / rust_decimal::Decimal::TWO).to_f64().unwrap_or(0.0);

        let pressure = pressure_from_snapshot(book);
        let momentum_value = momentum.push_and_compute(mid, book.timestamp);

        let input = ClassifierInput {
            price: mid,
            dls_score: sample.dls,
            dls_percentile: sample.percentile,
            pressure,
            momentum: momentum_value,
            timestamp: book.timestamp,
        };

        let decision = classifier::classify(input, classifier_state, &self.config.threshold_profile);
        self.logger.info("classifier.decision", &decision);

        if decision.regime != Regime::NoRegime {
            self.metrics.record_regime_event();
            self.notifier
                .send(Notification {
                    priority: Priority::High,
                    text: format!("REGIME_DETECTED: {:?} (confidence {:.1})", decision.regime, decision.confidence),
                })
                .await;
        }
    }

    fn log_liquidity_event(&self, event: LiquidityEvent) {
        self.logger.info("analytics.liquidity_event", &event);
    }

    pub async fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(Utc::now().timestamp_millis())
    }

    pub async fn system_health(&self) -> SystemHealth {
        let per_stream = self.ingest.per_stream_health().await;
        let components_online = per_stream
            .iter()
            .filter(|(_, h)| *h == IngestHealth::Online)
            .count();
        SystemHealth {
            order_book: format!("{:?}", per_stream.first().map(|(_, h)| *h).unwrap_or(IngestHealth::Offline)),
            derivatives: per_stream
                .iter()
                .skip(1)
                .map(|(name, h)| (name.clone(), format!("{h:?}")))
                .collect(),
            components_online,
            initialized: self.is_initialized(),
        }
    }

    /// Reverse-order shutdown: ingest streams first, then the scheduler.
    pub async fn shutdown(&self) {
        self.ingest.shutdown();
        self.scheduler
            .shutdown(std::time::Duration::from_secs(30))
            .await;
        self.logger.force("engine.shutdown", &"complete", LogLevel::Info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_is_zero_when_bid_volume_is_zero() {
        use crate::ingest::types::Levels;
        use rust_decimal::Decimal;
        use std::str::FromStr;

        let mut asks = Levels::new();
        asks.insert(Decimal::from_str("100").unwrap(), Decimal::from_str("5").unwrap());
        let book = OrderBookSnapshot {
            bids: Levels::new(),
            asks,
            timestamp: 0,
            last_update_id: 1,
        };
        assert_eq!(pressure_from_snapshot(&book), 0.0);
    }

    #[test]
    fn momentum_is_zero_with_fewer_than_two_points() {
        let mut window = MomentumWindow::new();
        let m = window.push_and_compute(100.0, 0);
        assert_eq!(m, 0.0);
    }

    #[test]
    fn momentum_reflects_percent_change_after_five_minutes() {
        let mut window = MomentumWindow::new();
        window.push_and_compute(100.0, 0);
        let m = window.push_and_compute(110.0, MOMENTUM_WINDOW_MS);
        assert!((m - 0.10).abs() < 1e-9);
    }
}
