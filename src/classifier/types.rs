//! Classifier input/output types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    CascadeHunter,
    CoilWatcher,
    ShakeoutDetector,
    NoRegime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    OiSpike,
    FundingSpike,
    WhaleSpike,
    HighVolatility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAlert {
    pub kind: AlertKind,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    pub base: f64,
    pub effective: f64,
    pub reduction_per_alert: f64,
    pub floor: f64,
    pub active_adjustments: Vec<AlertKind>,
}

/// Per-regime PASS/FAIL with the specific failing dimension(s) named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeCheck {
    pub regime: Regime,
    pub passed: bool,
    pub failure_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierInput {
    pub price: f64,
    pub dls_score: u8,
    pub dls_percentile: u8,
    pub pressure: f64,
    pub momentum: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierDecision {
    pub regime: Regime,
    pub confidence: f64,
    pub inputs: ClassifierInput,
    pub checks: Vec<RegimeCheck>,
    pub adaptive_threshold: AdaptiveThreshold,
    pub timestamp: i64,
}
