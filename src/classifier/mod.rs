//! Market Classifier (component F).
//!
//! `classify` is a pure function over borrowed inputs, mirroring the
//! teacher's preference for free functions over methods when there is no
//! owned mutable state to hide (`orderbook::metrics::calculate_metrics`,
//! `orderbook::analytics::health::calculate_microstructure_health`). The
//! only state that persists between ticks is the side-channel alert set and
//! the forced-diagnostic silence timer, both owned by `ClassifierState`.

pub mod diagnostics;
pub mod types;

use crate::config::thresholds::{ThresholdProfile, EPSILON};

pub use diagnostics::{CumulativeStats, DiagnosticRecord, FORCED_DIAGNOSTIC_SILENCE_MS};
pub use types::{
    ActiveAlert, AdaptiveThreshold, AlertKind, ClassifierDecision, ClassifierInput, Regime,
    RegimeCheck,
};

/// Side-channel alert set plus the forced-diagnostic timer. Owned
/// exclusively by the Engine's single-consumer tick task.
#[derive(Default)]
pub struct ClassifierState {
    alerts: Vec<ActiveAlert>,
    last_classification_at: Option<i64>,
    last_forced_diagnostic_at: Option<i64>,
    stats: CumulativeStats,
}

impl ClassifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_alert(&mut self, kind: AlertKind, expires_at: i64) {
        self.alerts.push(ActiveAlert { kind, expires_at });
    }

    fn evict_expired(&mut self, now: i64) {
        self.alerts.retain(|a| a.expires_at > now);
    }

    fn effective_threshold(&self, now: i64, profile: &ThresholdProfile) -> AdaptiveThreshold {
        let active: Vec<AlertKind> = self
            .alerts
            .iter()
            .filter(|a| a.expires_at > now)
            .map(|a| a.kind)
            .collect();
        let reduction = active.len() as f64 * profile.adaptive_reduction_per_alert;
        let effective = (profile.base_dls_threshold - reduction).max(profile.adaptive_floor);
        AdaptiveThreshold {
            base: profile.base_dls_threshold,
            effective,
            reduction_per_alert: profile.adaptive_reduction_per_alert,
            floor: profile.adaptive_floor,
            active_adjustments: active,
        }
    }

    /// Seconds since the last classification, or `None` if none has
    /// occurred yet.
    pub fn silence_duration_ms(&self, now: i64) -> Option<i64> {
        self.last_classification_at.map(|last| now - last)
    }

    /// Returns a `ForcedDiagnostic` record if the classifier has been
    /// silent for `FORCED_DIAGNOSTIC_SILENCE_MS`, at most once per silence
    /// window.
    pub fn maybe_forced_diagnostic(&mut self, now: i64) -> Option<DiagnosticRecord> {
        let silence = self.silence_duration_ms(now)?;
        if silence < FORCED_DIAGNOSTIC_SILENCE_MS {
            return None;
        }
        if let Some(last_forced) = self.last_forced_diagnostic_at {
            if now - last_forced < FORCED_DIAGNOSTIC_SILENCE_MS {
                return None;
            }
        }
        self.last_forced_diagnostic_at = Some(now);
        self.stats.forced_diagnostics_emitted += 1;
        Some(DiagnosticRecord::ForcedDiagnostic {
            silence_duration_ms: silence,
            stats: self.stats.clone(),
        })
    }

    pub fn stats(&self) -> CumulativeStats {
        self.stats.clone()
    }
}

fn ge_eps(a: f64, b: f64) -> bool {
    a - b >= -EPSILON
}
fn le_eps(a: f64, b: f64) -> bool {
    a - b <= EPSILON
}

fn check_cascade(input: &ClassifierInput, profile: &ThresholdProfile, threshold: &AdaptiveThreshold) -> RegimeCheck {
    let mut reasons = Vec::new();
    if !ge_eps(input.pressure, profile.p_cascade) {
        reasons.push("Pressure".to_string());
    }
    if !ge_eps(input.dls_percentile as f64, threshold.effective) {
        reasons.push("Liquidity".to_string());
    }
    if !le_eps(input.momentum, profile.m_cascade) {
        reasons.push("Momentum".to_string());
    }
    RegimeCheck {
        regime: Regime::CascadeHunter,
        passed: reasons.is_empty(),
        failure_reasons: reasons,
    }
}

fn check_coil(input: &ClassifierInput, profile: &ThresholdProfile) -> RegimeCheck {
    let mut reasons = Vec::new();
    if !le_eps(input.pressure, profile.p_coil) {
        reasons.push("Pressure".to_string());
    }
    if !ge_eps(input.dls_percentile as f64, profile.coil_percentile_threshold) {
        reasons.push("Liquidity".to_string());
    }
    if !(ge_eps(input.momentum, profile.m_coil_min) && le_eps(input.momentum, profile.m_coil_max)) {
        reasons.push("Momentum".to_string());
    }
    RegimeCheck {
        regime: Regime::CoilWatcher,
        passed: reasons.is_empty(),
        failure_reasons: reasons,
    }
}

fn check_shakeout(input: &ClassifierInput, profile: &ThresholdProfile) -> RegimeCheck {
    let mut reasons = Vec::new();
    if !le_eps(input.pressure, profile.p_shakeout) {
        reasons.push("Pressure".to_string());
    }
    if !ge_eps(input.dls_percentile as f64, profile.shakeout_percentile_threshold) {
        reasons.push("Liquidity".to_string());
    }
    if !le_eps(input.momentum, profile.m_shakeout) {
        reasons.push("Momentum".to_string());
    }
    RegimeCheck {
        regime: Regime::ShakeoutDetector,
        passed: reasons.is_empty(),
        failure_reasons: reasons,
    }
}

/// Confidence weights; documented but not part of the correctness contract
/// (the test suite fixes them numerically for regression).
const CONFIDENCE_WEIGHT_PRESSURE: f64 = 0.34;
const CONFIDENCE_WEIGHT_DLS: f64 = 0.33;
const CONFIDENCE_WEIGHT_MOMENTUM: f64 = 0.33;

fn clipped_excess(value: f64, scale: f64) -> f64 {
    (value / scale * 100.0).clamp(0.0, 100.0)
}

fn confidence_for(regime: Regime, input: &ClassifierInput, profile: &ThresholdProfile, threshold: &AdaptiveThreshold) -> f64 {
    let (pressure_excess, dls_excess, momentum_excess) = match regime {
        Regime::CascadeHunter => (
            clipped_excess(input.pressure - profile.p_cascade, 0.0001),
            clipped_excess(input.dls_percentile as f64 - threshold.effective, 25.0),
            clipped_excess(profile.m_cascade - input.momentum, 0.05),
        ),
        Regime::CoilWatcher => (
            clipped_excess(profile.p_coil - input.pressure, 0.0001),
            clipped_excess(input.dls_percentile as f64 - profile.coil_percentile_threshold, 15.0),
            clipped_excess(
                profile.m_coil_max - (input.momentum - profile.m_coil_min).abs(),
                0.04,
            ),
        ),
        Regime::ShakeoutDetector => (
            clipped_excess(profile.p_shakeout - input.pressure, 0.0001),
            clipped_excess(input.dls_percentile as f64 - profile.shakeout_percentile_threshold, 20.0),
            clipped_excess(profile.m_shakeout - input.momentum, 0.05),
        ),
        Regime::NoRegime => return 0.0,
    };
    (pressure_excess * CONFIDENCE_WEIGHT_PRESSURE
        + dls_excess * CONFIDENCE_WEIGHT_DLS
        + momentum_excess * CONFIDENCE_WEIGHT_MOMENTUM)
        .clamp(0.0, 100.0)
}

/// Classifies one tick. Evaluated in order CASCADE_HUNTER, COIL_WATCHER,
/// SHAKEOUT_DETECTOR, NO_REGIME — first match wins, states are mutually
/// exclusive.
pub fn classify(input: ClassifierInput, state: &mut ClassifierState, profile: &ThresholdProfile) -> ClassifierDecision {
    state.evict_expired(input.timestamp);
    let threshold = state.effective_threshold(input.timestamp, profile);

    let cascade = check_cascade(&input, profile, &threshold);
    let coil = check_coil(&input, profile);
    let shakeout = check_shakeout(&input, profile);

    let regime = if cascade.passed {
        Regime::CascadeHunter
    } else if coil.passed {
        Regime::CoilWatcher
    } else if shakeout.passed {
        Regime::ShakeoutDetector
    } else {
        Regime::NoRegime
    };

    let confidence = confidence_for(regime, &input, profile, &threshold);

    state.last_classification_at = Some(input.timestamp);
    state.stats.record(regime);

    ClassifierDecision {
        regime,
        confidence,
        timestamp: input.timestamp,
        checks: vec![cascade, coil, shakeout],
        adaptive_threshold: threshold,
        inputs: input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pressure: f64, dls_percentile: u8, momentum: f64) -> ClassifierInput {
        ClassifierInput {
            price: 3500.0,
            dls_score: dls_percentile,
            dls_percentile,
            pressure,
            momentum,
            timestamp: 1_000_000,
        }
    }

    #[test]
    fn cascade_fires_at_boundary() {
        let profile = ThresholdProfile::AGGRESSIVE; // base 25, matches "floor-effective=25" fixture
        let mut state = ClassifierState::new();
        let decision = classify(input(1.000015, 50, -0.06), &mut state, &profile);
        assert_eq!(decision.regime, Regime::CascadeHunter);
    }

    #[test]
    fn coil_detected() {
        let profile = ThresholdProfile::CONSERVATIVE;
        let mut state = ClassifierState::new();
        let decision = classify(input(1.000003, 90, 0.01), &mut state, &profile);
        assert_eq!(decision.regime, Regime::CoilWatcher);
    }

    #[test]
    fn shakeout_detected() {
        let profile = ThresholdProfile::CONSERVATIVE;
        let mut state = ClassifierState::new();
        let decision = classify(input(1.0000005, 85, -0.15), &mut state, &profile);
        assert_eq!(decision.regime, Regime::ShakeoutDetector);
    }

    #[test]
    fn mutual_exclusion_holds() {
        let profile = ThresholdProfile::CONSERVATIVE;
        let mut state = ClassifierState::new();
        let decision = classify(input(1.000003, 90, 0.01), &mut state, &profile);
        let passing = decision.checks.iter().filter(|c| c.passed && c.regime != Regime::NoRegime).count();
        assert!(passing <= 1);
    }

    #[test]
    fn adaptive_threshold_overlay_accepts_within_window_and_rejects_after() {
        let profile = ThresholdProfile::CONSERVATIVE; // base 75
        let mut state = ClassifierState::new();
        let now = 1_000_000i64;
        state.push_alert(AlertKind::OiSpike, now + 60_000);

        // percentile 62 would fail against base 75 but passes against
        // effective = 75 - 15 = 60.
        let decision = classify(
            ClassifierInput { price: 3500.0, dls_score: 62, dls_percentile: 62, pressure: 1.000015, momentum: -0.06, timestamp: now },
            &mut state,
            &profile,
        );
        assert_eq!(decision.adaptive_threshold.effective, 60.0);
        assert_eq!(decision.regime, Regime::CascadeHunter);

        // after the alert expires, the same percentile is rejected again.
        let later = now + 61_000;
        let decision2 = classify(
            ClassifierInput { price: 3500.0, dls_score: 62, dls_percentile: 62, pressure: 1.000015, momentum: -0.06, timestamp: later },
            &mut state,
            &profile,
        );
        assert_eq!(decision2.adaptive_threshold.effective, 75.0);
        assert_eq!(decision2.regime, Regime::NoRegime);
    }

    #[test]
    fn adaptive_threshold_never_below_floor() {
        let profile = ThresholdProfile::CONSERVATIVE;
        let mut state = ClassifierState::new();
        let now = 1_000_000i64;
        for _ in 0..20 {
            state.push_alert(AlertKind::OiSpike, now + 60_000);
        }
        let threshold = state.effective_threshold(now, &profile);
        assert_eq!(threshold.effective, profile.adaptive_floor);
    }

    #[test]
    fn forced_diagnostic_fires_once_per_silence_window() {
        let mut state = ClassifierState::new();
        state.last_classification_at = Some(0);
        assert!(state.maybe_forced_diagnostic(FORCED_DIAGNOSTIC_SILENCE_MS).is_some());
        assert!(state.maybe_forced_diagnostic(FORCED_DIAGNOSTIC_SILENCE_MS + 1000).is_none());
        assert!(state
            .maybe_forced_diagnostic(FORCED_DIAGNOSTIC_SILENCE_MS * 2)
            .is_some());
    }
}
