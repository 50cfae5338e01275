//! Glass Box diagnostics: a structured record accompanies every
//! classification, and a forced heartbeat guarantees observability even
//! when the classifier has gone silent.

use serde::{Deserialize, Serialize};

use super::types::{AdaptiveThreshold, ClassifierInput, Regime, RegimeCheck};

/// Silence duration after which a `FORCED_DIAGNOSTIC` is emitted.
pub const FORCED_DIAGNOSTIC_SILENCE_MS: i64 = 60_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CumulativeStats {
    pub total_classifications: u64,
    pub cascade_hunter_count: u64,
    pub coil_watcher_count: u64,
    pub shakeout_detector_count: u64,
    pub no_regime_count: u64,
    pub forced_diagnostics_emitted: u64,
}

impl CumulativeStats {
    pub fn record(&mut self, regime: Regime) {
        self.total_classifications += 1;
        match regime {
            Regime::CascadeHunter => self.cascade_hunter_count += 1,
            Regime::CoilWatcher => self.coil_watcher_count += 1,
            Regime::ShakeoutDetector => self.shakeout_detector_count += 1,
            Regime::NoRegime => self.no_regime_count += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DiagnosticRecord {
    Classification {
        inputs: ClassifierInput,
        checks: Vec<RegimeCheck>,
        adaptive_threshold: AdaptiveThreshold,
        stats: CumulativeStats,
    },
    /// Emitted when the classifier has been silent for
    /// `FORCED_DIAGNOSTIC_SILENCE_MS`. Never accompanied by a
    /// `REGIME_DETECTED` event — diagnostic-only.
    ForcedDiagnostic {
        silence_duration_ms: i64,
        stats: CumulativeStats,
    },
}
